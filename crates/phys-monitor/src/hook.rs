//! Observer and upper-layer extension points.

use crate::state::ConnectionState;

/// Listener notified of every connectivity transition.
///
/// Observers are called synchronously while the monitor finishes the
/// transition, in no guaranteed order, with the monitor lock held. They may
/// call `state`, `is_stopping`, `has_pending_retry`, `observer_count` and
/// `add_monitor` on the same [`PhysLayerMonitor`](crate::PhysLayerMonitor),
/// but calling `start`, `stop`, `reconnect` or a blocking wait deadlocks.
///
/// Closures taking a [`ConnectionState`] are observers:
///
/// ```
/// use phys_monitor::{ConnectionState, StateObserver};
///
/// let observer = |state: ConnectionState| println!("port is now {}", state);
/// observer.on_state_change(ConnectionState::Open);
/// ```
pub trait StateObserver: Send + Sync {
    /// Called with the state the monitor just entered.
    fn on_state_change(&self, state: ConnectionState);
}

impl<F> StateObserver for F
where
    F: Fn(ConnectionState) + Send + Sync,
{
    fn on_state_change(&self, state: ConnectionState) {
        self(state)
    }
}

/// Extension point for the protocol layer stacked on a monitor.
///
/// The lifecycle methods fire at the instant of the matching transport event,
/// before the resulting transition is fanned out to observers. Then
/// [`on_state_change`](UpperLayerHook::on_state_change) fires after the
/// observers with the same state they saw. Every method runs inside the
/// transition on the thread that delivered the transport event and must not
/// block.
///
/// The same re-entrancy rules as [`StateObserver`] apply: the lock-free
/// queries are safe, `start`, `stop`, `reconnect` and the blocking waits are
/// not.
pub trait UpperLayerHook: Send + Sync {
    /// The transport opened; the monitor is about to enter `Open`.
    fn on_physical_layer_open(&self) {}

    /// An open attempt failed, before the retry or stop decision.
    fn on_physical_layer_open_failure(&self) {}

    /// The transport went down from `Open`; the monitor is about to enter
    /// `Closed`.
    fn on_physical_layer_close(&self) {}

    /// Called after the observers for every transition.
    fn on_state_change(&self, _state: ConnectionState) {}
}

/// Hook that ignores every event, for monitors without an upper layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl UpperLayerHook for NoopHook {}
