//! The connection lifecycle monitor.

use crate::config::MonitorConfig;
use crate::events::PhysLayerEvent;
use crate::hook::{NoopHook, StateObserver, UpperLayerHook};
use crate::state::ConnectionState;
use crate::timer::{TimerSource, TimerToken};
use crate::transport::{PhysicalLayer, PhysicalLayerHandler};
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use phys_monitor_core::MonitorError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;

struct PendingRetry {
    generation: u64,
    token: TimerToken,
}

/// Everything guarded by the monitor lock.
struct Inner {
    state: ConnectionState,
    retry: Option<PendingRetry>,
    next_generation: u64,
}

/// Supervises a [`PhysicalLayer`]: opens it, retries failed opens on a fixed
/// interval, reopens it when it drops and closes it on request.
///
/// Transport completions and retry timers drive the state machine from
/// whatever thread delivers them; every mutation happens under one lock.
/// Each transition is published, in order, to the `port_state` metric,
/// the registered observers, the upper-layer hook and the configured event
/// listeners, and only then are blocked waiters released.
///
/// Observers, the hook and event listeners run while the monitor lock is
/// held. From inside them it is safe to call [`state`], [`is_stopping`],
/// [`has_pending_retry`], [`observer_count`] and [`add_monitor`]. Calling
/// `start`, `stop`, `reconnect` or a blocking wait on the same monitor
/// deadlocks.
///
/// The monitor never closes its transport on drop. Call [`stop`] first.
///
/// [`stop`]: PhysLayerMonitor::stop
/// [`state`]: PhysLayerMonitor::state
/// [`is_stopping`]: PhysLayerMonitor::is_stopping
/// [`has_pending_retry`]: PhysLayerMonitor::has_pending_retry
/// [`observer_count`]: PhysLayerMonitor::observer_count
/// [`add_monitor`]: PhysLayerMonitor::add_monitor
pub struct PhysLayerMonitor {
    config: MonitorConfig,
    phys: Arc<dyn PhysicalLayer>,
    timers: Arc<dyn TimerSource>,
    hook: Box<dyn UpperLayerHook>,
    inner: Mutex<Inner>,
    observers: Mutex<Vec<Weak<dyn StateObserver>>>,
    changed: Condvar,
    // Lock-free mirrors, written only under `inner`.
    state_atomic: AtomicU8,
    stopping: AtomicBool,
    retry_pending: AtomicBool,
    state_tx: watch::Sender<ConnectionState>,
    this: Weak<PhysLayerMonitor>,
}

impl PhysLayerMonitor {
    /// Builds a monitor without an upper layer and binds it as the
    /// transport's handler.
    pub fn new(
        config: MonitorConfig,
        phys: Arc<dyn PhysicalLayer>,
        timers: Arc<dyn TimerSource>,
    ) -> Arc<Self> {
        Self::with_hook(config, phys, timers, NoopHook)
    }

    /// Builds a monitor whose lifecycle events also drive `hook`.
    pub fn with_hook<H>(
        config: MonitorConfig,
        phys: Arc<dyn PhysicalLayer>,
        timers: Arc<dyn TimerSource>,
        hook: H,
    ) -> Arc<Self>
    where
        H: UpperLayerHook + 'static,
    {
        #[cfg(feature = "metrics")]
        gauge!("port_state", "monitor" => config.name.clone())
            .set(f64::from(ConnectionState::Stopped.code()));

        Arc::new_cyclic(|this: &Weak<Self>| {
            let handler: Weak<dyn PhysicalLayerHandler> = this.clone();
            phys.set_handler(handler);

            let (state_tx, _) = watch::channel(ConnectionState::Stopped);
            Self {
                config,
                phys,
                timers,
                hook: Box::new(hook),
                inner: Mutex::new(Inner {
                    state: ConnectionState::Stopped,
                    retry: None,
                    next_generation: 0,
                }),
                observers: Mutex::new(Vec::new()),
                changed: Condvar::new(),
                state_atomic: AtomicU8::new(ConnectionState::Stopped.code()),
                stopping: AtomicBool::new(false),
                retry_pending: AtomicBool::new(false),
                state_tx,
                this: this.clone(),
            }
        })
    }

    /// Returns the monitor name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the configuration the monitor was built with.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Current state. Lock-free, so observers and hooks may call it.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Whether a stop has been requested and not superseded by `start`.
    /// Lock-free.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Whether a retry timer is outstanding. Lock-free.
    pub fn has_pending_retry(&self) -> bool {
        self.retry_pending.load(Ordering::Acquire)
    }

    /// Number of live registered observers.
    pub fn observer_count(&self) -> usize {
        self.lock_observers()
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    /// Registers an observer for every future transition.
    ///
    /// Only a weak reference is kept: the observer stops receiving
    /// notifications once the caller drops its last `Arc`. Registering the
    /// same observer twice has no effect.
    pub fn add_monitor<O>(&self, observer: &Arc<O>)
    where
        O: StateObserver + 'static,
    {
        let observer: Weak<O> = Arc::downgrade(observer);
        let observer: Weak<dyn StateObserver> = observer;
        let mut observers = self.lock_observers();
        if !observers.iter().any(|o| o.ptr_eq(&observer)) {
            observers.push(observer);
        }
    }

    /// Starts the open cycle.
    ///
    /// Clears any pending stop request. When the transport can be opened an
    /// asynchronous open is issued and the monitor enters `Opening`; otherwise
    /// this is a no-op, so calling it while `Opening` or `Open` never issues a
    /// second open.
    pub fn start(&self) {
        let mut inner = self.lock();
        self.start_locked(&mut inner);
    }

    /// Requests shutdown.
    ///
    /// Cancels a pending retry and closes the transport if it can be closed.
    /// Returns without waiting; the monitor reaches `Stopped` immediately if
    /// the transport is already closed, or once the outstanding open or close
    /// completes.
    pub fn stop(&self) {
        let mut inner = self.lock();

        #[cfg(feature = "tracing")]
        tracing::info!(monitor = %self.config.name, "Stopping phys monitor");

        self.stopping.store(true, Ordering::Release);
        self.config.emit(&PhysLayerEvent::StopRequested {
            monitor_name: self.config.name.clone(),
            timestamp: Instant::now(),
        });

        self.cancel_retry(&mut inner);
        if self.phys.can_close() {
            self.phys.async_close();
        }
        if self.phys.is_closed() {
            self.change_state(&mut inner, ConnectionState::Stopped);
        }
    }

    /// Forces the transport closed so the open cycle restarts.
    ///
    /// Best effort: does nothing if the transport cannot be closed right now,
    /// and does not alter the stop request.
    pub fn reconnect(&self) {
        let _inner = self.lock();

        #[cfg(feature = "tracing")]
        tracing::debug!(monitor = %self.config.name, "Reconnect requested");

        self.config.emit(&PhysLayerEvent::ReconnectRequested {
            monitor_name: self.config.name.clone(),
            timestamp: Instant::now(),
        });

        if self.phys.can_close() {
            self.phys.async_close();
        }
    }

    /// Blocks until the monitor is in `target`.
    ///
    /// Returns immediately if it already is.
    pub fn wait_for_state(&self, target: ConnectionState) {
        let inner = self.lock();
        let _inner = self
            .changed
            .wait_while(inner, |inner| inner.state != target)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Blocks until the monitor is `Stopped`.
    pub fn wait_for_stopped(&self) {
        self.wait_for_state(ConnectionState::Stopped);
    }

    /// Blocks until the monitor is in `target` or `timeout` elapses.
    pub fn wait_for_state_timeout(
        &self,
        target: ConnectionState,
        timeout: Duration,
    ) -> Result<(), MonitorError> {
        let inner = self.lock();
        let (_inner, result) = self
            .changed
            .wait_timeout_while(inner, timeout, |inner| inner.state != target)
            .unwrap_or_else(PoisonError::into_inner);

        if result.timed_out() {
            Err(MonitorError::WaitTimeout {
                target: target.as_str(),
                waited: timeout,
            })
        } else {
            Ok(())
        }
    }

    /// Blocks until the monitor is `Stopped` or `timeout` elapses.
    pub fn wait_for_stopped_timeout(&self, timeout: Duration) -> Result<(), MonitorError> {
        self.wait_for_state_timeout(ConnectionState::Stopped, timeout)
    }

    /// Subscribes to state changes. The channel is updated after observers
    /// and the hook have seen the new state.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Waits without blocking the executor until the monitor is in `target`.
    pub async fn wait_for_state_async(&self, target: ConnectionState) -> Result<(), MonitorError> {
        let mut rx = self.subscribe();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| MonitorError::Closed {
                target: target.as_str(),
            })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> MutexGuard<'_, Vec<Weak<dyn StateObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_retry(&self, inner: &mut Inner) {
        if let Some(pending) = inner.retry.take() {
            pending.token.cancel();
        }
        self.retry_pending.store(false, Ordering::Release);
    }

    fn start_locked(&self, inner: &mut Inner) {
        #[cfg(feature = "tracing")]
        tracing::info!(monitor = %self.config.name, "Start");

        self.stopping.store(false, Ordering::Release);
        if self.phys.can_open() {
            // An explicit start supersedes a pending retry.
            self.cancel_retry(inner);
            self.phys.async_open();
            self.change_state(inner, ConnectionState::Opening);
        }
    }

    fn schedule_retry(&self, inner: &mut Inner) {
        // A completion racing an explicit start can fail twice in a row.
        self.cancel_retry(inner);

        let delay = self.config.open_retry;
        let generation = inner.next_generation;
        inner.next_generation = inner.next_generation.wrapping_add(1);

        let this = self.this.clone();
        let token = self.timers.schedule(
            delay,
            Box::new(move || {
                if let Some(monitor) = this.upgrade() {
                    monitor.on_retry_timer(generation);
                }
            }),
        );
        inner.retry = Some(PendingRetry { generation, token });
        self.retry_pending.store(true, Ordering::Release);

        #[cfg(feature = "tracing")]
        tracing::debug!(monitor = %self.config.name, ?delay, "Open retry scheduled");

        self.config.emit(&PhysLayerEvent::RetryScheduled {
            monitor_name: self.config.name.clone(),
            timestamp: Instant::now(),
            delay,
        });
    }

    fn on_retry_timer(&self, generation: u64) {
        let mut inner = self.lock();
        match &inner.retry {
            Some(pending) if pending.generation == generation => {}
            _ => {
                #[cfg(feature = "tracing")]
                tracing::debug!(monitor = %self.config.name, generation, "Discarding stale retry");
                return;
            }
        }
        inner.retry = None;
        self.retry_pending.store(false, Ordering::Release);

        #[cfg(feature = "tracing")]
        tracing::debug!(monitor = %self.config.name, "Open retry timer expired");

        #[cfg(feature = "metrics")]
        counter!("port_open_retries_total", "monitor" => self.config.name.clone()).increment(1);

        self.config.emit(&PhysLayerEvent::RetryFired {
            monitor_name: self.config.name.clone(),
            timestamp: Instant::now(),
        });

        self.start_locked(&mut inner);
    }

    /// The single point where the state changes.
    fn change_state(&self, inner: &mut Inner, next: ConnectionState) {
        if inner.state == next {
            return;
        }

        let from = inner.state;
        inner.state = next;
        self.state_atomic.store(next.code(), Ordering::Release);

        #[cfg(feature = "tracing")]
        tracing::info!(monitor = %self.config.name, %from, to = %next, "Transition to state");

        #[cfg(feature = "metrics")]
        {
            gauge!("port_state", "monitor" => self.config.name.clone())
                .set(f64::from(next.code()));
            counter!(
                "port_state_transitions_total",
                "monitor" => self.config.name.clone(),
                "from" => from.as_str(),
                "to" => next.as_str()
            )
            .increment(1);
        }

        // Released before the calls so observers may register others.
        let observers: Vec<_> = {
            let mut registered = self.lock_observers();
            registered.retain(|o| o.strong_count() > 0);
            registered.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            let _ = catch_unwind(AssertUnwindSafe(|| observer.on_state_change(next)));
        }
        self.invoke_hook(|hook| hook.on_state_change(next));

        self.config.emit(&PhysLayerEvent::StateTransition {
            monitor_name: self.config.name.clone(),
            timestamp: Instant::now(),
            from,
            to: next,
        });

        self.state_tx.send_replace(next);
        self.changed.notify_all();
    }

    fn invoke_hook<F>(&self, f: F)
    where
        F: FnOnce(&dyn UpperLayerHook),
    {
        let _ = catch_unwind(AssertUnwindSafe(|| f(self.hook.as_ref())));
    }
}

impl PhysicalLayerHandler for PhysLayerMonitor {
    fn on_lower_layer_up(&self) {
        let mut inner = self.lock();
        self.invoke_hook(|hook| hook.on_physical_layer_open());
        self.change_state(&mut inner, ConnectionState::Open);

        // A stop issued while the transport could not be closed mid-open
        // still has to converge to Stopped.
        if self.is_stopping() && self.phys.can_close() {
            self.phys.async_close();
        }
    }

    fn on_open_failure(&self) {
        let mut inner = self.lock();

        #[cfg(feature = "tracing")]
        tracing::warn!(monitor = %self.config.name, "Physical layer open failed");

        #[cfg(feature = "metrics")]
        counter!("port_open_failures_total", "monitor" => self.config.name.clone()).increment(1);

        self.config.emit(&PhysLayerEvent::OpenFailed {
            monitor_name: self.config.name.clone(),
            timestamp: Instant::now(),
        });

        self.invoke_hook(|hook| hook.on_physical_layer_open_failure());
        if self.is_stopping() {
            self.change_state(&mut inner, ConnectionState::Stopped);
        } else {
            self.change_state(&mut inner, ConnectionState::Waiting);
            self.schedule_retry(&mut inner);
        }
    }

    fn on_lower_layer_down(&self) {
        let mut inner = self.lock();
        self.invoke_hook(|hook| hook.on_physical_layer_close());
        self.change_state(&mut inner, ConnectionState::Closed);

        if self.is_stopping() {
            self.change_state(&mut inner, ConnectionState::Stopped);
        } else {
            self.start_locked(&mut inner);
        }
    }
}

impl std::fmt::Debug for PhysLayerMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysLayerMonitor")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .field("open_retry", &self.config.open_retry)
            .finish()
    }
}
