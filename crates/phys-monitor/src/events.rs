use crate::state::ConnectionState;
use phys_monitor_core::events::MonitorEvent;
use std::time::{Duration, Instant};

/// Events emitted by a physical-layer monitor.
#[derive(Debug, Clone)]
pub enum PhysLayerEvent {
    /// The connectivity state changed.
    StateTransition {
        monitor_name: String,
        timestamp: Instant,
        from: ConnectionState,
        to: ConnectionState,
    },
    /// An open attempt failed.
    OpenFailed {
        monitor_name: String,
        timestamp: Instant,
    },
    /// A retry timer was armed after a failed open.
    RetryScheduled {
        monitor_name: String,
        timestamp: Instant,
        delay: Duration,
    },
    /// A retry timer fired and the monitor re-ran its start logic.
    RetryFired {
        monitor_name: String,
        timestamp: Instant,
    },
    /// `stop()` was called.
    StopRequested {
        monitor_name: String,
        timestamp: Instant,
    },
    /// `reconnect()` was called.
    ReconnectRequested {
        monitor_name: String,
        timestamp: Instant,
    },
}

impl MonitorEvent for PhysLayerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PhysLayerEvent::StateTransition { .. } => "state_transition",
            PhysLayerEvent::OpenFailed { .. } => "open_failed",
            PhysLayerEvent::RetryScheduled { .. } => "retry_scheduled",
            PhysLayerEvent::RetryFired { .. } => "retry_fired",
            PhysLayerEvent::StopRequested { .. } => "stop_requested",
            PhysLayerEvent::ReconnectRequested { .. } => "reconnect_requested",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            PhysLayerEvent::StateTransition { timestamp, .. }
            | PhysLayerEvent::OpenFailed { timestamp, .. }
            | PhysLayerEvent::RetryScheduled { timestamp, .. }
            | PhysLayerEvent::RetryFired { timestamp, .. }
            | PhysLayerEvent::StopRequested { timestamp, .. }
            | PhysLayerEvent::ReconnectRequested { timestamp, .. } => *timestamp,
        }
    }

    fn monitor_name(&self) -> &str {
        match self {
            PhysLayerEvent::StateTransition { monitor_name, .. }
            | PhysLayerEvent::OpenFailed { monitor_name, .. }
            | PhysLayerEvent::RetryScheduled { monitor_name, .. }
            | PhysLayerEvent::RetryFired { monitor_name, .. }
            | PhysLayerEvent::StopRequested { monitor_name, .. }
            | PhysLayerEvent::ReconnectRequested { monitor_name, .. } => monitor_name,
        }
    }
}
