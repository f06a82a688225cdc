//! Error types shared by the physical-layer monitor crates.
//!
//! Connectivity failures are never reported through [`MonitorError`]. An open
//! that fails or a link that drops is a state transition, observed through
//! observers, hooks and events. The only errors a caller can receive come from
//! the bounded wait primitives:
//!
//! ```rust
//! use phys_monitor_core::MonitorError;
//! use std::time::Duration;
//!
//! fn describe(error: &MonitorError) -> String {
//!     match error {
//!         MonitorError::WaitTimeout { target, waited } => {
//!             format!("still not {} after {:?}", target, waited)
//!         }
//!         MonitorError::Closed { target } => format!("monitor gone before {}", target),
//!     }
//! }
//!
//! let err = MonitorError::WaitTimeout {
//!     target: "Open",
//!     waited: Duration::from_millis(250),
//! };
//! assert!(describe(&err).contains("Open"));
//! ```

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the wait primitives of a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// The target state was not reached within the allotted time.
    #[error("timed out after {waited:?} waiting for state {target}")]
    WaitTimeout {
        /// Name of the state that was awaited.
        target: &'static str,
        /// How long the caller waited.
        waited: Duration,
    },

    /// The monitor was dropped before the target state was reached.
    #[error("monitor dropped while waiting for state {target}")]
    Closed {
        /// Name of the state that was awaited.
        target: &'static str,
    },
}

impl MonitorError {
    /// Returns `true` if this is a wait timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MonitorError::WaitTimeout { .. })
    }

    /// Returns `true` if the monitor went away while waiting.
    pub fn is_closed(&self) -> bool {
        matches!(self, MonitorError::Closed { .. })
    }

    /// Name of the state the failed wait was targeting.
    pub fn target(&self) -> &'static str {
        match self {
            MonitorError::WaitTimeout { target, .. } | MonitorError::Closed { target } => target,
        }
    }
}
