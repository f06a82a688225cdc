//! Core infrastructure for the physical-layer monitor.
//!
//! This crate provides the pieces shared by every monitor crate:
//! - Event system for observability
//! - Error type for the wait primitives

pub mod error;
pub mod events;

pub use error::MonitorError;
pub use events::{BoxedEventListener, EventListener, EventListeners, FnListener, MonitorEvent};
