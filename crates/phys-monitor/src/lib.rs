//! Connection lifecycle supervision for physical-layer transports.
//!
//! A [`PhysLayerMonitor`] sits between a byte transport (serial port, TCP
//! client or server) and the protocol layers stacked on it. It opens the
//! transport, retries failed opens on a fixed interval, reopens the transport
//! when it drops and closes it on request, notifying upper layers and
//! observers of every connectivity change.
//!
//! # Features
//!
//! - **State machine**: `Stopped`, `Opening`, `Open`, `Closed`, `Waiting`
//! - **Fixed-interval retry**: failed opens retry forever until stopped
//! - **Observers and hooks**: weakly held observers plus one upper-layer hook
//! - **Blocking and async waits**: wait for a state from threads or tasks
//! - **Event system**: `PhysLayerEvent` listeners configured on the builder
//! - **Metrics** (`metrics` feature): `port_state` gauge and transition counters
//! - **Tracing** (`tracing` feature): logs every transition
//!
//! # Examples
//!
//! ```rust
//! use phys_monitor::{loopback, ConnectionState, MonitorConfig, PhysLayerMonitor, TokioTimerSource};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (acceptor, initiator) = loopback::pair(&tokio::runtime::Handle::current());
//! let timers = std::sync::Arc::new(TokioTimerSource::current());
//!
//! let config = MonitorConfig::builder()
//!     .name("server")
//!     .open_retry(Duration::from_millis(100))
//!     .build();
//! let server = PhysLayerMonitor::new(config, acceptor, timers.clone());
//!
//! let config = MonitorConfig::builder()
//!     .name("client")
//!     .open_retry(Duration::from_millis(100))
//!     .build();
//! let client = PhysLayerMonitor::new(config, initiator, timers);
//!
//! server.start();
//! client.start();
//! client.wait_for_state_async(ConnectionState::Open).await.unwrap();
//!
//! client.stop();
//! server.stop();
//! server.wait_for_state_async(ConnectionState::Stopped).await.unwrap();
//! # }
//! ```

mod config;
mod events;
mod hook;
pub mod loopback;
mod monitor;
mod state;
mod timer;
mod transport;

pub use config::{DEFAULT_NAME, DEFAULT_OPEN_RETRY, MonitorConfig, MonitorConfigBuilder};
pub use events::PhysLayerEvent;
pub use hook::{NoopHook, StateObserver, UpperLayerHook};
pub use monitor::PhysLayerMonitor;
pub use state::ConnectionState;
pub use timer::{TimerCallback, TimerSource, TimerToken, TokioTimerSource};
pub use transport::{PhysicalLayer, PhysicalLayerHandler};

pub use phys_monitor_core::{EventListener, FnListener, MonitorError, MonitorEvent};
