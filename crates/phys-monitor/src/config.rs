use crate::events::PhysLayerEvent;
use crate::state::ConnectionState;
use phys_monitor_core::events::{EventListener, EventListeners, FnListener};
use std::time::Duration;

/// Default delay between a failed open and the next attempt.
pub const DEFAULT_OPEN_RETRY: Duration = Duration::from_secs(5);

/// Default monitor name used in logs, metric labels and events.
pub const DEFAULT_NAME: &str = "phys_monitor";

/// Configuration for a physical-layer monitor.
///
/// The retry interval is fixed: there is no backoff growth and no attempt
/// limit. A monitor keeps retrying until it is stopped.
#[derive(Clone)]
pub struct MonitorConfig {
    pub(crate) name: String,
    pub(crate) open_retry: Duration,
    pub(crate) event_listeners: EventListeners<PhysLayerEvent>,
}

impl std::fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("name", &self.name)
            .field("open_retry", &self.open_retry)
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

impl MonitorConfig {
    /// Creates a new builder for configuring a monitor.
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }

    /// Returns the monitor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the delay between a failed open and the next attempt.
    pub fn open_retry(&self) -> Duration {
        self.open_retry
    }

    pub(crate) fn emit(&self, event: &PhysLayerEvent) {
        self.event_listeners.emit(event);
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfigBuilder::default().build()
    }
}

/// Builder for constructing a [`MonitorConfig`].
pub struct MonitorConfigBuilder {
    name: String,
    open_retry: Duration,
    event_listeners: EventListeners<PhysLayerEvent>,
}

impl std::fmt::Debug for MonitorConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorConfigBuilder")
            .field("name", &self.name)
            .field("open_retry", &self.open_retry)
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

impl MonitorConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the monitor name.
    ///
    /// # Examples
    ///
    /// ```
    /// use phys_monitor::MonitorConfig;
    ///
    /// let config = MonitorConfig::builder().name("outstation-tcp").build();
    /// assert_eq!(config.name(), "outstation-tcp");
    /// ```
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the fixed delay between a failed open and the next attempt.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use phys_monitor::MonitorConfig;
    ///
    /// let config = MonitorConfig::builder()
    ///     .open_retry(Duration::from_millis(100))
    ///     .build();
    /// assert_eq!(config.open_retry(), Duration::from_millis(100));
    /// ```
    pub fn open_retry(mut self, open_retry: Duration) -> Self {
        self.open_retry = open_retry;
        self
    }

    /// Registers a listener for every monitor event.
    ///
    /// Listeners run with the monitor lock held. They may query the monitor
    /// (`state`, `is_stopping`, `has_pending_retry`) but must not call
    /// `start`, `stop`, `reconnect` or a blocking wait on it. The same holds
    /// for the `on_*` helpers below.
    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: EventListener<PhysLayerEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback invoked on each state transition with the old and
    /// new states.
    ///
    /// # Examples
    ///
    /// ```
    /// use phys_monitor::MonitorConfig;
    ///
    /// let config = MonitorConfig::builder()
    ///     .on_state_transition(|from, to| {
    ///         println!("port state: {} -> {}", from, to);
    ///     })
    ///     .build();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(ConnectionState, ConnectionState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &PhysLayerEvent| {
                if let PhysLayerEvent::StateTransition { from, to, .. } = event {
                    f(*from, *to);
                }
            }));
        self
    }

    /// Registers a callback invoked each time an open attempt fails.
    pub fn on_open_failure<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &PhysLayerEvent| {
                if matches!(event, PhysLayerEvent::OpenFailed { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback invoked with the delay each time a retry is armed.
    pub fn on_retry_scheduled<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &PhysLayerEvent| {
                if let PhysLayerEvent::RetryScheduled { delay, .. } = event {
                    f(*delay);
                }
            }));
        self
    }

    /// Builds the [`MonitorConfig`].
    ///
    /// # Panics
    ///
    /// Panics if the name is empty or the retry interval is zero.
    pub fn build(self) -> MonitorConfig {
        assert!(!self.name.is_empty(), "monitor name must not be empty");
        assert!(
            !self.open_retry.is_zero(),
            "open_retry must be greater than zero"
        );

        MonitorConfig {
            name: self.name,
            open_retry: self.open_retry,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for MonitorConfigBuilder {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            open_retry: DEFAULT_OPEN_RETRY,
            event_listeners: EventListeners::new(),
        }
    }
}
