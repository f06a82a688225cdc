//! Listener plumbing for monitor events.
//!
//! A monitor owns one [`EventListeners`] collection, fixed when its
//! configuration is built. Events are delivered synchronously on whichever
//! thread drove the transition, usually a transport completion or a retry
//! timer, so listeners must return quickly.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

/// An event a monitor publishes to its listeners.
pub trait MonitorEvent: Send + Sync + fmt::Debug {
    /// Stable snake_case kind, such as `"open_failed"`.
    fn event_type(&self) -> &'static str;

    fn timestamp(&self) -> Instant;

    /// Name of the monitor that published the event.
    fn monitor_name(&self) -> &str;
}

/// Receives every event of type `E`.
pub trait EventListener<E: MonitorEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

/// A listener that can be registered with more than one monitor.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// Ordered set of listeners for one monitor. Cloning shares the listeners.
#[derive(Clone)]
pub struct EventListeners<E: MonitorEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: MonitorEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.add_shared(Arc::new(listener));
    }

    /// Registers a listener that is already shared elsewhere.
    pub fn add_shared(&mut self, listener: BoxedEventListener<E>) {
        self.listeners.push(listener);
    }

    /// Delivers `event` to each listener in registration order.
    ///
    /// Monitors emit with their state lock held. A listener panic is caught
    /// here so it cannot poison that lock or starve later listeners.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: MonitorEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: MonitorEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: MonitorEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
