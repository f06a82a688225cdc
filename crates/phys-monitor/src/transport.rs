//! Contract between a monitor and the byte transport it supervises.

use std::sync::Weak;

/// Callback sink for transport lifecycle completions.
///
/// A transport reports the outcome of every asynchronous request through
/// exactly one bound handler. Implementations of [`PhysicalLayer`] must call
/// these methods from their own dispatch context, never from inside
/// [`PhysicalLayer::async_open`] or [`PhysicalLayer::async_close`].
pub trait PhysicalLayerHandler: Send + Sync {
    /// An open completed and the transport is usable ("lower layer up").
    fn on_lower_layer_up(&self);

    /// An open attempt failed.
    fn on_open_failure(&self);

    /// The transport went down, either after a requested close or on its own
    /// ("lower layer down").
    fn on_lower_layer_down(&self);
}

/// A byte-stream endpoint (serial port, TCP client or server) that opens and
/// closes asynchronously.
///
/// Capability queries must be free of side effects. Open and close only
/// initiate work; completion is always reported through the bound
/// [`PhysicalLayerHandler`].
pub trait PhysicalLayer: Send + Sync {
    /// Binds the handler that receives completions. Called once, when the
    /// monitor is constructed.
    fn set_handler(&self, handler: Weak<dyn PhysicalLayerHandler>);

    /// Whether an open may be issued right now.
    fn can_open(&self) -> bool;

    /// Whether a close may be issued right now.
    fn can_close(&self) -> bool;

    /// Whether the transport is fully closed.
    fn is_closed(&self) -> bool;

    /// Starts an asynchronous open.
    fn async_open(&self);

    /// Starts an asynchronous close.
    fn async_close(&self);
}
