//! In-memory transport pair sharing one endpoint.
//!
//! [`pair`] returns an acceptor (server side) and an initiator (client side).
//! The acceptor's open completes once an initiator connects; an initiator's
//! open is refused unless the acceptor is listening. Closing either end of an
//! established link takes both ends down.
//!
//! Completions are queued and delivered in request order by a single
//! dispatcher task on the given runtime, never from inside `async_open` or
//! `async_close`.

use crate::transport::{PhysicalLayer, PhysicalLayerHandler};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Which end of the endpoint a layer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Listens and accepts one connection.
    Acceptor,
    /// Connects to a listening acceptor.
    Initiator,
}

impl Role {
    fn peer(self) -> Role {
        match self {
            Role::Acceptor => Role::Initiator,
            Role::Initiator => Role::Acceptor,
        }
    }
}

/// Status of one end of the loopback link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Closed,
    /// Listening (acceptor) or connecting (initiator).
    Opening,
    Open,
    /// A close or failure was requested and has not been delivered yet.
    Closing,
}

#[derive(Debug, Clone, Copy)]
enum Completion {
    /// An initiator asked to connect to a listening acceptor.
    Connect,
    /// The open of this end failed or was abandoned.
    Failed(Role),
    /// This established end went down.
    Down(Role),
}

#[derive(Clone, Copy)]
enum Notify {
    Up,
    Failed,
    Down,
}

struct Side {
    status: LinkStatus,
    handler: Option<Weak<dyn PhysicalLayerHandler>>,
}

impl Side {
    fn new() -> Self {
        Self {
            status: LinkStatus::Closed,
            handler: None,
        }
    }
}

struct Sides {
    acceptor: Side,
    initiator: Side,
}

impl Sides {
    fn side(&mut self, role: Role) -> &mut Side {
        match role {
            Role::Acceptor => &mut self.acceptor,
            Role::Initiator => &mut self.initiator,
        }
    }
}

struct Port {
    sides: Mutex<Sides>,
    queue: mpsc::UnboundedSender<Completion>,
}

impl Port {
    fn lock(&self) -> MutexGuard<'_, Sides> {
        self.sides.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, completion: Completion) {
        // The dispatcher outlives every layer, so the send only fails while
        // the runtime itself is shutting down.
        let _ = self.queue.send(completion);
    }

    fn complete(&self, completion: Completion) {
        let mut deliveries = Vec::new();
        {
            let mut guard = self.lock();
            let sides: &mut Sides = &mut guard;
            let mut notify = |sides: &mut Sides, role: Role, status: LinkStatus, n: Notify| {
                let side = sides.side(role);
                side.status = status;
                if let Some(handler) = side.handler.as_ref().and_then(Weak::upgrade) {
                    deliveries.push((handler, n));
                }
            };

            match completion {
                Completion::Connect => {
                    let acceptor = sides.acceptor.status;
                    let initiator = sides.initiator.status;
                    if acceptor == LinkStatus::Opening && initiator == LinkStatus::Opening {
                        notify(sides, Role::Acceptor, LinkStatus::Open, Notify::Up);
                        notify(sides, Role::Initiator, LinkStatus::Open, Notify::Up);
                    } else if initiator == LinkStatus::Opening {
                        notify(sides, Role::Initiator, LinkStatus::Closed, Notify::Failed);
                    }
                }
                Completion::Failed(role) => {
                    if matches!(
                        sides.side(role).status,
                        LinkStatus::Opening | LinkStatus::Closing
                    ) {
                        notify(sides, role, LinkStatus::Closed, Notify::Failed);
                    }
                }
                Completion::Down(role) => {
                    if matches!(
                        sides.side(role).status,
                        LinkStatus::Open | LinkStatus::Closing
                    ) {
                        notify(sides, role, LinkStatus::Closed, Notify::Down);
                    }
                }
            }
        }

        for (handler, n) in deliveries {
            match n {
                Notify::Up => handler.on_lower_layer_up(),
                Notify::Failed => handler.on_open_failure(),
                Notify::Down => handler.on_lower_layer_down(),
            }
        }
    }

    /// Takes an established link down on both ends.
    fn break_link(&self, sides: &mut Sides, role: Role) {
        for end in [role, role.peer()] {
            let side = sides.side(end);
            if side.status == LinkStatus::Open {
                side.status = LinkStatus::Closing;
                self.enqueue(Completion::Down(end));
            }
        }
    }
}

/// One end of a loopback link.
pub struct LoopbackLayer {
    role: Role,
    port: Arc<Port>,
}

impl LoopbackLayer {
    /// Which end this layer is.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current status of this end.
    pub fn status(&self) -> LinkStatus {
        self.port.lock().side(self.role).status
    }

    /// Simulates the link failing underneath both ends without anyone
    /// asking for a close.
    pub fn drop_link(&self) {
        let mut sides = self.port.lock();
        self.port.break_link(&mut sides, self.role);
    }
}

impl PhysicalLayer for LoopbackLayer {
    fn set_handler(&self, handler: Weak<dyn PhysicalLayerHandler>) {
        self.port.lock().side(self.role).handler = Some(handler);
    }

    fn can_open(&self) -> bool {
        self.status() == LinkStatus::Closed
    }

    fn can_close(&self) -> bool {
        matches!(self.status(), LinkStatus::Opening | LinkStatus::Open)
    }

    fn is_closed(&self) -> bool {
        self.status() == LinkStatus::Closed
    }

    fn async_open(&self) {
        let mut sides = self.port.lock();
        if sides.side(self.role).status != LinkStatus::Closed {
            return;
        }
        sides.side(self.role).status = LinkStatus::Opening;

        #[cfg(feature = "tracing")]
        tracing::debug!(role = ?self.role, "Loopback open requested");

        match self.role {
            Role::Acceptor => {}
            Role::Initiator if sides.acceptor.status == LinkStatus::Opening => {
                self.port.enqueue(Completion::Connect);
            }
            Role::Initiator => self.port.enqueue(Completion::Failed(Role::Initiator)),
        }
    }

    fn async_close(&self) {
        let mut sides = self.port.lock();

        #[cfg(feature = "tracing")]
        tracing::debug!(role = ?self.role, "Loopback close requested");

        match sides.side(self.role).status {
            LinkStatus::Opening => {
                sides.side(self.role).status = LinkStatus::Closing;
                self.port.enqueue(Completion::Failed(self.role));
            }
            LinkStatus::Open => self.port.break_link(&mut sides, self.role),
            LinkStatus::Closed | LinkStatus::Closing => {}
        }
    }
}

impl std::fmt::Debug for LoopbackLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackLayer")
            .field("role", &self.role)
            .field("status", &self.status())
            .finish()
    }
}

async fn dispatch(port: Weak<Port>, mut queue: mpsc::UnboundedReceiver<Completion>) {
    while let Some(completion) = queue.recv().await {
        let Some(port) = port.upgrade() else {
            break;
        };
        port.complete(completion);
    }
}

/// Creates a connected acceptor/initiator pair whose completions are
/// delivered on `handle`.
pub fn pair(handle: &Handle) -> (Arc<LoopbackLayer>, Arc<LoopbackLayer>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let port = Arc::new(Port {
        sides: Mutex::new(Sides {
            acceptor: Side::new(),
            initiator: Side::new(),
        }),
        queue: tx,
    });
    handle.spawn(dispatch(Arc::downgrade(&port), rx));

    let acceptor = Arc::new(LoopbackLayer {
        role: Role::Acceptor,
        port: Arc::clone(&port),
    });
    let initiator = Arc::new(LoopbackLayer {
        role: Role::Initiator,
        port,
    });
    (acceptor, initiator)
}
