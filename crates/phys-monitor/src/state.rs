//! Connectivity states of a monitored physical layer.

use std::fmt;

/// Connectivity state of the physical layer as seen by its monitor.
///
/// The states are mutually exclusive. A freshly built monitor is
/// [`Stopped`](ConnectionState::Stopped).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// At rest: no open in flight and no retry pending.
    #[default]
    Stopped = 0,

    /// An asynchronous open has been issued; awaiting its completion.
    Opening = 1,

    /// The transport is connected and usable by upper layers.
    Open = 2,

    /// The transport just went down from `Open`. Always followed immediately
    /// by `Stopped` or a new `Opening`.
    Closed = 3,

    /// An open failed and a retry is scheduled.
    Waiting = 4,
}

impl ConnectionState {
    /// All states, in code order.
    pub const ALL: [ConnectionState; 5] = [
        ConnectionState::Stopped,
        ConnectionState::Opening,
        ConnectionState::Open,
        ConnectionState::Closed,
        ConnectionState::Waiting,
    ];

    /// Canonical name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Stopped => "Stopped",
            ConnectionState::Opening => "Opening",
            ConnectionState::Open => "Open",
            ConnectionState::Closed => "Closed",
            ConnectionState::Waiting => "Waiting",
        }
    }

    /// Numeric code published on the `port_state` gauge.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Opening,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closed,
            4 => ConnectionState::Waiting,
            _ => ConnectionState::Stopped,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
