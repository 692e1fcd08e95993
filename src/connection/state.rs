//! Connection lifecycle states and their atomic storage.

use std::sync::atomic::{AtomicU8, Ordering};

/// WebSocket connection state.
///
/// Lifecycle: `Created` → `HandshakeInFlight` → `Open` → `CloseSent` →
/// `Closed`. A connection that dies before or during the handshake jumps
/// straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Controller exists, handshake not yet started.
    #[default]
    Created,
    /// HTTP upgrade exchange in progress.
    HandshakeInFlight,
    /// Open and ready for data transfer.
    Open,
    /// A Close frame has gone out (ours or confirmed from the peer side),
    /// awaiting completion of the close handshake.
    CloseSent,
    /// Fully closed.
    Closed,
}

impl ConnectionState {
    /// Check if sending application data is allowed in this state.
    ///
    /// Returns `true` only for `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check if receiving is allowed in this state.
    ///
    /// Receiving stays legal through the close handshake; only `Closed`
    /// forbids it.
    #[must_use]
    #[inline]
    pub const fn can_receive(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Created => write!(f, "Created"),
            ConnectionState::HandshakeInFlight => write!(f, "HandshakeInFlight"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::CloseSent => write!(f, "CloseSent"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Lock-free state cell shared across the send and receive paths.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Created as u8))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectionState::Created,
            1 => ConnectionState::HandshakeInFlight,
            2 => ConnectionState::Open,
            3 => ConnectionState::CloseSent,
            _ => ConnectionState::Closed,
        }
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Created);
        assert_eq!(StateCell::new().get(), ConnectionState::Created);
    }

    #[test]
    fn test_can_send_in_each_state() {
        assert!(!ConnectionState::Created.can_send());
        assert!(!ConnectionState::HandshakeInFlight.can_send());
        assert!(ConnectionState::Open.can_send());
        assert!(!ConnectionState::CloseSent.can_send());
        assert!(!ConnectionState::Closed.can_send());
    }

    #[test]
    fn test_can_receive_in_each_state() {
        assert!(ConnectionState::Open.can_receive());
        assert!(ConnectionState::CloseSent.can_receive());
        assert!(!ConnectionState::Closed.can_receive());
    }

    #[test]
    fn test_cell_round_trips_every_state() {
        let cell = StateCell::new();
        for state in [
            ConnectionState::Created,
            ConnectionState::HandshakeInFlight,
            ConnectionState::Open,
            ConnectionState::CloseSent,
            ConnectionState::Closed,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Open.to_string(), "Open");
        assert_eq!(ConnectionState::CloseSent.to_string(), "CloseSent");
    }
}
