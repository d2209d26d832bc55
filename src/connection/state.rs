//! Connection lifecycle state.

/// WebSocket connection state.
///
/// A connection is created `Open` once the handshake succeeded and becomes
/// `Closed` on the first fatal error, on a close frame from the peer, or
/// when it is closed locally. There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Connection is open and ready for data transfer.
    #[default]
    Open,
    /// Connection is closed; reads and writes fail.
    Closed,
}

impl ConnectionState {
    /// Check if reads and writes are allowed in this state.
    #[must_use]
    #[inline]
    pub const fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Open);
    }

    #[test]
    fn test_is_open() {
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Closed.is_open());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Open.to_string(), "Open");
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
    }
}
