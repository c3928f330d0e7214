//! Connection lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Connection state owned by the sync client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Initial and terminal state
    #[default]
    Disconnected,
    /// Socket open requested, handshake in flight
    Connecting,
    /// Transport open and delivering messages
    Connected,
}

/// Inputs that drive [`ConnectionState`] transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// `connect()` was called
    ConnectRequested,
    /// The socket opener resolved or the transport reported open
    Opened,
    /// Opening failed or the transport reported an error
    Failed,
    /// The transport closed or `disconnect()` was called
    Closed,
}

impl ConnectionState {
    /// Apply an event, returning the next state if it changes
    ///
    /// Events that are meaningless in the current state yield `None` and
    /// leave the state untouched.
    pub fn transition(self, event: ConnectionEvent) -> Option<ConnectionState> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Disconnected, ConnectRequested) => Some(Connecting),
            (Connecting, Opened) => Some(Connected),
            (Connecting | Connected, Failed | Closed) => Some(Disconnected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = ConnectionState::default();
        let state = state.transition(ConnectionEvent::ConnectRequested).unwrap();
        assert_eq!(state, ConnectionState::Connecting);
        let state = state.transition(ConnectionEvent::Opened).unwrap();
        assert_eq!(state, ConnectionState::Connected);
        let state = state.transition(ConnectionEvent::Closed).unwrap();
        assert_eq!(state, ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_only_from_disconnected() {
        assert_eq!(
            ConnectionState::Connected.transition(ConnectionEvent::ConnectRequested),
            None
        );
        assert_eq!(
            ConnectionState::Connecting.transition(ConnectionEvent::ConnectRequested),
            None
        );
    }

    #[test]
    fn test_failure_during_handshake() {
        assert_eq!(
            ConnectionState::Connecting.transition(ConnectionEvent::Failed),
            Some(ConnectionState::Disconnected)
        );
        assert_eq!(
            ConnectionState::Disconnected.transition(ConnectionEvent::Closed),
            None
        );
    }
}
