//! Status enums shared by mirror sessions and the discovery query.

/// Connection status of a mirror session.
///
/// `Idle → Connecting → Connected | Snapshot → Disconnected`, and `Disconnected`
/// may go back to `Connecting` on an explicit reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Never connected.
    #[default]
    Idle,
    /// Establishing the WebSocket connection.
    Connecting,
    /// Live and receiving updates.
    Connected,
    /// Showing a property tree restored from a saved snapshot, no live connection.
    Snapshot,
    /// Connection closed or failed. No automatic retry.
    Disconnected,
}

impl ConnectionStatus {
    /// Whether entering this status rebuilds the element tree.
    pub fn has_tree(self) -> bool {
        matches!(self, Self::Connected | Self::Snapshot)
    }

    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Idle | Disconnected | Snapshot, Connecting) => true,
            (Idle | Disconnected, Snapshot) => true,
            (Connecting, Connected) => true,
            (_, Disconnected) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Snapshot => write!(f, "Snapshot"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Status of the canvas discovery query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Querying,
    SuccessfulQuery,
    QueryFailed,
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Querying => write!(f, "Querying"),
            Self::SuccessfulQuery => write!(f, "Query succeeded"),
            Self::QueryFailed => write!(f, "Query failed"),
        }
    }
}
