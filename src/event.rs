use crate::model::bar::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    ErroredPendingRetry,
}

impl ConnectionState {
    /// Label for the status indicator. A session waiting to retry shows as
    /// disconnected.
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Idle => "IDLE",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Disconnected | ConnectionState::ErroredPendingRetry => "DISCONNECTED",
        }
    }
}

/// Pushed to whatever handler is currently wired to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    State(ConnectionState),
    /// A bar tick was integrated into the buffer.
    Bar(Bar),
    Error(String),
}

/// Immutable view of a session, published after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub market_id: String,
    pub state: ConnectionState,
    pub bars: Vec<Bar>,
    pub latest: Option<Bar>,
    pub last_error: Option<String>,
    /// Failed attempts since the last successful connection.
    pub reconnect_attempts: u32,
}

impl SessionSnapshot {
    pub fn idle(market_id: &str) -> Self {
        Self {
            market_id: market_id.to_string(),
            state: ConnectionState::Idle,
            bars: Vec::new(),
            latest: None,
            last_error: None,
            reconnect_attempts: 0,
        }
    }
}
