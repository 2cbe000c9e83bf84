use thiserror::Error;

/// A single inbound frame could not be turned into a [`StreamEvent`].
///
/// Decode failures are never fatal to a session: the frame is dropped and the
/// connection stays open.
///
/// [`StreamEvent`]: crate::feed::decoder::StreamEvent
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("frame has no `type` discriminator")]
    MissingType,

    #[error("`{kind}` frame is missing `{field}`")]
    MissingField { kind: String, field: &'static str },

    #[error("invalid bar payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("config error: {0}")]
    Config(String),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid subscription address: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl FeedError {
    /// Errors that mean the connection is gone and a reconnect is due.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FeedError::Transport(_) | FeedError::Http(_) | FeedError::WebSocket(_)
        )
    }
}
