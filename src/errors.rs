use std::time::Duration;

use crate::session::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect websocket {url}: {message}")]
    Connect { url: String, message: String },
    #[error("websocket send failed: {0}")]
    Send(String),
    #[error("websocket read failed: {0}")]
    Receive(String),
    #[error("websocket closed by peer")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum WsJsonError {
    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),
    #[error("a handshake is already in progress")]
    AlreadyConnecting,
    #[error("session is already connected")]
    AlreadyConnected,
    #[error("session is not connected (state: {0})")]
    NotConnected(SessionState),
    #[error("authentication rejected: {0}")]
    AuthenticationRejected(String),
    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("no response for `{service}` within {limit:?}")]
    CallTimeout { service: String, limit: Duration },
    #[error("service `{0}` is not registered")]
    UnknownService(String),
    #[error("invalid arguments for `{service}`: {message}")]
    InvalidArgs {
        service: &'static str,
        message: String,
    },
    #[error("session closed")]
    SessionClosed,
    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
