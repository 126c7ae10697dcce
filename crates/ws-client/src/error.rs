use std::sync::Arc;
use std::time::Duration;

use tokio_tungstenite::tungstenite;

/// Server-side JSON-RPC error object.
///
/// Decoded from the `error` field of a response body. When the body cannot
/// be decoded into this shape the client synthesizes one with
/// [`ServerError::SERVER_ERROR_CODE`] and the raw body as the message.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, thiserror::Error)]
#[error("jsonrpc error {code}: {message}")]
pub struct ServerError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ServerError {
    /// Generic server error code, used when the error envelope itself does
    /// not decode.
    pub const SERVER_ERROR_CODE: i64 = -32000;
}

/// Errors surfaced by the websocket client.
///
/// Errors that are fanned out to many subscriptions at once (transport
/// failures in particular) are `Clone`; non-clonable sources are shared
/// through an [`Arc`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("new ws client: handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
    #[error("new ws client: dial: {0}")]
    Dial(Arc<tungstenite::Error>),
    #[error("connection error: {0}")]
    Transport(Arc<tungstenite::Error>),
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("read deadline exceeded, no message within {0:?}")]
    ReadTimeout(Duration),
    #[error("unable to encode subscription request: {0}")]
    Encode(Arc<serde_json::Error>),
    #[error("unable to write request: {0}")]
    Write(Arc<tungstenite::Error>),
    #[error("write deadline exceeded")]
    WriteTimeout,
    #[error("unable to decode client response: {0}")]
    Decode(Arc<serde_json::Error>),
    #[error("result is null")]
    NullResult,
    #[error(transparent)]
    Server(ServerError),
    #[error("reached channel max capacity {0}")]
    ChannelFull(usize),
    #[error("unsubscribed by caller")]
    Unsubscribed,
    #[error("subscription closed")]
    SubscriptionClosed,
    #[error("receive cancelled")]
    Cancelled,
}
