//! Error taxonomy for the bridge.
//!
//! # Classes
//! - Transport: connection-level read/write failures, fatal to the connection
//! - Decode: malformed or semantically invalid envelope, fatal to the reader
//! - Handler: a panic inside one request's task, isolated to that request
//! - Encode/write: fatal to the writer
//!
//! # Design Decisions
//! - Errors are reported once, at the component boundary, through the bridge's
//!   error hook; nothing is sent to the peer
//! - No retries anywhere: every fatal condition ends the connection

use std::sync::Arc;

use crate::codec::CodecError;

/// Failure of the underlying message connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket protocol or socket failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] axum::Error),

    /// A text frame was requested for bytes that are not UTF-8.
    #[error("outgoing text frame is not valid UTF-8: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),

    /// Generic I/O failure from a non-WebSocket transport.
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// An inbound frame that cannot become a request.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("invalid method {0:?}")]
    InvalidMethod(String),

    #[error("invalid request uri {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    #[error("invalid value for header {name:?}")]
    InvalidHeaderValue { name: String },
}

/// Everything the pipeline reports through the error hook.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading the next message failed.
    #[error("error obtaining next message: {0}")]
    Read(#[source] TransportError),

    /// The next message could not be decoded into a request.
    #[error("error deserializing request: {0}")]
    Decode(#[from] DecodeError),

    /// The handler panicked; the request produced no regular response.
    #[error("panic while processing request {correlation_id}: {message}")]
    HandlerPanic {
        correlation_id: String,
        message: String,
    },

    /// A response could not be encoded.
    #[error("error encoding response {correlation_id}: {source}")]
    Encode {
        correlation_id: String,
        #[source]
        source: CodecError,
    },

    /// Writing an encoded response failed.
    #[error("error writing response: {0}")]
    Write(#[source] TransportError),

    /// A response reached the writer without a bound request.
    #[error("response is not bound to a request carrying a correlation id")]
    Unbound,

    /// The WebSocket handshake failed after the upgrade response.
    #[error("error upgrading request: {0}")]
    Upgrade(#[source] axum::Error),
}

impl Error {
    /// Short, stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Read(_) => "read",
            Error::Decode(_) => "decode",
            Error::HandlerPanic { .. } => "handler_panic",
            Error::Encode { .. } => "encode",
            Error::Write(_) => "write",
            Error::Unbound => "unbound",
            Error::Upgrade(_) => "upgrade",
        }
    }
}

/// Callback receiving every error the pipeline reports.
pub type ErrorHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// The default hook: one structured `error` event per failure.
pub fn log_error_hook() -> ErrorHook {
    Arc::new(|error: &Error| {
        tracing::error!(kind = error.kind(), error = %error, "wsrest pipeline error");
    })
}
