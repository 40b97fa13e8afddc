//! WebSocket transport adapter.
//!
//! # Responsibilities
//! - Expose a WebSocket as a stream of inbound frames and a sink of outbound frames
//! - Hide control frames from the pipeline
//!
//! # Data Flow
//! ```text
//! WebSocket ──split──┬─ SplitStream<Message> → frames() → Stream<Result<Bytes>>  → reader
//!                    └─ SplitSink<Message>   ← sink()   ← Sink<Bytes>           ← writer
//! ```
//!
//! # Design Decisions
//! - Text and binary frames both carry envelopes
//! - Ping/pong are answered by axum and skipped here
//! - A close frame ends the inbound stream like a clean EOF

use bytes::Bytes;
use futures_util::future;
use futures_util::stream::{self, Stream, StreamExt};
use futures_util::{Sink, SinkExt};

use axum::extract::ws::Message;

use crate::config::MessageKind;
use crate::error::TransportError;

/// Inbound payload frames of a WebSocket stream half.
pub fn frames<S>(messages: S) -> impl Stream<Item = Result<Bytes, TransportError>> + Send
where
    S: Stream<Item = Result<Message, axum::Error>> + Send + Unpin,
{
    stream::unfold(messages, |mut messages| async move {
        loop {
            let frame = match messages.next().await? {
                Ok(Message::Text(text)) => Ok(Bytes::copy_from_slice(text.as_str().as_bytes())),
                Ok(Message::Binary(data)) => Ok(data),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "Peer sent close frame");
                    return None;
                }
                Err(e) => Err(TransportError::from(e)),
            };
            return Some((frame, messages));
        }
    })
}

/// Outbound sink writing each payload as one `kind` frame.
pub fn sink<W>(messages: W, kind: MessageKind) -> impl Sink<Bytes, Error = TransportError> + Send
where
    W: Sink<Message, Error = axum::Error> + Send + Unpin,
{
    messages.with(move |frame: Bytes| future::ready(to_message(frame, kind)))
}

fn to_message(frame: Bytes, kind: MessageKind) -> Result<Message, TransportError> {
    match kind {
        MessageKind::Binary => Ok(Message::Binary(frame)),
        MessageKind::Text => {
            let text = String::from_utf8(Vec::from(frame))?;
            Ok(Message::Text(text.into()))
        }
    }
}
