//! Envelope codec subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound frame (bytes)
//!     → Codec::decode_request
//!     → RequestEnvelope { id, method, requestUri, header, body }
//!
//! ResponseEnvelope { id, statusCode, requestUri, header, body }
//!     → Codec::encode_response
//!     → Outbound frame (bytes)
//! ```
//!
//! # Design Decisions
//! - Codecs are stateless per call; the pipeline owns buffers and reuse
//! - The peer-side mirror (encode_request / decode_response) lives on the same
//!   trait so one format can be driven symmetrically
//! - JSON is the default wire format; other formats plug in through `Codec`

pub mod envelope;
pub mod json;

pub use envelope::{HeaderMultimap, RequestEnvelope, ResponseEnvelope};
pub use json::JsonCodec;

/// Error raised while turning frames into envelopes or back.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame is not a well-formed JSON envelope.
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by a non-JSON codec.
    #[error("codec failure: {0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

/// Wire format for request and response envelopes.
///
/// One frame on the connection carries exactly one envelope.
pub trait Codec: Send + Sync + 'static {
    /// Decode an inbound frame into a request envelope.
    fn decode_request(&self, frame: &[u8]) -> Result<RequestEnvelope, CodecError>;

    /// Encode a response envelope, appending the frame bytes to `out`.
    fn encode_response(
        &self,
        envelope: &ResponseEnvelope,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError>;

    /// Encode a request envelope (peer side).
    fn encode_request(&self, envelope: &RequestEnvelope, out: &mut Vec<u8>)
        -> Result<(), CodecError>;

    /// Decode a response frame (peer side).
    fn decode_response(&self, frame: &[u8]) -> Result<ResponseEnvelope, CodecError>;
}
