//! JSON envelope format.
//!
//! ```text
//! {"id":"1","method":"GET","requestUri":"/users?limit=2","header":{"Accept":["*/*"]},"body":null}
//! {"id":"1","statusCode":200,"requestUri":"/users?limit=2","header":{},"body":{"users":[]}}
//! ```
//!
//! `body` embeds JSON bodies verbatim when that is lossless: the bytes are one
//! JSON value with no surrounding whitespace, and that value is neither a
//! string nor `null`. Every other body travels as a JSON string, empty bodies
//! as `null`.

use serde::Serialize;

use crate::codec::{Codec, CodecError, RequestEnvelope, ResponseEnvelope};

/// The default codec: one JSON object per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn decode_request(&self, frame: &[u8]) -> Result<RequestEnvelope, CodecError> {
        Ok(serde_json::from_slice(frame)?)
    }

    fn encode_response(
        &self,
        envelope: &ResponseEnvelope,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        write_json(envelope, out)
    }

    fn encode_request(
        &self,
        envelope: &RequestEnvelope,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        write_json(envelope, out)
    }

    fn decode_response(&self, frame: &[u8]) -> Result<ResponseEnvelope, CodecError> {
        Ok(serde_json::from_slice(frame)?)
    }
}

fn write_json<T: Serialize>(value: &T, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let start = out.len();
    if let Err(e) = serde_json::to_writer(&mut *out, value) {
        // Leave no half-written envelope behind.
        out.truncate(start);
        return Err(e.into());
    }
    Ok(())
}

/// Serde adapter for envelope bodies.
pub(crate) mod raw_body {
    use bytes::Bytes;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::value::RawValue;

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        if body.is_empty() {
            return serializer.serialize_none();
        }
        if let Ok(raw) = serde_json::from_slice::<&RawValue>(body) {
            if embeds_losslessly(raw, body) {
                return raw.serialize(serializer);
            }
        }
        match std::str::from_utf8(body) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => Err(S::Error::custom(
                "body is neither JSON nor UTF-8 text and cannot be carried in a JSON envelope",
            )),
        }
    }

    /// A raw value decodes back to exactly `body` only if the parser kept every
    /// byte and the value is not one that decoding maps to something else.
    fn embeds_losslessly(raw: &RawValue, body: &[u8]) -> bool {
        let text = raw.get();
        text.len() == body.len() && !text.starts_with('"') && text != "null"
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let Some(raw) = Option::<Box<RawValue>>::deserialize(deserializer)? else {
            return Ok(Bytes::new());
        };
        let text = raw.get();
        if text.starts_with('"') {
            let decoded: String = serde_json::from_str(text).map_err(D::Error::custom)?;
            Ok(Bytes::from(decoded))
        } else {
            Ok(Bytes::copy_from_slice(text.as_bytes()))
        }
    }
}
