//! Response accumulator.
//!
//! # Responsibilities
//! - Collect status, headers and body written by a handler
//! - Keep the originating request so the writer can recover its correlation id
//! - Turn itself into a `ResponseEnvelope` for encoding
//!
//! # Design Decisions
//! - Poolable: reset clears status, headers, body and the request binding
//! - Reset status is 200 OK, the status a handler gets by never setting one
//! - The body buffer is lent to the envelope and taken back to keep its allocation

use std::io;

use axum::http::{HeaderMap, StatusCode};
use bytes::{Bytes, BytesMut};

use crate::codec::{HeaderMultimap, ResponseEnvelope};
use crate::error::Error;
use crate::http::request::{CorrelationId, Request, RequestExt};
use crate::pool::Poolable;

/// Mutable response a handler writes into.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    request: Option<Request>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            request: None,
        }
    }
}

impl Response {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Append bytes to the body.
    pub fn append(&mut self, chunk: impl AsRef<[u8]>) {
        self.body.extend_from_slice(chunk.as_ref());
    }

    /// Body accumulated so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The request this response answers, once bound.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.request.as_ref().and_then(RequestExt::correlation_id)
    }

    pub(crate) fn bind(&mut self, request: Request) {
        self.request = Some(request);
    }

    pub(crate) fn unbind(&mut self) -> Option<Request> {
        self.request.take()
    }

    /// Build the outbound envelope. The body buffer moves into the envelope;
    /// hand it back with [`Response::restore_body`] once encoded.
    pub(crate) fn take_envelope(&mut self, echo_request_uri: bool) -> Result<ResponseEnvelope, Error> {
        let request = self.request.as_ref().ok_or(Error::Unbound)?;
        let id = request.correlation_id().ok_or(Error::Unbound)?.as_str().to_owned();
        let request_uri = echo_request_uri.then(|| request.uri().to_string());

        Ok(ResponseEnvelope {
            id,
            status_code: self.status.as_u16(),
            request_uri,
            header: HeaderMultimap::from_header_map(&self.headers),
            body: std::mem::take(&mut self.body).freeze(),
        })
    }

    pub(crate) fn restore_body(&mut self, body: Bytes) {
        if let Ok(mut buffer) = body.try_into_mut() {
            buffer.clear();
            self.body = buffer;
        }
    }
}

impl io::Write for Response {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Poolable for Response {
    fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.request = None;
    }
}
