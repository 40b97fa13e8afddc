//! Request shells and per-request context.
//!
//! # Responsibilities
//! - Define the request type handlers receive
//! - Fill a pooled request shell from a decoded envelope
//! - Attach the correlation id, connection metadata and cancellation scope
//!
//! # Design Decisions
//! - Context lives in request extensions so tower/axum handlers can extract it
//! - Connection-invariant fields (version, host) come from the upgrade request
//! - An empty method means GET; any other unknown token is rejected

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::HOST;
use axum::http::{HeaderName, HeaderValue, Method, Uri, Version};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::codec::RequestEnvelope;
use crate::error::DecodeError;
use crate::net::ConnectionId;
use crate::pool::Poolable;

/// A decoded request, as seen by handlers.
pub type Request = axum::http::Request<Bytes>;

/// Correlation id of the request being served.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata shared by every request arriving on one connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Connection this request arrived on.
    pub id: ConnectionId,
    /// HTTP version of the upgrade request.
    pub version: Version,
    /// Host of the upgrade request, copied onto every request.
    pub host: Option<HeaderValue>,
    /// Remote peer, when the server records it.
    pub peer_addr: Option<SocketAddr>,
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            id: ConnectionId::new(),
            version: Version::HTTP_11,
            host: None,
            peer_addr: None,
        }
    }
}

/// Accessors for the context attached to multiplexed requests.
pub trait RequestExt {
    /// Correlation id the response will carry.
    fn correlation_id(&self) -> Option<&CorrelationId>;

    /// Connection-level metadata.
    fn connection_info(&self) -> Option<&ConnectionInfo>;

    /// Cancellation scope of the connection. Advisory: handlers should poll it
    /// during long work, nothing interrupts them.
    fn cancellation(&self) -> Option<&CancellationToken>;
}

impl<B> RequestExt for axum::http::Request<B> {
    fn correlation_id(&self) -> Option<&CorrelationId> {
        self.extensions().get::<CorrelationId>()
    }

    fn connection_info(&self) -> Option<&ConnectionInfo> {
        self.extensions().get::<ConnectionInfo>()
    }

    fn cancellation(&self) -> Option<&CancellationToken> {
        self.extensions().get::<CancellationToken>()
    }
}

impl Poolable for Request {
    fn reset(&mut self) {
        *self.method_mut() = Method::GET;
        *self.uri_mut() = Uri::default();
        *self.version_mut() = Version::default();
        // clear() keeps the allocation
        self.headers_mut().clear();
        self.extensions_mut().clear();
        *self.body_mut() = Bytes::new();
    }
}

/// Populate a reset shell from a decoded envelope.
pub(crate) fn fill_from_envelope(
    shell: &mut Request,
    envelope: RequestEnvelope,
    info: &ConnectionInfo,
    scope: &CancellationToken,
) -> Result<(), DecodeError> {
    let method = parse_method(&envelope.method)?;
    let uri = parse_request_uri(&envelope.request_uri)?;

    let headers = shell.headers_mut();
    for (name, values) in envelope.header.iter() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| DecodeError::InvalidHeaderName(name.to_owned()))?;
        for value in values {
            let header_value =
                HeaderValue::from_str(value).map_err(|_| DecodeError::InvalidHeaderValue {
                    name: name.to_owned(),
                })?;
            headers.append(header_name.clone(), header_value);
        }
    }
    if let Some(host) = &info.host {
        headers.insert(HOST, host.clone());
    }

    *shell.method_mut() = method;
    *shell.uri_mut() = uri;
    *shell.version_mut() = info.version;
    *shell.body_mut() = envelope.body;

    let extensions = shell.extensions_mut();
    extensions.insert(CorrelationId::new(envelope.id));
    extensions.insert(info.clone());
    extensions.insert(scope.clone());
    Ok(())
}

fn parse_method(method: &str) -> Result<Method, DecodeError> {
    if method.is_empty() {
        return Ok(Method::GET);
    }
    Method::from_bytes(method.as_bytes()).map_err(|_| DecodeError::InvalidMethod(method.to_owned()))
}

/// Accept absolute URIs and server-relative paths (plus `*`), nothing else.
fn parse_request_uri(raw: &str) -> Result<Uri, DecodeError> {
    let invalid = |reason: &str| DecodeError::InvalidUri {
        uri: raw.to_owned(),
        reason: reason.to_owned(),
    };

    if raw.is_empty() {
        return Err(invalid("empty url"));
    }
    let uri: Uri = raw.parse().map_err(|e: axum::http::uri::InvalidUri| invalid(&e.to_string()))?;
    if raw == "*" || raw.starts_with('/') || uri.scheme().is_some() {
        Ok(uri)
    } else {
        Err(invalid("not an absolute uri or absolute path"))
    }
}
