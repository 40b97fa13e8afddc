//! Request handling capability.
//!
//! # Responsibilities
//! - Define the contract every multiplexed request is served through
//! - Adapt tower services (an `axum::Router` included) to that contract
//!
//! # Design Decisions
//! - Handlers report only by mutating the response and returning
//! - A panicking handler is caught by the dispatcher, never here
//! - No timeouts: wrap the handler (or the service) to add them

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::StatusCode;
use tower::{Service, ServiceExt};

use crate::http::request::Request;
use crate::http::response::Response;

/// Something that turns a request into a response.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Serve one request by populating `response`.
    async fn handle(&self, response: &mut Response, request: &Request);
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn handle(&self, response: &mut Response, request: &Request) {
        (**self).handle(response, request).await
    }
}

/// Serves requests through a tower service such as an `axum::Router`.
///
/// The request head, extensions and body are cloned into an
/// `http::Request<Body>`; the service's status, headers and collected body are
/// copied into the accumulator.
#[derive(Debug, Clone)]
pub struct ServiceHandler<S> {
    service: S,
    max_body_size: usize,
}

impl<S> ServiceHandler<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            max_body_size: 2 * 1024 * 1024,
        }
    }

    /// Largest response body collected from the service. Larger bodies turn
    /// into an empty 500 response.
    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }
}

#[async_trait]
impl<S> Handler for ServiceHandler<S>
where
    S: Service<axum::http::Request<Body>, Response = axum::response::Response, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
{
    async fn handle(&self, response: &mut Response, request: &Request) {
        let mut forwarded = axum::http::Request::new(Body::from(request.body().clone()));
        *forwarded.method_mut() = request.method().clone();
        *forwarded.uri_mut() = request.uri().clone();
        *forwarded.version_mut() = request.version();
        *forwarded.headers_mut() = request.headers().clone();
        *forwarded.extensions_mut() = request.extensions().clone();

        let reply = match self.service.clone().oneshot(forwarded).await {
            Ok(reply) => reply,
            Err(never) => match never {},
        };
        let (parts, body) = reply.into_parts();

        match axum::body::to_bytes(body, self.max_body_size).await {
            Ok(bytes) => {
                response.set_status(parts.status);
                response.headers_mut().extend(parts.headers);
                response.append(&bytes);
            }
            Err(e) => {
                tracing::warn!(
                    uri = %request.uri(),
                    limit = self.max_body_size,
                    error = %e,
                    "Failed to collect service response body"
                );
                response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::{CorrelationId, RequestExt};
    use axum::extract::Path;
    use axum::routing::{get, post};
    use axum::{Extension, Router};
    use bytes::Bytes;

    fn request(method: &str, uri: &str, body: &'static [u8]) -> Request {
        let mut request = Request::new(Bytes::from_static(body));
        *request.method_mut() = method.parse().unwrap();
        *request.uri_mut() = uri.parse().unwrap();
        request.extensions_mut().insert(CorrelationId::new("c-1"));
        request
    }

    #[tokio::test]
    async fn router_output_lands_in_accumulator() {
        let router = Router::new()
            .route("/hello/{name}", get(|Path(name): Path<String>| async move {
                ([("x-greeting", "yes")], format!("hello {name}"))
            }))
            .route("/echo", post(|body: Bytes| async move { (StatusCode::CREATED, body) }));
        let handler = ServiceHandler::new(router);

        let mut response = Response::default();
        handler
            .handle(&mut response, &request("GET", "/hello/ada", b""))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-greeting"], "yes");
        assert_eq!(response.body(), b"hello ada");

        let mut response = Response::default();
        handler
            .handle(&mut response, &request("POST", "/echo", b"{\"n\":1}"))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body(), b"{\"n\":1}");
    }

    #[tokio::test]
    async fn extensions_reach_the_service() {
        let router = Router::new().route(
            "/whoami",
            get(|Extension(id): Extension<CorrelationId>| async move { id.to_string() }),
        );
        let mut response = Response::default();
        ServiceHandler::new(router)
            .handle(&mut response, &request("GET", "/whoami", b""))
            .await;
        assert_eq!(response.body(), b"c-1");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let mut response = Response::default();
        ServiceHandler::new(Router::new())
            .handle(&mut response, &request("GET", "/missing", b""))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_body_becomes_500() {
        let router = Router::new().route("/big", get(|| async { "x".repeat(64) }));
        let mut response = Response::default();
        ServiceHandler::new(router)
            .max_body_size(16)
            .handle(&mut response, &request("GET", "/big", b""))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn arc_handlers_delegate() {
        struct Fixed;

        #[async_trait]
        impl Handler for Fixed {
            async fn handle(&self, response: &mut Response, request: &Request) {
                response.set_status(StatusCode::ACCEPTED);
                response.append(request.correlation_id().unwrap().as_str());
            }
        }

        let handler: Arc<dyn Handler> = Arc::new(Fixed);
        let mut response = Response::default();
        handler
            .handle(&mut response, &request("GET", "/", b""))
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.body(), b"c-1");
    }
}
