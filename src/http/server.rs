//! WebSocket endpoint and bridge configuration.
//!
//! # Responsibilities
//! - Hold everything a connection needs: handler, codec, pools, policies
//! - Apply the upgrade policy and answer the WebSocket handshake
//! - Give every connection its own cancellation scope and tracking guard
//! - Drive the pipeline over a WebSocket or any frame stream/sink pair
//!
//! # Design Decisions
//! - The bridge is cheap to clone; clones share pools, tracker and shutdown
//! - Disallowed origins are refused with 403 before the handshake
//! - Upgrade failures go through the error hook like every other failure

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::header::{HOST, ORIGIN};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::any;
use axum::Router;
use bytes::Bytes;
use futures_util::{Sink, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::codec::{Codec, JsonCodec};
use crate::config::validation::parse_response_headers;
use crate::config::{BridgeConfig, MessageKind, PipelineConfig, UpgradePolicy, ValidationError};
use crate::error::{log_error_hook, Error, ErrorHook, TransportError};
use crate::http::handler::Handler;
use crate::http::request::ConnectionInfo;
use crate::net::{websocket, ConnectionId, ConnectionTracker};
use crate::pipeline::Pipeline;
use crate::pool::Pools;

/// Serves multiplexed requests over WebSocket connections.
#[derive(Clone)]
pub struct Bridge {
    pipeline: Pipeline,
    upgrade: Arc<UpgradePolicy>,
    response_headers: Arc<HeaderMap>,
    connections: ConnectionTracker,
    shutdown: CancellationToken,
}

/// Builder for [`Bridge`]. Only the handler is required.
pub struct BridgeBuilder {
    handler: Arc<dyn Handler>,
    codec: Arc<dyn Codec>,
    upgrade: UpgradePolicy,
    response_headers: HeaderMap,
    on_error: ErrorHook,
    pipeline: PipelineConfig,
    pools: Option<Arc<Pools>>,
    shutdown: CancellationToken,
}

impl BridgeBuilder {
    fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            codec: Arc::new(JsonCodec::new()),
            upgrade: UpgradePolicy::default(),
            response_headers: HeaderMap::new(),
            on_error: log_error_hook(),
            pipeline: PipelineConfig::default(),
            pools: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn upgrade_policy(mut self, policy: UpgradePolicy) -> Self {
        self.upgrade = policy;
        self
    }

    /// Headers added to every successful upgrade response.
    pub fn response_headers(mut self, headers: HeaderMap) -> Self {
        self.response_headers = headers;
        self
    }

    pub fn codec(mut self, codec: impl Codec) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Replace the default `tracing` error hook.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(hook);
        self
    }

    pub fn pipeline(mut self, config: PipelineConfig) -> Self {
        self.pipeline = config;
        self
    }

    /// Share pools with other bridges. By default each bridge owns its own.
    pub fn pools(mut self, pools: Arc<Pools>) -> Self {
        self.pools = Some(pools);
        self
    }

    /// Root token; cancelling it cancels every connection scope.
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Apply the bridge-related sections of a loaded config.
    pub fn configure(mut self, config: &BridgeConfig) -> Result<Self, ValidationError> {
        self.response_headers = parse_response_headers(&config.response_headers)?;
        self.upgrade = config.upgrade.clone();
        self.pipeline = config.pipeline.clone();
        self.pools = Some(Arc::new(Pools::new(
            config.pools.request_capacity,
            config.pools.response_capacity,
        )));
        Ok(self)
    }

    pub fn build(self) -> Bridge {
        let pools = self.pools.unwrap_or_default();
        Bridge {
            pipeline: Pipeline::new(self.codec, self.handler, pools, self.pipeline, self.on_error),
            upgrade: Arc::new(self.upgrade),
            response_headers: Arc::new(self.response_headers),
            connections: ConnectionTracker::new(),
            shutdown: self.shutdown,
        }
    }
}

impl Bridge {
    /// A bridge with default settings.
    pub fn new(handler: impl Handler) -> Self {
        Self::builder(handler).build()
    }

    pub fn builder(handler: impl Handler) -> BridgeBuilder {
        BridgeBuilder::new(Arc::new(handler))
    }

    /// A router serving the WebSocket endpoint at `path`.
    ///
    /// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` to
    /// record peer addresses.
    pub fn router(&self, path: &str) -> Router {
        Router::new()
            .route(path, any(accept_upgrade))
            .with_state(self.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Finish a WebSocket handshake and serve the resulting connection.
    pub fn upgrade(&self, ws: WebSocketUpgrade, info: ConnectionInfo) -> HttpResponse {
        let mut ws = ws.protocols(self.upgrade.protocols.clone());
        if let Some(limit) = self.upgrade.max_message_size {
            ws = ws.max_message_size(limit);
        }
        if let Some(limit) = self.upgrade.max_frame_size {
            ws = ws.max_frame_size(limit);
        }

        let on_failure = self.clone();
        let bridge = self.clone();
        let mut response = ws
            .on_failed_upgrade(move |e| on_failure.pipeline.report(&Error::Upgrade(e)))
            .on_upgrade(move |socket| async move { bridge.serve_socket(socket, info).await });

        let headers = response.headers_mut();
        for (name, value) in self.response_headers.iter() {
            headers.append(name.clone(), value.clone());
        }
        response
    }

    /// Serve an already upgraded WebSocket.
    pub async fn serve_socket(&self, socket: WebSocket, info: ConnectionInfo) {
        let (sink, stream) = socket.split();
        let kind = self.message_kind();
        self.serve(websocket::frames(stream), websocket::sink(sink, kind), info)
            .await;
    }

    /// Run one connection's pipeline over any frame stream and sink.
    ///
    /// Returns when the connection is done. The connection's scope is a
    /// child of the shutdown token and is cancelled on return.
    pub async fn serve<I, O>(&self, frames_in: I, frames_out: O, info: ConnectionInfo)
    where
        I: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
        O: Sink<Bytes, Error = TransportError> + Send,
    {
        let scope = self.shutdown.child_token();
        let _cancel_on_return = scope.clone().drop_guard();
        let _tracked = self.connections.track(info.id);

        let span = tracing::info_span!(
            "connection",
            id = %info.id,
            peer = ?info.peer_addr,
        );
        async {
            tracing::debug!("connection opened");
            self.pipeline.run(frames_in, frames_out, info, scope).await;
            tracing::debug!("connection closed");
        }
        .instrument(span)
        .await;
    }

    pub fn active_connections(&self) -> u64 {
        self.connections.active_count()
    }

    pub fn connections(&self) -> &ConnectionTracker {
        &self.connections
    }

    pub fn pools(&self) -> &Arc<Pools> {
        self.pipeline.pools()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    fn message_kind(&self) -> MessageKind {
        self.pipeline.config().message_kind
    }
}

/// Axum handler behind [`Bridge::router`].
async fn accept_upgrade(State(bridge): State<Bridge>, request: axum::extract::Request) -> HttpResponse {
    let (mut parts, _body) = request.into_parts();

    let origin = parts.headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    if !bridge.upgrade.allows_origin(origin) {
        tracing::warn!(origin = ?origin, "Rejected upgrade from disallowed origin");
        return StatusCode::FORBIDDEN.into_response();
    }

    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &bridge).await {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let info = ConnectionInfo {
        id: ConnectionId::new(),
        version: parts.version,
        host: parts.headers.get(HOST).cloned(),
        peer_addr: parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
    };
    bridge.upgrade(ws, info)
}
