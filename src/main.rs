//! wsrest demo server.
//!
//! Serves a small axum API over the multiplexed WebSocket endpoint:
//!
//! ```text
//! ANY  /echo          body and content-type echoed back
//! GET  /status/{code} empty response with the given status
//! GET  /sleep/{ms}    answers after `ms` milliseconds (or on shutdown)
//! ```
//!
//! Every route is reached through request envelopes sent over `server.path`,
//! not through plain HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use wsrest::config::{load_config, BridgeConfig};
use wsrest::lifecycle::{wait_for_signal, Shutdown};
use wsrest::observability::{logging, metrics};
use wsrest::{Bridge, CorrelationId, ServiceHandler};

/// Drain deadline once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "wsrest")]
#[command(about = "Multiplexed HTTP-over-WebSocket demo server", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    logging::init(&config.observability.log_level);
    tracing::info!("wsrest v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let handler =
        ServiceHandler::new(demo_api()).max_body_size(config.pipeline.max_body_size);
    let bridge = Bridge::builder(handler)
        .configure(&config)?
        .shutdown(shutdown.token())
        .build();

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        path = %config.server.path,
        queue_depth = config.pipeline.queue_depth,
        max_in_flight = ?config.pipeline.max_in_flight,
        "Listening for connections"
    );

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    let app = bridge.router(&config.server.path);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.token().cancelled_owned())
    .await?;

    tracing::info!(
        active = bridge.active_connections(),
        "Draining WebSocket connections"
    );
    if !bridge
        .connections()
        .wait_for_idle_timeout(SHUTDOWN_GRACE)
        .await
    {
        tracing::warn!(
            active = bridge.active_connections(),
            "Connections still open at shutdown deadline"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_api() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", get(status))
        .route("/sleep/{ms}", get(sleep))
}

async fn echo(
    Extension(correlation_id): Extension<CorrelationId>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let mut response = HeaderMap::new();
    if let Some(content_type) = headers.get(CONTENT_TYPE) {
        response.insert(CONTENT_TYPE, content_type.clone());
    }
    tracing::debug!(%correlation_id, len = body.len(), "echo");
    (response, body)
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn sleep(
    Extension(scope): Extension<CancellationToken>,
    Path(ms): Path<u64>,
) -> impl IntoResponse {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => (StatusCode::OK, format!("slept {ms}ms")),
        _ = scope.cancelled() => (StatusCode::SERVICE_UNAVAILABLE, "cancelled".to_string()),
    }
}
