//! Per-connection request multiplexing pipeline.
//!
//! # Data Flow
//! ```text
//! frames in
//!     → reader.rs (decode envelope, fill pooled request shell, attach scope)
//!     → mpsc queue
//!     → dispatcher.rs (one task per request, panics isolated)
//!     → mpsc queue (completion order)
//!     → writer.rs (encode envelope, send frame, recycle objects)
//!     → frames out
//! ```
//!
//! # Design Decisions
//! - Reader and dispatcher stop when the connection scope is cancelled
//! - The writer stops when the outbound queue closes, which happens when the
//!   dispatcher exits; handler tasks only hold weak senders
//! - Responses of handlers that outlive the dispatcher are dropped
//! - No retries: every fatal error ends the connection

mod dispatcher;
mod reader;
mod writer;

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Sink, Stream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::codec::Codec;
use crate::config::PipelineConfig;
use crate::error::{DecodeError, Error, ErrorHook, TransportError};
use crate::http::request::{fill_from_envelope, ConnectionInfo, Request};
use crate::http::Handler;
use crate::observability::metrics;
use crate::pool::Pools;

/// Everything one connection's pipeline needs, shared by all of its tasks.
#[derive(Clone)]
pub(crate) struct Pipeline {
    codec: Arc<dyn Codec>,
    handler: Arc<dyn Handler>,
    pools: Arc<Pools>,
    config: Arc<PipelineConfig>,
    on_error: ErrorHook,
}

impl Pipeline {
    pub(crate) fn new(
        codec: Arc<dyn Codec>,
        handler: Arc<dyn Handler>,
        pools: Arc<Pools>,
        config: PipelineConfig,
        on_error: ErrorHook,
    ) -> Self {
        Self {
            codec,
            handler,
            pools,
            config: Arc::new(config),
            on_error,
        }
    }

    pub(crate) fn pools(&self) -> &Arc<Pools> {
        &self.pools
    }

    pub(crate) fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline until the connection is done.
    ///
    /// Reader and dispatcher run as tasks; the writer runs on the caller's
    /// task. Once the writer stops, `scope` is cancelled and both tasks are
    /// awaited, so nothing started here outlives the call except handler
    /// tasks still finishing.
    pub(crate) async fn run<I, O>(
        &self,
        frames_in: I,
        frames_out: O,
        info: ConnectionInfo,
        scope: CancellationToken,
    ) where
        I: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
        O: Sink<Bytes, Error = TransportError> + Send,
    {
        let depth = self.config.queue_depth.max(1);
        let (request_tx, request_rx) = mpsc::channel(depth);
        let (response_tx, response_rx) = mpsc::channel(depth);

        let reader = tokio::spawn(reader::run(
            self.clone(),
            frames_in,
            info,
            scope.clone(),
            request_tx,
        )
        .in_current_span());
        let dispatcher = tokio::spawn(dispatcher::run(
            self.clone(),
            request_rx,
            response_tx,
            scope.clone(),
        )
        .in_current_span());

        writer::run(self, frames_out, response_rx).await;

        scope.cancel();
        for (name, task) in [("reader", reader), ("dispatcher", dispatcher)] {
            if let Err(e) = task.await {
                tracing::error!(task = name, error = %e, "pipeline task failed");
            }
        }
    }

    /// Hand an error to the hook and count it.
    pub(crate) fn report(&self, error: &Error) {
        metrics::record_pipeline_error(error.kind());
        (self.on_error)(error);
    }

    /// Decode one frame into a pooled request shell.
    fn decode(
        &self,
        frame: &[u8],
        info: &ConnectionInfo,
        scope: &CancellationToken,
    ) -> Result<Request, DecodeError> {
        let envelope = self.codec.decode_request(frame)?;
        let mut shell = self.pools.requests.acquire();
        match fill_from_envelope(&mut shell, envelope, info, scope) {
            Ok(()) => Ok(shell),
            Err(e) => {
                self.pools.requests.release(shell);
                Err(e)
            }
        }
    }
}
