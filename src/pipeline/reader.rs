//! Reader: frames in, requests out.

use std::pin::pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Pipeline;
use crate::error::{Error, TransportError};
use crate::http::request::{ConnectionInfo, Request};
use crate::http::RequestExt;
use crate::observability::metrics;

/// Read and decode frames until the stream ends, a frame is bad, or the
/// scope is cancelled. Dropping `requests` on return closes the queue.
pub(super) async fn run<I>(
    pipeline: Pipeline,
    frames: I,
    info: ConnectionInfo,
    scope: CancellationToken,
    requests: mpsc::Sender<Request>,
) where
    I: Stream<Item = Result<Bytes, TransportError>> + Send,
{
    let mut frames = pin!(frames);

    loop {
        // Cancellation wins over another read.
        let next = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            next = frames.next() => next,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                pipeline.report(&Error::Read(e));
                break;
            }
            None => {
                tracing::debug!("inbound stream closed");
                break;
            }
        };

        // A bad frame means the stream can no longer be trusted.
        let request = match pipeline.decode(&frame, &info, &scope) {
            Ok(request) => request,
            Err(e) => {
                pipeline.report(&Error::Decode(e));
                break;
            }
        };
        metrics::record_request();
        tracing::trace!(
            correlation_id = request.correlation_id().map(|id| id.as_str()),
            method = %request.method(),
            uri = %request.uri(),
            "request decoded"
        );

        let permit = tokio::select! {
            biased;
            _ = scope.cancelled() => None,
            permit = requests.reserve() => permit.ok(),
        };
        match permit {
            Some(permit) => permit.send(request),
            None => {
                pipeline.pools.requests.release(request);
                break;
            }
        }
    }
}
