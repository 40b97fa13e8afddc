//! Dispatcher: one concurrent task per request.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::sync::mpsc::{self, WeakSender};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::Pipeline;
use crate::config::FailurePolicy;
use crate::error::Error;
use crate::http::request::Request;
use crate::http::{RequestExt, Response};
use crate::observability::metrics;
use crate::pool::Poolable;

/// Launch a handler task for every request until the inbound queue closes
/// or the scope is cancelled. Dropping `responses` on return closes the
/// outbound queue once no task is mid-send.
pub(super) async fn run(
    pipeline: Pipeline,
    mut requests: mpsc::Receiver<Request>,
    responses: mpsc::Sender<Response>,
    scope: CancellationToken,
) {
    let limiter = pipeline
        .config
        .max_in_flight
        .map(|permits| Arc::new(Semaphore::new(permits)));

    loop {
        let request = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let permit = match &limiter {
            None => None,
            Some(limiter) => {
                let acquired = tokio::select! {
                    biased;
                    _ = scope.cancelled() => None,
                    permit = Arc::clone(limiter).acquire_owned() => permit.ok(),
                };
                if acquired.is_none() {
                    pipeline.pools.requests.release(request);
                    break;
                }
                acquired
            }
        };

        let response = pipeline.pools.responses.acquire();
        tokio::spawn(process(
            pipeline.clone(),
            response,
            request,
            responses.downgrade(),
            permit,
        )
        .in_current_span());
    }

    // Requests the reader queued but nobody will handle.
    requests.close();
    while let Ok(request) = requests.try_recv() {
        pipeline.pools.requests.release(request);
    }
    tracing::debug!("dispatcher stopped");
}

/// Run the handler for one request and queue its response.
async fn process(
    pipeline: Pipeline,
    mut response: Response,
    request: Request,
    outbound: WeakSender<Response>,
    permit: Option<OwnedSemaphorePermit>,
) {
    let correlation_id = request
        .correlation_id()
        .map(ToString::to_string)
        .unwrap_or_default();

    let started = Instant::now();
    metrics::record_handler_started();
    let outcome = AssertUnwindSafe(pipeline.handler.handle(&mut response, &request))
        .catch_unwind()
        .await;
    metrics::record_handler_finished(started);
    drop(permit);
    response.bind(request);

    if let Err(panic) = outcome {
        metrics::record_handler_panic();
        pipeline.report(&Error::HandlerPanic {
            correlation_id: correlation_id.clone(),
            message: panic_message(panic.as_ref()),
        });
        match pipeline.config.failure_policy {
            FailurePolicy::Drop => {
                pipeline.pools.recycle(response);
                return;
            }
            FailurePolicy::ErrorResponse => {
                // Discard whatever the handler wrote before panicking.
                let request = response.unbind();
                response.reset();
                if let Some(request) = request {
                    response.bind(request);
                }
                response.set_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }

    let Some(sender) = outbound.upgrade() else {
        tracing::debug!(%correlation_id, "outbound queue closed, dropping response");
        pipeline.pools.recycle(response);
        return;
    };
    if let Err(mpsc::error::SendError(response)) = sender.send(response).await {
        tracing::debug!(%correlation_id, "writer gone, dropping response");
        pipeline.pools.recycle(response);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else {
        "non-string panic payload".to_owned()
    }
}
