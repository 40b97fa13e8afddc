//! Writer: responses in, frames out.

use std::pin::pin;

use bytes::Bytes;
use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;

use super::Pipeline;
use crate::codec::ResponseEnvelope;
use crate::error::{Error, TransportError};
use crate::http::Response;
use crate::observability::metrics;

/// Encode and send responses until the queue closes or a write fails.
pub(super) async fn run<O>(pipeline: &Pipeline, frames: O, mut responses: mpsc::Receiver<Response>)
where
    O: Sink<Bytes, Error = TransportError> + Send,
{
    let mut frames = pin!(frames);

    while let Some(mut response) = responses.recv().await {
        let envelope = match response.take_envelope(pipeline.config.echo_request_uri) {
            Ok(envelope) => envelope,
            Err(e) => {
                pipeline.report(&e);
                pipeline.pools.recycle(response);
                continue;
            }
        };

        let mut frame = Vec::with_capacity(envelope.body.len() + 128);
        let encoded = pipeline.codec.encode_response(&envelope, &mut frame);
        let ResponseEnvelope {
            id,
            status_code,
            body,
            ..
        } = envelope;
        response.restore_body(body);
        pipeline.pools.recycle(response);

        if let Err(source) = encoded {
            pipeline.report(&Error::Encode {
                correlation_id: id,
                source,
            });
            break;
        }
        if let Err(e) = frames.send(Bytes::from(frame)).await {
            pipeline.report(&Error::Write(e));
            break;
        }
        metrics::record_response(status_code);
        tracing::trace!(correlation_id = %id, status = status_code, "response written");
    }

    // Anything still queued will never be written.
    responses.close();
    while let Ok(response) = responses.try_recv() {
        pipeline.pools.recycle(response);
    }
    if let Err(e) = frames.close().await {
        tracing::debug!(error = %e, "closing outbound stream failed");
    }
    tracing::debug!("writer stopped");
}
