//! Shared utilities for pipeline and WebSocket tests.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, SinkExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::PollSender;

use wsrest::{
    Bridge, Codec, ConnectionInfo, Error, Handler, HeaderMultimap, JsonCodec, Request, RequestEnvelope,
    RequestExt, Response, ResponseEnvelope, TransportError,
};

/// The test side of an in-memory connection to a bridge.
pub struct Peer {
    inbound: Option<mpsc::Sender<Result<Bytes, TransportError>>>,
    outbound: mpsc::Receiver<Bytes>,
    codec: JsonCodec,
}

/// Serve one in-memory connection. The task ends when the bridge is done
/// with the connection.
pub fn connect(bridge: &Bridge) -> (Peer, JoinHandle<()>) {
    let (in_tx, in_rx) = mpsc::channel::<Result<Bytes, TransportError>>(64);
    let (out_tx, out_rx) = mpsc::channel::<Bytes>(64);

    let frames_in = stream::unfold(in_rx, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    });
    let frames_out = PollSender::new(out_tx)
        .sink_map_err(|_| TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));

    let bridge = bridge.clone();
    let task = tokio::spawn(async move {
        bridge
            .serve(frames_in, frames_out, ConnectionInfo::default())
            .await;
    });

    let peer = Peer {
        inbound: Some(in_tx),
        outbound: out_rx,
        codec: JsonCodec::new(),
    };
    (peer, task)
}

impl Peer {
    /// Send a request envelope with an empty body.
    pub async fn request(&self, id: &str, method: &str, uri: &str) {
        self.request_with_body(id, method, uri, Bytes::new()).await;
    }

    pub async fn request_with_body(&self, id: &str, method: &str, uri: &str, body: Bytes) {
        let envelope = RequestEnvelope {
            id: id.to_string(),
            method: method.to_string(),
            request_uri: uri.to_string(),
            header: HeaderMultimap::new(),
            body,
        };
        let mut frame = Vec::new();
        self.codec.encode_request(&envelope, &mut frame).unwrap();
        self.send_raw(Bytes::from(frame)).await;
    }

    pub async fn send_raw(&self, frame: Bytes) {
        self.inbound
            .as_ref()
            .expect("inbound already closed")
            .send(Ok(frame))
            .await
            .unwrap();
    }

    /// Make the bridge's next read fail.
    pub async fn fail_read(&self) {
        let error = TransportError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        self.inbound
            .as_ref()
            .expect("inbound already closed")
            .send(Err(error))
            .await
            .unwrap();
    }

    /// End the inbound stream.
    pub fn close(&mut self) {
        self.inbound = None;
    }

    /// Next response, or `None` on timeout or when the bridge closed its side.
    pub async fn response_within(&mut self, limit: Duration) -> Option<ResponseEnvelope> {
        match tokio::time::timeout(limit, self.outbound.recv()).await {
            Ok(Some(frame)) => Some(self.codec.decode_response(&frame).unwrap()),
            Ok(None) | Err(_) => None,
        }
    }

    pub async fn response(&mut self) -> ResponseEnvelope {
        self.response_within(Duration::from_secs(5))
            .await
            .expect("no response within 5s")
    }

    /// Whether the bridge has closed its outbound side.
    pub async fn is_closed(&mut self, limit: Duration) -> bool {
        matches!(
            tokio::time::timeout(limit, self.outbound.recv()).await,
            Ok(None)
        )
    }
}

/// Error kinds reported through a bridge's error hook.
#[derive(Clone, Default)]
pub struct ErrorLog(Arc<Mutex<Vec<&'static str>>>);

impl ErrorLog {
    pub fn hook(&self) -> impl Fn(&Error) + Send + Sync + 'static {
        let log = self.0.clone();
        move |error: &Error| log.lock().unwrap().push(error.kind())
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

/// Handler whose behaviour is chosen by the request path:
///
/// - `/ok`: 200, body `ok`
/// - `/sleep/{ms}`: sleeps, then echoes the correlation id as body
/// - `/panic`: writes a header and some body, then panics
/// - `/wait`: waits for the connection scope to be cancelled
/// - `/echo`: echoes the request body
#[derive(Clone, Default)]
pub struct ScriptedHandler {
    pub running: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    pub cancelled: Arc<AtomicUsize>,
}

#[async_trait]
impl Handler for ScriptedHandler {
    async fn handle(&self, response: &mut Response, request: &Request) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let path = request.uri().path().to_string();
        if path == "/ok" {
            response.append("ok");
        } else if let Some(ms) = path.strip_prefix("/sleep/") {
            let ms: u64 = ms.parse().unwrap();
            tokio::time::sleep(Duration::from_millis(ms)).await;
            let id = request.correlation_id().unwrap().to_string();
            response.append(id);
        } else if path == "/panic" {
            self.running.fetch_sub(1, Ordering::SeqCst);
            response
                .headers_mut()
                .insert("x-partial", "yes".parse().unwrap());
            response.append("partial");
            panic!("handler exploded");
        } else if path == "/wait" {
            request.cancellation().unwrap().cancelled().await;
            self.cancelled.fetch_add(1, Ordering::SeqCst);
            response.append("cancelled");
        } else if path == "/echo" {
            response.append(request.body());
        } else {
            response.set_status(axum::http::StatusCode::NOT_FOUND);
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}
