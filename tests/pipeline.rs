//! Pipeline behaviour over an in-memory connection.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use wsrest::{Bridge, FailurePolicy, PipelineConfig};

mod common;
use common::{ErrorLog, ScriptedHandler};

const QUIET: Duration = Duration::from_millis(150);

#[tokio::test]
async fn single_request_round_trip() {
    let bridge = Bridge::new(ScriptedHandler::default());
    let (mut peer, _task) = common::connect(&bridge);

    peer.request("1", "GET", "/ok").await;
    let response = peer.response().await;

    assert_eq!(response.id, "1");
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, Bytes::from_static(b"ok"));
    assert_eq!(response.request_uri.as_deref(), Some("/ok"));
}

#[tokio::test]
async fn responses_follow_completion_order() {
    let bridge = Bridge::new(ScriptedHandler::default());
    let (mut peer, _task) = common::connect(&bridge);

    peer.request("a", "GET", "/sleep/300").await;
    peer.request("b", "GET", "/sleep/10").await;

    assert_eq!(peer.response().await.id, "b");
    assert_eq!(peer.response().await.id, "a");
}

#[tokio::test]
async fn panicking_handler_produces_no_response() {
    let errors = ErrorLog::default();
    let bridge = Bridge::builder(ScriptedHandler::default())
        .on_error(errors.hook())
        .build();
    let (mut peer, _task) = common::connect(&bridge);

    peer.request("x", "GET", "/panic").await;
    peer.request("y", "GET", "/ok").await;

    let response = peer.response().await;
    assert_eq!(response.id, "y");
    assert_eq!(response.body, Bytes::from_static(b"ok"));
    assert!(peer.response_within(QUIET).await.is_none());
    assert_eq!(errors.kinds(), vec!["handler_panic"]);
}

#[tokio::test]
async fn panicking_handler_can_answer_500() {
    let bridge = Bridge::builder(ScriptedHandler::default())
        .pipeline(PipelineConfig {
            failure_policy: FailurePolicy::ErrorResponse,
            ..PipelineConfig::default()
        })
        .on_error(|_| {})
        .build();
    let (mut peer, _task) = common::connect(&bridge);

    peer.request("x", "GET", "/panic").await;
    let response = peer.response().await;

    assert_eq!(response.id, "x");
    assert_eq!(response.status_code, 500);
    assert!(response.header.is_empty(), "partial headers leaked");
    assert!(response.body.is_empty(), "partial body leaked");
}

#[tokio::test]
async fn read_error_stops_reader_and_drops_in_flight_response() {
    let errors = ErrorLog::default();
    let bridge = Bridge::builder(ScriptedHandler::default())
        .on_error(errors.hook())
        .build();
    let (mut peer, task) = common::connect(&bridge);

    peer.request("slow", "GET", "/sleep/300").await;
    peer.fail_read().await;

    // The connection is torn down before the slow handler finishes.
    tokio::time::timeout(Duration::from_millis(200), task)
        .await
        .expect("connection outlived the read error")
        .unwrap();
    assert!(peer.is_closed(Duration::from_millis(500)).await);
    assert_eq!(errors.kinds(), vec!["read"]);
}

#[tokio::test]
async fn malformed_frame_ends_connection() {
    let errors = ErrorLog::default();
    let bridge = Bridge::builder(ScriptedHandler::default())
        .on_error(errors.hook())
        .build();
    let (mut peer, task) = common::connect(&bridge);

    peer.request("1", "GET", "/ok").await;
    assert_eq!(peer.response().await.id, "1");

    peer.send_raw(Bytes::from_static(b"{not json")).await;
    task.await.unwrap();
    assert!(peer.is_closed(QUIET).await);
    assert_eq!(errors.kinds(), vec!["decode"]);
}

#[tokio::test]
async fn unparsable_request_uri_is_a_decode_error() {
    let errors = ErrorLog::default();
    let bridge = Bridge::builder(ScriptedHandler::default())
        .on_error(errors.hook())
        .build();
    let (peer, task) = common::connect(&bridge);

    peer.request("1", "GET", "no-slash").await;
    task.await.unwrap();
    assert_eq!(errors.kinds(), vec!["decode"]);
}

#[tokio::test]
async fn random_delays_keep_ids_unique_and_submitted() {
    let bridge = Bridge::new(ScriptedHandler::default());
    let (mut peer, _task) = common::connect(&bridge);

    let submitted: Vec<String> = (0..40).map(|i| format!("req-{i}")).collect();
    for id in &submitted {
        let delay = rand::thread_rng().gen_range(0..40);
        peer.request(id, "GET", &format!("/sleep/{delay}")).await;
    }

    let submitted: HashSet<String> = submitted.into_iter().collect();
    let mut seen = HashSet::new();
    for _ in 0..submitted.len() {
        let response = peer.response().await;
        assert_eq!(response.body, Bytes::from(response.id.clone()));
        assert!(submitted.contains(&response.id), "unknown id {}", response.id);
        assert!(seen.insert(response.id), "duplicate response");
    }
    assert!(peer.response_within(QUIET).await.is_none());
}

#[tokio::test]
async fn max_in_flight_caps_concurrent_handlers() {
    let handler = ScriptedHandler::default();
    let bridge = Bridge::builder(handler.clone())
        .pipeline(PipelineConfig {
            max_in_flight: Some(2),
            ..PipelineConfig::default()
        })
        .build();
    let (mut peer, _task) = common::connect(&bridge);

    for i in 0..8 {
        peer.request(&i.to_string(), "GET", "/sleep/20").await;
    }
    for _ in 0..8 {
        peer.response().await;
    }
    assert_eq!(handler.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn shutdown_cancels_connection_scope() {
    let root = CancellationToken::new();
    let handler = ScriptedHandler::default();
    let bridge = Bridge::builder(handler.clone())
        .shutdown(root.clone())
        .build();
    let (mut peer, task) = common::connect(&bridge);

    peer.request("w", "GET", "/wait").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bridge.active_connections(), 1);

    root.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("connection ignored shutdown")
        .unwrap();

    // The handler's late response may or may not beat the teardown.
    while let Some(late) = peer.response_within(QUIET).await {
        assert_eq!(late.id, "w");
    }
    assert_eq!(bridge.active_connections(), 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handler.cancelled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn closing_inbound_stream_ends_connection() {
    let bridge = Bridge::new(ScriptedHandler::default());
    let (mut peer, task) = common::connect(&bridge);

    peer.close();
    task.await.unwrap();
    assert!(bridge.connections().wait_for_idle_timeout(QUIET).await);
}

#[tokio::test]
async fn pooled_objects_are_reused_without_leaking() {
    let bridge = Bridge::new(ScriptedHandler::default());
    let (mut peer, _task) = common::connect(&bridge);

    peer.request_with_body("1", "POST", "/echo", Bytes::from_static(b"first body"))
        .await;
    assert_eq!(peer.response().await.body, Bytes::from_static(b"first body"));

    peer.request("2", "GET", "/ok").await;
    let second = peer.response().await;
    assert_eq!(second.body, Bytes::from_static(b"ok"));
    assert_eq!(second.request_uri.as_deref(), Some("/ok"));

    let (request_hits, _) = bridge.pools().requests.stats();
    let (response_hits, _) = bridge.pools().responses.stats();
    assert!(request_hits >= 1);
    assert!(response_hits >= 1);
}

#[tokio::test]
async fn request_uri_echo_can_be_disabled() {
    let bridge = Bridge::builder(ScriptedHandler::default())
        .pipeline(PipelineConfig {
            echo_request_uri: false,
            ..PipelineConfig::default()
        })
        .build();
    let (mut peer, _task) = common::connect(&bridge);

    peer.request("1", "GET", "/ok").await;
    assert_eq!(peer.response().await.request_uri, None);
}
