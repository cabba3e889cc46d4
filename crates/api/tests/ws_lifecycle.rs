//! End-to-end WebSocket tests against a real server on an ephemeral port.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use common::{next_binary, next_json, next_message, TestServer};
use image::{DynamicImage, GenericImageView, RgbImage};
use relay_events::{Payload, PreviewFormat, Target};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message as WsMessage;

// ---------------------------------------------------------------------------
// Test: a fresh connection gets a generated id in its first status message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_without_token_receives_generated_sid() {
    let server = TestServer::spawn().await;
    let mut ws = server.connect(None).await;

    let first = next_json(&mut ws).await;

    assert_eq!(first["type"], "status");
    assert_eq!(first["data"]["status"]["exec_info"]["queue_remaining"], 0);
    let sid = first["data"]["sid"].as_str().unwrap();
    assert_eq!(sid.len(), 32);
    assert!(sid.chars().all(|c| c.is_ascii_hexdigit()));
    server.wait_for_sessions(1).await;
}

#[tokio::test]
async fn status_reflects_queue_on_connect() {
    let server = TestServer::spawn().await;
    server.queue.enqueue(json!({}), None);

    let mut ws = server.connect(Some("abc")).await;
    let first = next_json(&mut ws).await;

    assert_eq!(first["data"]["sid"], "abc");
    assert_eq!(first["data"]["status"]["exec_info"]["queue_remaining"], 1);
}

// ---------------------------------------------------------------------------
// Test: status is always the first frame, even while broadcasts are flowing
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn status_is_first_frame_under_broadcast_load() {
    let server = TestServer::spawn().await;
    let stop = Arc::new(AtomicBool::new(false));

    let publisher = server.state.publisher.clone();
    let flag = Arc::clone(&stop);
    let producer = std::thread::spawn(move || {
        while !flag.load(Ordering::Relaxed) {
            if publisher
                .send_json("tick", json!({}), Target::Broadcast)
                .is_err()
            {
                return;
            }
            std::thread::sleep(std::time::Duration::from_micros(50));
        }
    });

    for _ in 0..50 {
        let mut ws = server.connect(None).await;
        let first = next_json(&mut ws).await;
        assert_eq!(first["type"], "status", "first frame was {first}");
        assert!(first["data"]["sid"].is_string());
    }

    stop.store(true, Ordering::Relaxed);
    producer.join().unwrap();
}

// ---------------------------------------------------------------------------
// Test: reconnecting with the same token supersedes the old connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnect_with_same_token_evicts_previous_connection() {
    let server = TestServer::spawn().await;

    let mut old = server.connect(Some("abc")).await;
    next_json(&mut old).await;
    let mut new = server.connect(Some("abc")).await;
    let welcome = next_json(&mut new).await;
    assert_eq!(welcome["data"]["sid"], "abc");

    // The superseded socket is closed by the server.
    assert_matches!(next_message(&mut old).await, Some(WsMessage::Close(_)) | None);
    server.wait_for_sessions(1).await;

    server
        .state
        .publisher
        .send_json("custom", json!({"hello": "world"}), "abc")
        .unwrap();

    let event = next_json(&mut new).await;
    assert_eq!(event, json!({"type": "custom", "data": {"hello": "world"}}));
    // The late close of the old connection did not remove the new one.
    assert_eq!(server.state.sessions.session_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: closing a connection unregisters it
// ---------------------------------------------------------------------------

#[tokio::test]
async fn close_unregisters_session() {
    let server = TestServer::spawn().await;
    let mut ws = server.connect(Some("abc")).await;
    next_json(&mut ws).await;
    server.wait_for_sessions(1).await;

    ws.close(None).await.unwrap();

    server.wait_for_sessions(0).await;
}

// ---------------------------------------------------------------------------
// Test: the executing client gets the current node back on reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnecting_executing_client_receives_resume_marker() {
    let server = TestServer::spawn().await;
    server.state.execution.begin("prompt-1", Some("abc".into()));
    server.state.execution.set_node(Some("7".into()));

    let mut ws = server.connect(Some("abc")).await;

    assert_eq!(next_json(&mut ws).await["type"], "status");
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "executing", "data": {"node": "7"}})
    );
}

#[tokio::test]
async fn other_clients_get_no_resume_marker() {
    let server = TestServer::spawn().await;
    server.state.execution.begin("prompt-1", Some("abc".into()));
    server.state.execution.set_node(Some("7".into()));

    let mut ws = server.connect(Some("xyz")).await;
    assert_eq!(next_json(&mut ws).await["type"], "status");

    server
        .state
        .publisher
        .send_json("marker", json!({}), "xyz")
        .unwrap();
    assert_eq!(next_json(&mut ws).await["type"], "marker");
}

// ---------------------------------------------------------------------------
// Test: broadcasts reach every connected client
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_all_clients() {
    let server = TestServer::spawn().await;
    let mut a = server.connect(Some("a")).await;
    let mut b = server.connect(Some("b")).await;
    next_json(&mut a).await;
    next_json(&mut b).await;
    server.wait_for_sessions(2).await;

    server
        .state
        .publisher
        .queue_updated(server.queue.as_ref())
        .unwrap();

    for ws in [&mut a, &mut b] {
        assert_eq!(
            next_json(ws).await,
            json!({"type": "status", "data": {"status": {"exec_info": {"queue_remaining": 0}}}})
        );
    }
}

// ---------------------------------------------------------------------------
// Test: binary and preview frames over the wire
// ---------------------------------------------------------------------------

#[tokio::test]
async fn binary_event_arrives_with_kind_prefix() {
    let server = TestServer::spawn().await;
    let mut ws = server.connect(Some("abc")).await;
    next_json(&mut ws).await;

    server
        .state
        .publisher
        .publish(42u32, Payload::Bytes(vec![9u8, 8, 7].into()), "abc")
        .unwrap();

    assert_eq!(next_binary(&mut ws).await, vec![0, 0, 0, 42, 9, 8, 7]);
}

#[tokio::test]
async fn reporter_preview_is_downscaled_for_executing_client() {
    let server = TestServer::spawn().await;
    let mut ws = server.connect(Some("abc")).await;
    next_json(&mut ws).await;

    let reporter = server.state.reporter();
    reporter.execution_start("prompt-1", Some("abc".into())).unwrap();
    let image = DynamicImage::ImageRgb8(RgbImage::new(4000, 4000));
    reporter.preview(image, PreviewFormat::Png, Some(256)).unwrap();

    let start = next_json(&mut ws).await;
    assert_eq!(start["type"], "execution_start");
    assert_eq!(start["data"]["prompt_id"], "prompt-1");

    let frame = next_binary(&mut ws).await;
    assert_eq!(&frame[..8], &[0, 0, 0, 1, 0, 0, 0, 2]);
    let decoded = image::load_from_memory(&frame[8..]).unwrap();
    assert_eq!(decoded.dimensions(), (256, 256));
}

#[tokio::test]
async fn targeted_event_for_absent_session_is_dropped() {
    let server = TestServer::spawn().await;
    let mut ws = server.connect(Some("abc")).await;
    next_json(&mut ws).await;

    server
        .state
        .publisher
        .send_json("lost", json!({}), Target::Session("gone".into()))
        .unwrap();
    server
        .state
        .publisher
        .send_json("kept", json!({}), "abc")
        .unwrap();

    // The dropped event does not stall the queue.
    assert_eq!(next_json(&mut ws).await["type"], "kept");
}
