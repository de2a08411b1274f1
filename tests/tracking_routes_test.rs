mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::*;

const INTERVAL: Duration = Duration::from_millis(50);

/// Poll `check` until it holds or two seconds pass.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..40 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

fn start_body(ids: &[i64]) -> Value {
    json!({ "orders": ids.iter().map(|id| order_json(*id, "paid")).collect::<Vec<_>>() })
}

#[tokio::test]
async fn tracking_requires_a_session_token() {
    let (app, _state, _fake) = test_app(INTERVAL).await;
    let (status, body) = send(&app, post_json("/api/tracking", start_body(&[10]))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "MISSING_SESSION");
}

#[tokio::test]
async fn empty_order_list_is_rejected() {
    let (app, _state, _fake) = test_app(INTERVAL).await;
    let (status, _) = send(
        &app,
        with_bearer(post_json("/api/tracking", json!({"orders": []})), "tok-7"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_transition_updates_orders_and_queues_announcement() {
    let (app, _state, fake) = test_app(INTERVAL).await;
    fake.set_status(10, "paid");
    fake.set_status(20, "paid");

    let (status, body) = send(
        &app,
        with_bearer(post_json("/api/tracking", start_body(&[10, 20])), "tok-7"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tracking_id = body["data"]["tracking_id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["orders"][0]["status_label"], "Paid");
    assert_eq!(body["data"]["orders"][0]["total_display"], "150.000 ₫");

    fake.set_status(10, "in_progress");

    let uri = format!("/api/tracking/{tracking_id}");
    let moved = eventually(|| {
        let app = app.clone();
        let uri = uri.clone();
        async move {
            let (_, body) = send(&app, with_bearer(get(&uri), "tok-7")).await;
            body["data"]["orders"][0]["status"] == "in_progress"
        }
    })
    .await;
    assert!(moved, "order 10 never reached in_progress");

    let (_, body) = send(&app, with_bearer(get(&uri), "tok-7")).await;
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["orders"][1]["status"], "paid");

    let (_, body) = send(
        &app,
        with_bearer(get(&format!("{uri}/announcements")), "tok-7"),
    )
    .await;
    let spoken: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["text"].as_str())
        .collect();
    assert_eq!(spoken, vec!["Please proceed to Room 110. Queue number A10."]);

    // Drained.
    let (_, body) = send(
        &app,
        with_bearer(get(&format!("{uri}/announcements")), "tok-7"),
    )
    .await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn broken_upstream_replies_keep_the_last_snapshot() {
    let (app, _state, fake) = test_app(INTERVAL).await;
    fake.set_status(10, "broken");

    let (_, body) = send(
        &app,
        with_bearer(post_json("/api/tracking", start_body(&[10])), "tok-7"),
    )
    .await;
    let tracking_id = body["data"]["tracking_id"].as_str().unwrap().to_string();

    let polled = eventually(|| {
        let fake = fake.clone();
        async move { fake.status_calls() >= 3 }
    })
    .await;
    assert!(polled);

    let (_, body) = send(
        &app,
        with_bearer(get(&format!("/api/tracking/{tracking_id}")), "tok-7"),
    )
    .await;
    assert_eq!(body["data"]["orders"][0]["status"], "paid");
    assert_eq!(body["data"]["pending_announcements"], 0);
}

#[tokio::test]
async fn replay_and_stop() {
    let (app, state, fake) = test_app(INTERVAL).await;
    fake.set_status(10, "paid");

    let (_, body) = send(
        &app,
        with_bearer(post_json("/api/tracking", start_body(&[10])), "tok-7"),
    )
    .await;
    let tracking_id = body["data"]["tracking_id"].as_str().unwrap().to_string();
    let announce = format!("/api/tracking/{tracking_id}/orders/10/announce");

    for _ in 0..2 {
        let (status, body) = send(&app, with_bearer(post_json(&announce, json!({})), "tok-7")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["text"], "Please proceed to Room 110. Queue number A10.");
    }

    let (status, _) = send(
        &app,
        with_bearer(
            post_json(&format!("/api/tracking/{tracking_id}/orders/99/announce"), json!({})),
            "tok-7",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Another patient cannot see or stop this session.
    let (status, _) = send(
        &app,
        with_bearer(get(&format!("/api/tracking/{tracking_id}")), "someone-else"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        with_bearer(bare("DELETE", &format!("/api/tracking/{tracking_id}")), "tok-7"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.tracking.len().await, 0);

    // Let any request already on the wire land before counting.
    tokio::time::sleep(INTERVAL).await;
    let calls_after_stop = fake.status_calls();
    tokio::time::sleep(INTERVAL * 4).await;
    assert_eq!(fake.status_calls(), calls_after_stop);
}

#[tokio::test]
async fn resume_after_reload_and_sign_out() {
    let (app, state, fake) = test_app(INTERVAL).await;
    fake.set_status(10, "paid");

    let (status, _) = send(&app, with_bearer(bare("POST", "/api/tracking/resume"), "tok-7")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(
        &app,
        with_bearer(post_json("/api/tracking", start_body(&[10])), "tok-7"),
    )
    .await;
    let first_id = body["data"]["tracking_id"].as_str().unwrap().to_string();
    send(
        &app,
        with_bearer(bare("DELETE", &format!("/api/tracking/{first_id}")), "tok-7"),
    )
    .await;

    let (status, body) = send(&app, with_bearer(bare("POST", "/api/tracking/resume"), "tok-7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["data"]["tracking_id"], first_id.as_str());
    assert_eq!(body["data"]["orders"][0]["id"], 10);

    let (status, body) = send(&app, with_bearer(bare("DELETE", "/api/tracking/persisted"), "tok-7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stopped_sessions"], 1);
    assert_eq!(state.tracking.len().await, 0);

    let (status, _) = send(&app, with_bearer(bare("POST", "/api/tracking/resume"), "tok-7")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reload_replaces_the_previous_session() {
    let (app, state, fake) = test_app(INTERVAL).await;
    fake.set_status(10, "paid");

    let (_, body) = send(
        &app,
        with_bearer(post_json("/api/tracking", start_body(&[10])), "tok-7"),
    )
    .await;
    let first_id = body["data"]["tracking_id"].as_str().unwrap().to_string();

    // Two reloads, neither of which stops the session it replaces.
    let mut latest_id = first_id.clone();
    for _ in 0..2 {
        let (status, body) =
            send(&app, with_bearer(bare("POST", "/api/tracking/resume"), "tok-7")).await;
        assert_eq!(status, StatusCode::OK);
        latest_id = body["data"]["tracking_id"].as_str().unwrap().to_string();
    }

    assert_eq!(state.tracking.len().await, 1);
    let (status, _) = send(
        &app,
        with_bearer(get(&format!("/api/tracking/{first_id}")), "tok-7"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &app,
        with_bearer(get(&format!("/api/tracking/{latest_id}")), "tok-7"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // One order, one live poller: about one fetch per interval.
    tokio::time::sleep(INTERVAL).await;
    let before = fake.status_calls();
    tokio::time::sleep(INTERVAL * 10).await;
    let polled = fake.status_calls() - before;
    assert!(polled <= 15, "status fetches in 10 intervals = {polled}");
}
