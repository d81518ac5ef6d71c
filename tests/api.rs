use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use lablink_gateway::api::{build_router, AppState};
use lablink_gateway::config::GatewayConfig;
use lablink_gateway::store::MemoryStore;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

fn app() -> (Arc<MemoryStore>, AppState, Router) {
    let memory = Arc::new(MemoryStore::new());
    let state = AppState::new(memory.clone(), GatewayConfig::default());
    let router = build_router(state.clone());
    (memory, state, router)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn reading(ts: i64, temperature: f64) -> Value {
    json!({
        "session_id": "exp-1",
        "device_ts": ts,
        "temperature": temperature,
        "pressure": 101325.0,
        "humidity": 45.0,
        "voc": 120.0,
        "accel_x": 0.1,
        "accel_y": 0.2,
        "accel_z": 9.8,
        "gyro_x": 0.01,
        "gyro_y": 0.02,
        "gyro_z": 0.03,
        "distance": 0.5
    })
}

#[tokio::test]
async fn health_reports_relay_and_connections() {
    let (_, _, app) = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["relayRunning"], false);
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn ingested_reading_reaches_the_store_with_every_column() {
    let (memory, _, app) = app();
    let (status, body) = send(&app, "POST", "/readings", Some(reading(1000, 21.0))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let rows = memory.rows("sensor_readings");
    assert_eq!(rows.len(), 1);
    let expected = reading(1000, 21.0);
    for (key, value) in expected.as_object().unwrap() {
        assert_eq!(&rows[0][key], value, "column {}", key);
    }
}

#[tokio::test]
async fn store_rejection_keeps_its_status_code() {
    let (memory, _, app) = app();
    memory.fail_with(409, "duplicate key value");
    let (status, body) = send(&app, "POST", "/api/sensor-data", Some(reading(1, 20.0))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "duplicate key value");
}

#[tokio::test]
async fn invalid_reading_is_rejected_before_the_store() {
    let (memory, _, app) = app();
    let (status, _) = send(
        &app,
        "POST",
        "/readings",
        Some(json!({"session_id": "", "device_ts": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/readings", Some(json!({"temperature": 1.0}))).await;
    assert!(status.is_client_error());
    assert!(memory.rows("sensor_readings").is_empty());
}

#[tokio::test]
async fn malformed_body_gets_the_error_envelope() {
    let (memory, _, app) = app();
    for (uri, body) in [
        ("/readings", json!({"session_id": "exp-1"})),
        ("/sessions/start", json!({"device": "esp32-a"})),
        ("/auth/v1/token", json!({"email": "test@lablink.com"})),
    ] {
        let (status, body) = send(&app, "POST", uri, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["status"], "error", "{}", uri);
        assert_eq!(body["error_code"], "VALIDATION_ERROR", "{}", uri);
        assert!(body["message"].as_str().unwrap().contains("missing field"), "{}", uri);
    }
    assert!(memory.rows("sensor_readings").is_empty());
}

#[tokio::test]
async fn inserted_reading_comes_back_from_latest() {
    let (_, _, app) = app();
    send(&app, "POST", "/readings", Some(reading(1000, 21.0))).await;
    send(&app, "POST", "/readings", Some(reading(2000, 22.0))).await;

    let (status, body) = send(&app, "GET", "/api/sensor-data/latest?session_id=exp-1", None).await;
    assert_eq!(status, StatusCode::OK);
    let expected = reading(2000, 22.0);
    for (key, value) in expected.as_object().unwrap() {
        assert_eq!(&body[key], value, "column {}", key);
    }
    assert!(body.get("id").is_some());
}

#[tokio::test]
async fn latest_is_null_for_unknown_session() {
    let (_, _, app) = app();
    let (status, body) = send(&app, "GET", "/api/sensor-data/latest?session_id=nope", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());
}

#[tokio::test]
async fn recent_readings_are_newest_first_and_limited() {
    let (_, _, app) = app();
    for ts in [1000, 3000, 2000] {
        send(&app, "POST", "/readings", Some(reading(ts, 20.0))).await;
    }
    let (_, body) = send(&app, "GET", "/api/sensor-data?limit=2", None).await;
    let ts: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["device_ts"].as_i64().unwrap())
        .collect();
    assert_eq!(ts, vec![3000, 2000]);
}

#[tokio::test]
async fn session_start_then_stop() {
    let (_, _, app) = app();
    let (status, session) =
        send(&app, "POST", "/sessions/start", Some(json!({"device_id": "esp32-a"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["device_id"], "esp32-a");
    assert!(session["stopped_at"].is_null());

    let (status, stopped) = send(
        &app,
        "POST",
        "/sessions/stop",
        Some(json!({"session_id": session["id"].clone()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(stopped["stopped_at"].is_string());

    let (status, _) =
        send(&app, "POST", "/sessions/stop", Some(json!({"session_id": "999"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn experiment_start_is_idempotent() {
    let (_, state, app) = app();
    let (_, first) = send(&app, "POST", "/api/experiment/start", None).await;
    let (_, second) = send(&app, "POST", "/api/experiment/start", None).await;
    assert_eq!(first["changed"], true);
    assert_eq!(second["changed"], false);
    assert!(state.relay.is_running().await);

    let (_, stopped) = send(&app, "POST", "/api/experiment/stop", None).await;
    assert_eq!(stopped["status"], "stopped");
    assert_eq!(stopped["changed"], true);
}

#[tokio::test]
async fn summary_over_stored_window() {
    let (_, _, app) = app();
    send(&app, "POST", "/readings", Some(reading(0, 20.0))).await;
    send(&app, "POST", "/readings", Some(reading(10_000, 25.0))).await;

    let (status, body) = send(&app, "POST", "/api/experiment/summary?session_id=exp-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dataPoints"], 2);
    assert_eq!(body["duration"], 10);
    assert_eq!(body["statistics"]["temperature"]["change"], 5.0);
    assert_eq!(body["statistics"]["temperature"]["avg"], 22.5);
    assert_eq!(body["events"], json!([]));
}

#[tokio::test]
async fn summary_without_data_is_the_fixture() {
    let (_, _, app) = app();
    for uri in ["/api/experiment/summary", "/api/experiment/summary-no-data"] {
        let (status, body) = send(&app, "POST", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dataPoints"], 0);
        assert_eq!(body["duration"], 0);
        assert_eq!(body["dataQuality"]["motionEvents"], 0);
        assert_eq!(body["events"], json!([]));
        assert_eq!(body["statistics"]["pressure"]["avg"], "N/A");
    }
}

#[tokio::test]
async fn summary_propagates_store_errors() {
    let (memory, _, app) = app();
    memory.fail_with(503, "unavailable");
    let (status, body) = send(&app, "POST", "/api/experiment/summary", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn auth_stub_accepts_only_the_configured_pair() {
    let (_, _, app) = app();
    let (status, body) = send(
        &app,
        "POST",
        "/auth/v1/token",
        Some(json!({"email": "test@lablink.com", "password": "password"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert!(body["access_token"].as_str().unwrap().len() > 0);

    let (status, body) = send(
        &app,
        "POST",
        "/auth/v1/token",
        Some(json!({"email": "test@lablink.com", "password": "guess"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Invalid credentials"}));

    let (status, body) = send(
        &app,
        "POST",
        "/auth/v1/signup",
        Some(json!({"email": "new@lab.io", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "new@lab.io");
}

#[tokio::test]
async fn csv_export_has_header_and_rows() {
    let (_, _, app) = app();
    send(&app, "POST", "/readings", Some(reading(1000, 21.0))).await;

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/api/export/csv").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"].to_str().unwrap().starts_with("text/csv"));

    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("exp-1,1000,21,"));
}
