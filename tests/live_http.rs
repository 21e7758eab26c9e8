mod common;

use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::Value;

use common::app::spawn_test_server;
use common::auth::{bearer, register_user};
use common::fixtures::{empty_frame, frame_body, side_view_frame, timestamp_body};
use common::http::{assert_json_error, assert_status_ok_json, call};
use common::records::assert_summary_matches_replay;

async fn open_session(app: &Router, token: &str) -> Value {
    let (status, body) = call(app, Method::POST, "/api/live/session", None, &bearer(token)).await;
    assert_eq!(status, StatusCode::CREATED, "open session failed: {body}");
    body
}

async fn send_frame(app: &Router, token: &str, timestamp_ms: u64, landmarks: Vec<Value>) -> Value {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/live/frames",
        Some(frame_body(timestamp_ms, landmarks)),
        &bearer(token),
    )
    .await;
    assert_status_ok_json(status, &body);
    body["data"].clone()
}

async fn post_at(app: &Router, token: &str, path: &str, timestamp_ms: u64) -> (StatusCode, Value) {
    call(app, Method::POST, path, Some(timestamp_body(timestamp_ms)), &bearer(token)).await
}

#[tokio::test]
async fn it_live_session_open_uses_saved_settings() {
    let app = spawn_test_server().await;
    let (token, _) = register_user(&app.app).await;

    let body = open_session(&app.app, &token).await;
    let data = &body["data"];
    assert_eq!(data["state"], "GOOD");
    assert_eq!(data["viewingDirection"], "right");
    assert_eq!(data["measuring"], false);
    assert_eq!(data["calibration"]["phase"], "idle");
    assert_eq!(data["thresholds"]["upper"], 18.75);

    let (status, body) = call(&app.app, Method::GET, "/api/live/session", None, &bearer(&token)).await;
    assert_status_ok_json(status, &body);
    assert_eq!(app.state.live().len().await, 1);
}

#[tokio::test]
async fn it_live_frames_report_angle_and_state() {
    let app = spawn_test_server().await;
    let (token, _) = register_user(&app.app).await;
    open_session(&app.app, &token).await;

    let upright = send_frame(&app.app, &token, 0, side_view_frame(0.0)).await;
    assert_eq!(upright["state"], "GOOD");
    assert!(upright["angle"].as_f64().unwrap().abs() < 1e-9);

    // 前倾约 36.9°：驻留期内为 Warning，满 3 秒后确认为乌龟颈
    let early = send_frame(&app.app, &token, 1_000, side_view_frame(0.15)).await;
    assert_eq!(early["state"], "WARNING");
    assert!(early["angle"].as_f64().unwrap() > 18.75);

    let later = send_frame(&app.app, &token, 4_000, side_view_frame(0.15)).await;
    assert_eq!(later["state"], "TURTLE_NECK");
    assert!(later["feedback"].is_string());

    let lost = send_frame(&app.app, &token, 4_500, empty_frame()).await;
    assert_eq!(lost["state"], "NOT_DETECTED");
    assert!(lost["angle"].is_null());
}

#[tokio::test]
async fn it_live_calibration_success_saves_profile() {
    let app = spawn_test_server().await;
    let (token, _) = register_user(&app.app).await;
    open_session(&app.app, &token).await;

    let (status, body) = post_at(&app.app, &token, "/api/live/calibration", 0).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["calibration"]["phase"], "preparing");

    // 准备 100ms，采集 1000ms；在 1100ms 的帧上结束
    let mut outcome = Value::Null;
    for step in 0..=11u64 {
        let frame = send_frame(&app.app, &token, step * 100, side_view_frame(0.05)).await;
        if !frame["calibrationOutcome"].is_null() {
            outcome = frame["calibrationOutcome"].clone();
            break;
        }
    }
    assert_eq!(outcome["status"], "completed", "unexpected outcome: {outcome}");
    let expected_mean = (0.05f64 / 0.2).atan().to_degrees();
    assert!((outcome["profile"]["mean"].as_f64().unwrap() - expected_mean).abs() < 1e-6);

    let (_, settings) = call(&app.app, Method::GET, "/api/settings", None, &bearer(&token)).await;
    let saved_mean = settings["data"]["mean"].as_f64().unwrap();
    assert!((saved_mean - expected_mean).abs() < 1e-6);
    assert!(settings["data"]["stdDev"].as_f64().unwrap().abs() < 1e-6);
    assert!(settings["data"]["calibratedAt"].is_string());
}

#[tokio::test]
async fn it_live_failed_calibration_keeps_settings() {
    let app = spawn_test_server().await;
    let (token, _) = register_user(&app.app).await;
    open_session(&app.app, &token).await;

    post_at(&app.app, &token, "/api/live/calibration", 0).await;

    let mut outcome = Value::Null;
    for step in 0..=11u64 {
        let frame = send_frame(&app.app, &token, step * 100, empty_frame()).await;
        if !frame["calibrationOutcome"].is_null() {
            outcome = frame["calibrationOutcome"].clone();
            break;
        }
    }
    assert_eq!(outcome["status"], "failed", "unexpected outcome: {outcome}");
    assert_eq!(outcome["reason"]["kind"], "insufficientCalibrationSamples");

    let (_, settings) = call(&app.app, Method::GET, "/api/settings", None, &bearer(&token)).await;
    assert_eq!(settings["data"]["mean"], 0.0);
    assert_eq!(settings["data"]["stdDev"], 7.5);
    assert!(settings["data"]["calibratedAt"].is_null());

    // 失败后可以重新开始校准
    let (status, _) = post_at(&app.app, &token, "/api/live/calibration", 2_000).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app.app, Method::DELETE, "/api/live/calibration", None, &bearer(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn it_live_measurement_is_persisted_on_stop() {
    let app = spawn_test_server().await;
    let (token, _) = register_user(&app.app).await;
    open_session(&app.app, &token).await;

    let (status, body) = post_at(&app.app, &token, "/api/live/measurement", 5_000).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["measuring"], true);

    for step in 0..=8u64 {
        send_frame(&app.app, &token, 5_000 + step * 500, side_view_frame(0.15)).await;
    }

    let (status, body) = post_at(&app.app, &token, "/api/live/measurement/stop", 9_500).await;
    assert_eq!(status, StatusCode::CREATED, "stop failed: {body}");
    let record = &body["data"];
    assert_eq!(record["summary"]["totalDurationMs"], 4_500);
    assert_eq!(record["summary"]["warningCount"], 6);
    assert_eq!(record["summary"]["badCount"], 3);
    assert_eq!(record["viewingDirection"], "right");

    let (_, list) = call(&app.app, Method::GET, "/api/measurements", None, &bearer(&token)).await;
    assert_eq!(list["data"]["total"], 1);
    assert_eq!(list["data"]["data"][0]["id"], record["id"]);
    assert_summary_matches_replay(&app.app, &token, record).await;
}

#[tokio::test]
async fn it_live_measurement_with_gap_replays_identically() {
    let app = spawn_test_server().await;
    let (token, _) = register_user(&app.app).await;
    open_session(&app.app, &token).await;

    post_at(&app.app, &token, "/api/live/measurement", 0).await;
    send_frame(&app.app, &token, 0, side_view_frame(0.0)).await;
    send_frame(&app.app, &token, 1_000, side_view_frame(0.15)).await;
    send_frame(&app.app, &token, 2_000, empty_frame()).await;
    send_frame(&app.app, &token, 2_500, side_view_frame(0.15)).await;
    let last = send_frame(&app.app, &token, 4_500, side_view_frame(0.15)).await;
    // 未检测帧重新开始驻留计时
    assert_eq!(last["state"], "WARNING");

    let (status, body) = post_at(&app.app, &token, "/api/live/measurement/stop", 5_000).await;
    assert_eq!(status, StatusCode::CREATED);
    let record = &body["data"];
    assert_eq!(record["summary"]["notDetectedCount"], 1);
    assert_eq!(record["summary"]["badCount"], 0);
    assert_eq!(record["summary"]["angleSeries"].as_array().unwrap().len(), 5);
    assert_summary_matches_replay(&app.app, &token, record).await;
}

#[tokio::test]
async fn it_live_settings_locked_during_measurement() {
    let app = spawn_test_server().await;
    let (token, _) = register_user(&app.app).await;
    open_session(&app.app, &token).await;
    post_at(&app.app, &token, "/api/live/measurement", 0).await;

    let (status, body) = call(
        &app.app,
        Method::PUT,
        "/api/settings",
        Some(serde_json::json!({ "stdDev": 20.0 })),
        &bearer(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "MEASUREMENT_IN_PROGRESS");

    let (_, settings) = call(&app.app, Method::GET, "/api/settings", None, &bearer(&token)).await;
    assert_eq!(settings["data"]["stdDev"], 7.5);

    let frame = send_frame(&app.app, &token, 0, side_view_frame(0.0)).await;
    assert_eq!(frame["thresholds"]["upper"], 18.75);

    post_at(&app.app, &token, "/api/live/measurement/stop", 1_000).await;
    let (status, _) = call(
        &app.app,
        Method::PUT,
        "/api/settings",
        Some(serde_json::json!({ "stdDev": 20.0 })),
        &bearer(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn it_live_state_conflicts_are_409() {
    let app = spawn_test_server().await;
    let (token, _) = register_user(&app.app).await;
    open_session(&app.app, &token).await;

    let (status, body) = post_at(&app.app, &token, "/api/live/measurement/stop", 1_000).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "MEASUREMENT_NOT_ACTIVE");

    let (status, body) = call(&app.app, Method::DELETE, "/api/live/calibration", None, &bearer(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "CALIBRATION_NOT_ACTIVE");

    post_at(&app.app, &token, "/api/live/measurement", 1_000).await;
    let (status, body) = post_at(&app.app, &token, "/api/live/calibration", 1_500).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_json_error(&body, "MEASUREMENT_IN_PROGRESS");
}

#[tokio::test]
async fn it_live_requires_open_session() {
    let app = spawn_test_server().await;
    let (token, _) = register_user(&app.app).await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/live/frames",
        Some(frame_body(0, side_view_frame(0.0))),
        &bearer(&token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "NOT_FOUND");

    open_session(&app.app, &token).await;
    let (status, body) = call(&app.app, Method::DELETE, "/api/live/session", None, &bearer(&token)).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["closed"], true);

    let (status, _) = call(&app.app, Method::DELETE, "/api/live/session", None, &bearer(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn it_live_settings_update_applies_to_open_session() {
    let app = spawn_test_server().await;
    let (token, _) = register_user(&app.app).await;
    open_session(&app.app, &token).await;

    call(
        &app.app,
        Method::PUT,
        "/api/settings",
        Some(serde_json::json!({ "mean": 30.0, "stdDev": 4.0 })),
        &bearer(&token),
    )
    .await;

    // 36.9° 落在新的 [20, 40] 区间内
    let frame = send_frame(&app.app, &token, 0, side_view_frame(0.15)).await;
    assert_eq!(frame["state"], "GOOD");
    assert_eq!(frame["thresholds"]["upper"], 40.0);
}
