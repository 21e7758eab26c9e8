use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use posture_core::{
    CalibrationOutcome, CalibrationProfile, CalibrationStatus, FrameAnalysis, Landmark,
    PostureState, Thresholds, ViewingDirection,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::constants::MAX_FRAME_LANDMARKS;
use crate::extractors::JsonBody;
use crate::live::LiveSession;
use crate::response::{created, ok, AppError};
use crate::routes::measurements::persist_measurement;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/session",
            post(open_session).get(session_status).delete(close_session),
        )
        .route("/frames", post(submit_frame))
        .route(
            "/calibration",
            post(start_calibration).delete(cancel_calibration),
        )
        .route("/measurement", post(start_measurement))
        .route("/measurement/stop", post(stop_measurement))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimestampRequest {
    timestamp_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrameRequest {
    timestamp_ms: u64,
    landmarks: Vec<Landmark>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionStatus {
    state: PostureState,
    profile: CalibrationProfile,
    thresholds: Thresholds,
    viewing_direction: ViewingDirection,
    measuring: bool,
    measurement_samples: usize,
    calibration: CalibrationStatus,
    last_frame_ms: Option<u64>,
}

impl SessionStatus {
    fn of(live: &LiveSession, now_ms: u64) -> Self {
        let session = &live.session;
        Self {
            state: session.state(),
            profile: session.profile(),
            thresholds: session.thresholds(),
            viewing_direction: session.direction(),
            measuring: session.is_measuring(),
            measurement_samples: session.measurement_sample_count(),
            calibration: session.calibration_status(now_ms),
            last_frame_ms: session.last_frame_ms(),
        }
    }
}

/// 以用户保存的档案与观察方向打开会话，已有会话会被替换
async fn open_session(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.store().get_posture_settings(&auth.user_id)?;
    let live = state
        .live()
        .open(
            &auth.user_id,
            state.analysis().clone(),
            settings.profile(),
            settings.viewing_direction,
        )
        .await?;
    let live = live.lock().await;
    Ok(created(SessionStatus::of(&live, 0)))
}

async fn session_status(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let live = state.live().require(&auth.user_id).await?;
    let live = live.lock().await;
    let now_ms = live.session.last_frame_ms().unwrap_or(0);
    Ok(ok(SessionStatus::of(&live, now_ms)))
}

async fn close_session(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    if !state.live().remove(&auth.user_id).await {
        return Err(AppError::not_found("No live session; open one first"));
    }
    tracing::info!(user_id = %auth.user_id, "Live session closed");
    Ok(ok(serde_json::json!({ "closed": true })))
}

/// 处理一帧；若本帧结束了校准且成功，新档案写入设置
async fn submit_frame(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<FrameRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.landmarks.len() > MAX_FRAME_LANDMARKS {
        return Err(AppError::bad_request(
            "FRAME_TOO_LARGE",
            "Too many landmarks in one frame",
        ));
    }

    let live = state.live().require(&auth.user_id).await?;
    let mut live = live.lock().await;
    live.touch();
    let analysis: FrameAnalysis = live.session.process_frame(&req.landmarks, req.timestamp_ms);
    drop(live);

    if let Some(outcome) = &analysis.calibration_outcome {
        save_calibration(&state, &auth.user_id, outcome)?;
    }

    Ok(ok(analysis))
}

fn save_calibration(
    state: &AppState,
    user_id: &str,
    outcome: &CalibrationOutcome,
) -> Result<(), AppError> {
    match outcome {
        CalibrationOutcome::Completed { profile, .. } => {
            state.store().record_calibration(user_id, *profile)?;
        }
        CalibrationOutcome::Failed { reason } => {
            tracing::info!(user_id, code = reason.code(), "Calibration failed, settings kept");
        }
    }
    Ok(())
}

async fn start_calibration(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TimestampRequest>,
) -> Result<impl IntoResponse, AppError> {
    let live = state.live().require(&auth.user_id).await?;
    let mut live = live.lock().await;
    live.touch();
    live.session.start_calibration(req.timestamp_ms)?;
    tracing::info!(user_id = %auth.user_id, "Calibration started");
    Ok(ok(SessionStatus::of(&live, req.timestamp_ms)))
}

async fn cancel_calibration(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let live = state.live().require(&auth.user_id).await?;
    let mut live = live.lock().await;
    live.touch();
    live.session.cancel_calibration()?;
    let now_ms = live.session.last_frame_ms().unwrap_or(0);
    Ok(ok(SessionStatus::of(&live, now_ms)))
}

async fn start_measurement(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TimestampRequest>,
) -> Result<impl IntoResponse, AppError> {
    let live = state.live().require(&auth.user_id).await?;
    let mut live = live.lock().await;
    live.touch();
    live.session.start_measurement(req.timestamp_ms)?;
    tracing::info!(user_id = %auth.user_id, "Measurement started");
    Ok(ok(SessionStatus::of(&live, req.timestamp_ms)))
}

/// 结束测量并持久化记录；档案与配置取会话当前值，测量期间二者不会变化
async fn stop_measurement(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TimestampRequest>,
) -> Result<impl IntoResponse, AppError> {
    let live = state.live().require(&auth.user_id).await?;
    let mut live = live.lock().await;
    live.touch();
    let summary = live.session.stop_measurement(req.timestamp_ms)?;
    let analysis = live.session.config().clone();
    let profile = live.session.profile();
    let direction = live.session.direction();
    drop(live);

    let record = persist_measurement(
        &state,
        &auth.user_id,
        summary,
        &analysis,
        profile,
        direction,
    )?;
    Ok(created(record))
}
