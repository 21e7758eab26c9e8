use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use posture_core::{
    diagnose, replay, AnalysisConfig, CalibrationProfile, Diagnosis, PostureSample,
    SessionSummary, ViewingDirection,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_MEASUREMENT_SAMPLES, MAX_PAGE_SIZE};
use crate::extractors::{JsonBody, QueryParams};
use crate::response::{created, ok, paginated, AppError};
use crate::state::AppState;
use crate::store::operations::measurements::MeasurementRecord;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_measurements).post(create_measurement))
        .route("/:id", get(get_measurement).delete(delete_measurement))
        .route("/:id/replay", get(replay_measurement))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMeasurementsQuery {
    page: Option<u64>,
    per_page: Option<u64>,
}

impl ListMeasurementsQuery {
    fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    fn per_page(&self) -> u64 {
        self.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

/// 客户端上报的一帧：只取时间与角度，状态由服务端按保存的阈值重新判定
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordedFrame {
    elapsed_ms: u64,
    angle: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMeasurementRequest {
    samples: Vec<RecordedFrame>,
    total_duration_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayResponse {
    id: u64,
    samples: Vec<PostureSample>,
    summary: SessionSummary,
    diagnosis: Diagnosis,
}

/// 用测量当时的档案与分析配置生成诊断并持久化。
/// `summary` 必须是用同一组阈值与驻留时长判定得到的。
pub(crate) fn persist_measurement(
    state: &AppState,
    user_id: &str,
    summary: SessionSummary,
    analysis: &AnalysisConfig,
    profile: CalibrationProfile,
    viewing_direction: ViewingDirection,
) -> Result<MeasurementRecord, AppError> {
    let thresholds = profile.thresholds(analysis.width_factor);
    let diagnosis = diagnose(&summary, &profile, &thresholds, &analysis.diagnosis);

    let record = state.store().create_measurement(MeasurementRecord {
        id: 0,
        user_id: user_id.to_string(),
        summary,
        profile,
        thresholds,
        width_factor: analysis.width_factor,
        dwell_ms: analysis.dwell_ms,
        viewing_direction,
        diagnosis,
        recorded_at: Utc::now(),
    })?;

    tracing::info!(
        user_id,
        id = record.id,
        diagnosis = ?record.diagnosis.kind,
        breaks = record.summary.break_count,
        "Measurement recorded"
    );
    Ok(record)
}

async fn list_measurements(
    auth: AuthUser,
    QueryParams(q): QueryParams<ListMeasurementsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let page = q.page();
    let per_page = q.per_page();
    let offset = page.saturating_sub(1).saturating_mul(per_page) as usize;
    let records = state
        .store()
        .list_user_measurements(&auth.user_id, per_page as usize, offset)?;
    let total = state.store().count_user_measurements(&auth.user_id)? as u64;
    Ok(paginated(records, total, page, per_page))
}

/// 客户端本地完成的测量：服务端按当前档案重新判定、汇总与诊断
async fn create_measurement(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateMeasurementRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.samples.len() > MAX_MEASUREMENT_SAMPLES {
        return Err(AppError::bad_request(
            "MEASUREMENT_TOO_LARGE",
            "Too many samples in one measurement",
        ));
    }
    if !req
        .samples
        .windows(2)
        .all(|w| w[0].elapsed_ms <= w[1].elapsed_ms)
    {
        return Err(AppError::bad_request(
            "MEASUREMENT_UNORDERED",
            "Samples must be ordered by elapsedMs",
        ));
    }
    if req
        .samples
        .iter()
        .any(|s| s.angle.is_some_and(|a| !a.is_finite()))
    {
        return Err(AppError::bad_request(
            "MEASUREMENT_INVALID_ANGLE",
            "Sample angles must be finite",
        ));
    }

    let settings = state.store().get_posture_settings(&auth.user_id)?;
    let analysis = state.analysis();
    let profile = settings.profile();
    let series: Vec<(u64, Option<f64>)> = req
        .samples
        .iter()
        .map(|frame| (frame.elapsed_ms, frame.angle))
        .collect();
    let samples = replay(
        &series,
        &profile.thresholds(analysis.width_factor),
        analysis.dwell_ms,
    );
    let summary = SessionSummary::from_samples(&samples, req.total_duration_ms);
    let record = persist_measurement(
        &state,
        &auth.user_id,
        summary,
        analysis,
        profile,
        settings.viewing_direction,
    )?;
    Ok(created(record))
}

async fn get_measurement(
    auth: AuthUser,
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.store().get_user_measurement(&auth.user_id, id)?))
}

async fn delete_measurement(
    auth: AuthUser,
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    state.store().delete_measurement(&auth.user_id, id)?;
    Ok(ok(serde_json::json!({ "deleted": true, "id": id })))
}

/// 用保存的阈值重放角度序列，重新得到逐帧状态与诊断
async fn replay_measurement(
    auth: AuthUser,
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.store().get_user_measurement(&auth.user_id, id)?;
    let samples = replay(&record.summary.angle_series, &record.thresholds, record.dwell_ms);
    let summary = SessionSummary::from_samples(&samples, record.summary.total_duration_ms);
    let diagnosis = diagnose(
        &summary,
        &record.profile,
        &record.thresholds,
        &state.analysis().diagnosis,
    );

    Ok(ok(ReplayResponse {
        id: record.id,
        samples,
        summary,
        diagnosis,
    }))
}
