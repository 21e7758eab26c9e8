use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use posture_core::{AnalysisError, Thresholds, ViewingDirection};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::store::operations::posture_settings::PostureSettings;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).put(update_settings))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    #[serde(flatten)]
    pub settings: PostureSettings,
    pub width_factor: f64,
    pub thresholds: Thresholds,
}

impl SettingsResponse {
    pub fn build(settings: PostureSettings, width_factor: f64) -> Self {
        let thresholds = settings.profile().thresholds(width_factor);
        Self {
            settings,
            width_factor,
            thresholds,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSettingsRequest {
    mean: Option<f64>,
    std_dev: Option<f64>,
    viewing_direction: Option<ViewingDirection>,
}

async fn get_settings(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let settings = state.store().get_posture_settings(&auth.user_id)?;
    Ok(ok(SettingsResponse::build(
        settings,
        state.analysis().width_factor,
    )))
}

/// 手动修改基线或观察方向；已打开的实时会话立即生效。
/// 实时会话测量中拒绝修改，测量记录只对应一组阈值。
async fn update_settings(
    auth: AuthUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let shared = state.live().get(&auth.user_id).await;
    let mut live = match &shared {
        Some(shared) => Some(shared.lock().await),
        None => None,
    };
    if live.as_ref().is_some_and(|l| l.session.is_measuring()) {
        return Err(AnalysisError::MeasurementInProgress.into());
    }

    let mut settings = state.store().get_posture_settings(&auth.user_id)?;
    if let Some(mean) = req.mean {
        settings.mean = mean;
    }
    if let Some(std_dev) = req.std_dev {
        settings.std_dev = std_dev;
    }
    if let Some(direction) = req.viewing_direction {
        settings.viewing_direction = direction;
    }
    settings.updated_at = Utc::now();
    state.store().put_posture_settings(&settings)?;

    if let Some(live) = live.as_mut() {
        live.session.apply_profile(settings.profile())?;
        live.session.set_viewing_direction(settings.viewing_direction)?;
    }

    Ok(ok(SettingsResponse::build(
        settings,
        state.analysis().width_factor,
    )))
}
