use chrono::{DateTime, Utc};
use posture_core::{CalibrationProfile, ViewingDirection};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureSettings {
    pub user_id: String,
    pub mean: f64,
    pub std_dev: f64,
    pub viewing_direction: ViewingDirection,
    #[serde(default)]
    pub calibrated_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PostureSettings {
    /// 未校准用户使用默认档案
    pub fn defaults_for(user_id: &str) -> Self {
        let profile = CalibrationProfile::default();
        Self {
            user_id: user_id.to_string(),
            mean: profile.mean,
            std_dev: profile.std_dev,
            viewing_direction: ViewingDirection::default(),
            calibrated_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn profile(&self) -> CalibrationProfile {
        CalibrationProfile::new(self.mean, self.std_dev)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if !self.mean.is_finite() {
            return Err(StoreError::Validation("mean must be a finite number".to_string()));
        }
        if !self.std_dev.is_finite() || self.std_dev < 0.0 {
            return Err(StoreError::Validation(
                "stdDev must be a finite, non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

impl Store {
    pub fn get_posture_settings(&self, user_id: &str) -> Result<PostureSettings, StoreError> {
        let key = keys::posture_settings_key(user_id)?;
        match self.posture_settings.get(key.as_bytes())? {
            Some(raw) => Ok(Self::deserialize(&raw)?),
            None => Ok(PostureSettings::defaults_for(user_id)),
        }
    }

    pub fn put_posture_settings(&self, settings: &PostureSettings) -> Result<(), StoreError> {
        settings.validate()?;
        let key = keys::posture_settings_key(&settings.user_id)?;
        self.posture_settings
            .insert(key.as_bytes(), Self::serialize(settings)?)?;
        Ok(())
    }

    /// 校准成功后写入新档案，保留观察方向
    pub fn record_calibration(
        &self,
        user_id: &str,
        profile: CalibrationProfile,
    ) -> Result<PostureSettings, StoreError> {
        let now = Utc::now();
        let mut settings = self.get_posture_settings(user_id)?;
        settings.mean = profile.mean;
        settings.std_dev = profile.std_dev;
        settings.calibrated_at = Some(now);
        settings.updated_at = now;
        self.put_posture_settings(&settings)?;
        tracing::info!(user_id, mean = profile.mean, std_dev = profile.std_dev, "Calibration saved");
        Ok(settings)
    }
}
