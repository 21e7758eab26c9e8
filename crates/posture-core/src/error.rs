use serde::Serialize;
use thiserror::Error;

/// 分析核心的可恢复错误，均不致命
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AnalysisError {
    #[error("insufficient calibration samples: collected {collected}, required {required}")]
    InsufficientCalibrationSamples { collected: usize, required: usize },
    #[error("no samples left after trimming outliers")]
    EmptyTrimmedSamples,
    #[error("required landmarks not detected")]
    NoLandmarksDetected,
    #[error("calibration already in progress")]
    CalibrationInProgress,
    #[error("no calibration in progress")]
    NoActiveCalibration,
    #[error("measurement already in progress")]
    MeasurementInProgress,
    #[error("no active measurement")]
    NoActiveMeasurement,
}

impl AnalysisError {
    /// 对外暴露的稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientCalibrationSamples { .. } => "CALIBRATION_INSUFFICIENT_SAMPLES",
            Self::EmptyTrimmedSamples => "CALIBRATION_EMPTY_AFTER_TRIM",
            Self::NoLandmarksDetected => "LANDMARKS_NOT_DETECTED",
            Self::CalibrationInProgress => "CALIBRATION_IN_PROGRESS",
            Self::NoActiveCalibration => "CALIBRATION_NOT_ACTIVE",
            Self::MeasurementInProgress => "MEASUREMENT_IN_PROGRESS",
            Self::NoActiveMeasurement => "MEASUREMENT_NOT_ACTIVE",
        }
    }
}
