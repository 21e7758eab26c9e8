use serde::{Deserialize, Serialize};

use crate::diagnosis::DiagnosisConfig;
use crate::landmark::AnchorPolicy;

pub const DEFAULT_EAR_ALPHA: f64 = 0.4;
pub const DEFAULT_TORSO_ALPHA: f64 = 0.05;
pub const DEFAULT_WIDTH_FACTOR: f64 = 2.5;
pub const DEFAULT_DWELL_MS: u64 = 3_000;
pub const DEFAULT_PREPARE_MS: u64 = 5_000;
pub const DEFAULT_COLLECT_MS: u64 = 5_000;
pub const DEFAULT_MIN_CALIBRATION_SAMPLES: usize = 20;
pub const DEFAULT_TRIM_FRACTION: f64 = 0.2;

/// 分析会话的全部可调参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub ear_alpha: f64,
    pub torso_alpha: f64,
    pub anchor_policy: AnchorPolicy,
    /// 阈值宽度系数 k：threshold = mean ± k·stddev
    pub width_factor: f64,
    pub dwell_ms: u64,
    pub prepare_ms: u64,
    pub collect_ms: u64,
    pub min_calibration_samples: usize,
    /// 每侧裁掉的比例
    pub trim_fraction: f64,
    pub diagnosis: DiagnosisConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ear_alpha: DEFAULT_EAR_ALPHA,
            torso_alpha: DEFAULT_TORSO_ALPHA,
            anchor_policy: AnchorPolicy::default(),
            width_factor: DEFAULT_WIDTH_FACTOR,
            dwell_ms: DEFAULT_DWELL_MS,
            prepare_ms: DEFAULT_PREPARE_MS,
            collect_ms: DEFAULT_COLLECT_MS,
            min_calibration_samples: DEFAULT_MIN_CALIBRATION_SAMPLES,
            trim_fraction: DEFAULT_TRIM_FRACTION,
            diagnosis: DiagnosisConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// 修正越界参数，返回可安全使用的配置
    pub fn sanitized(mut self) -> Self {
        if !self.width_factor.is_finite() || self.width_factor < 0.0 {
            tracing::warn!(width_factor = self.width_factor, "Invalid width factor, using default");
            self.width_factor = DEFAULT_WIDTH_FACTOR;
        }
        if !self.trim_fraction.is_finite() || !(0.0..0.5).contains(&self.trim_fraction) {
            tracing::warn!(trim_fraction = self.trim_fraction, "Invalid trim fraction, using default");
            self.trim_fraction = DEFAULT_TRIM_FRACTION;
        }
        self.min_calibration_samples = self.min_calibration_samples.max(1);
        self
    }
}
