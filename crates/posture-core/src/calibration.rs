//! 个人基线校准模块
//!
//! 校准流程：Idle → Preparing（倒计时）→ Collecting（采集角度）→ Computing → Idle。
//! 各阶段的截止时间在每帧到达（或显式 tick）时检查，不依赖后台定时器。
//! 计算时先排序，两端各裁掉一定比例的离群值，再求均值与总体标准差。
//! 失败时保留原有基线。

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

pub const DEFAULT_MEAN: f64 = 0.0;
pub const DEFAULT_STD_DEV: f64 = 7.5;

/// 个人“良好姿态”角度分布
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProfile {
    pub mean: f64,
    pub std_dev: f64,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            mean: DEFAULT_MEAN,
            std_dev: DEFAULT_STD_DEV,
        }
    }
}

impl CalibrationProfile {
    pub fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    pub fn thresholds(&self, width_factor: f64) -> Thresholds {
        let half_width = width_factor * self.std_dev;
        Thresholds {
            upper: self.mean + half_width,
            lower: self.mean - half_width,
        }
    }

    pub fn variance(&self) -> f64 {
        self.std_dev * self.std_dev
    }
}

/// 姿态判定阈值：高于 upper 为乌龟颈，低于 lower 为后仰
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub upper: f64,
    pub lower: f64,
}

/// 对采集到的角度做截尾统计
pub fn compute_profile(
    samples: &[f64],
    min_samples: usize,
    trim_fraction: f64,
) -> Result<CalibrationProfile, AnalysisError> {
    let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.len() < min_samples {
        return Err(AnalysisError::InsufficientCalibrationSamples {
            collected: sorted.len(),
            required: min_samples,
        });
    }

    sorted.sort_by(f64::total_cmp);
    let trim = (sorted.len() as f64 * trim_fraction).floor() as usize;
    if trim * 2 >= sorted.len() {
        return Err(AnalysisError::EmptyTrimmedSamples);
    }
    let kept = &sorted[trim..sorted.len() - trim];

    let n = kept.len() as f64;
    let mean = kept.iter().sum::<f64>() / n;
    let variance = kept.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    Ok(CalibrationProfile {
        mean,
        std_dev: variance.sqrt(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "phase")]
pub enum CalibrationPhase {
    Idle,
    Preparing { deadline_ms: u64 },
    Collecting { deadline_ms: u64 },
    Computing,
}

impl CalibrationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing { .. } => "preparing",
            Self::Collecting { .. } => "collecting",
            Self::Computing => "computing",
        }
    }
}

/// 一次校准结束的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum CalibrationOutcome {
    Completed {
        profile: CalibrationProfile,
        sample_count: usize,
    },
    Failed {
        reason: AnalysisError,
    },
}

#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    phase: CalibrationPhase,
    samples: Vec<f64>,
    prepare_ms: u64,
    collect_ms: u64,
    min_samples: usize,
    trim_fraction: f64,
}

impl CalibrationEngine {
    pub fn new(prepare_ms: u64, collect_ms: u64, min_samples: usize, trim_fraction: f64) -> Self {
        Self {
            phase: CalibrationPhase::Idle,
            samples: Vec::new(),
            prepare_ms,
            collect_ms,
            min_samples,
            trim_fraction,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != CalibrationPhase::Idle
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.phase, CalibrationPhase::Collecting { .. })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn start(&mut self, now_ms: u64) -> Result<(), AnalysisError> {
        if self.is_active() {
            return Err(AnalysisError::CalibrationInProgress);
        }
        self.samples.clear();
        self.phase = CalibrationPhase::Preparing {
            deadline_ms: now_ms.saturating_add(self.prepare_ms),
        };
        tracing::debug!(now_ms, "calibration: preparing");
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), AnalysisError> {
        if !self.is_active() {
            return Err(AnalysisError::NoActiveCalibration);
        }
        self.phase = CalibrationPhase::Idle;
        self.samples.clear();
        tracing::debug!("calibration: cancelled");
        Ok(())
    }

    /// 当前阶段剩余毫秒数，用于倒计时显示
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        match self.phase {
            CalibrationPhase::Preparing { deadline_ms } | CalibrationPhase::Collecting { deadline_ms } => {
                Some(deadline_ms.saturating_sub(now_ms))
            }
            _ => None,
        }
    }

    /// 推进阶段。采集期截止时立即计算并返回结果。
    pub fn tick(&mut self, now_ms: u64) -> Option<CalibrationOutcome> {
        if let CalibrationPhase::Preparing { deadline_ms } = self.phase {
            if now_ms >= deadline_ms {
                self.phase = CalibrationPhase::Collecting {
                    deadline_ms: deadline_ms.saturating_add(self.collect_ms),
                };
                tracing::debug!(now_ms, "calibration: collecting");
            }
        }

        if let CalibrationPhase::Collecting { deadline_ms } = self.phase {
            if now_ms >= deadline_ms {
                self.phase = CalibrationPhase::Computing;
                return Some(self.finish());
            }
        }

        None
    }

    /// 帧到达：先推进阶段，仍在采集期时记录角度（未检测到的帧不计入）
    pub fn record(&mut self, now_ms: u64, angle: Option<f64>) -> Option<CalibrationOutcome> {
        if let Some(outcome) = self.tick(now_ms) {
            return Some(outcome);
        }
        if let (CalibrationPhase::Collecting { .. }, Some(angle)) = (self.phase, angle) {
            self.samples.push(angle);
        }
        None
    }

    fn finish(&mut self) -> CalibrationOutcome {
        let samples = std::mem::take(&mut self.samples);
        let outcome = match compute_profile(&samples, self.min_samples, self.trim_fraction) {
            Ok(profile) => {
                tracing::info!(
                    mean = profile.mean,
                    std_dev = profile.std_dev,
                    samples = samples.len(),
                    "calibration: completed"
                );
                CalibrationOutcome::Completed {
                    profile,
                    sample_count: samples.len(),
                }
            }
            Err(reason) => {
                tracing::warn!(error = %reason, samples = samples.len(), "calibration: failed");
                CalibrationOutcome::Failed { reason }
            }
        };
        self.phase = CalibrationPhase::Idle;
        outcome
    }
}
