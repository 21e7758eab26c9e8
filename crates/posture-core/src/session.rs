//! 分析会话模块
//!
//! `AnalysisSession` 持有一个用户的全部分析状态：平滑器、观察方向、
//! 校准基线与阈值、校准引擎、姿态状态机和进行中的测量。调用方显式
//! 创建并独占它（`&mut self`），不存在全局共享状态。

use serde::Serialize;

use crate::angle::{neck_angle, ViewingDirection};
use crate::calibration::{
    CalibrationEngine, CalibrationOutcome, CalibrationPhase, CalibrationProfile, Thresholds,
};
use crate::config::AnalysisConfig;
use crate::diagnosis::{diagnose, Diagnosis};
use crate::error::AnalysisError;
use crate::landmark::{select_anchors, Landmark};
use crate::posture::{PostureState, PostureStateMachine};
use crate::smoother::AnchorSmoothers;
use crate::summary::{PostureSample, SessionSummary};

/// 校准进度快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationStatus {
    pub phase: &'static str,
    pub remaining_ms: Option<u64>,
    pub samples: usize,
}

/// 单帧分析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnalysis {
    pub timestamp_ms: u64,
    pub state: PostureState,
    pub angle: Option<f64>,
    pub thresholds: Thresholds,
    pub feedback: &'static str,
    pub measuring: bool,
    pub calibration: CalibrationStatus,
    /// 本帧恰好结束了一次校准时给出结果
    pub calibration_outcome: Option<CalibrationOutcome>,
}

#[derive(Debug, Clone)]
struct Measurement {
    started_at_ms: u64,
    samples: Vec<PostureSample>,
}

#[derive(Debug, Clone)]
pub struct AnalysisSession {
    config: AnalysisConfig,
    direction: ViewingDirection,
    profile: CalibrationProfile,
    thresholds: Thresholds,
    smoothers: AnchorSmoothers,
    calibration: CalibrationEngine,
    machine: PostureStateMachine,
    measurement: Option<Measurement>,
    last_frame_ms: Option<u64>,
}

impl AnalysisSession {
    pub fn new(config: AnalysisConfig, profile: CalibrationProfile, direction: ViewingDirection) -> Self {
        let config = config.sanitized();
        Self {
            smoothers: AnchorSmoothers::new(config.ear_alpha, config.torso_alpha),
            calibration: CalibrationEngine::new(
                config.prepare_ms,
                config.collect_ms,
                config.min_calibration_samples,
                config.trim_fraction,
            ),
            machine: PostureStateMachine::new(config.dwell_ms),
            thresholds: profile.thresholds(config.width_factor),
            profile,
            direction,
            config,
            measurement: None,
            last_frame_ms: None,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn profile(&self) -> CalibrationProfile {
        self.profile
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn direction(&self) -> ViewingDirection {
        self.direction
    }

    pub fn state(&self) -> PostureState {
        self.machine.state()
    }

    pub fn is_measuring(&self) -> bool {
        self.measurement.is_some()
    }

    pub fn last_frame_ms(&self) -> Option<u64> {
        self.last_frame_ms
    }

    pub fn calibration_phase(&self) -> CalibrationPhase {
        self.calibration.phase()
    }

    pub fn calibration_status(&self, now_ms: u64) -> CalibrationStatus {
        CalibrationStatus {
            phase: self.calibration.phase().as_str(),
            remaining_ms: self.calibration.remaining_ms(now_ms),
            samples: self.calibration.sample_count(),
        }
    }

    pub fn measurement_sample_count(&self) -> usize {
        self.measurement.as_ref().map_or(0, |m| m.samples.len())
    }

    /// 测量进行中不能切换方向，否则记录中的角度符号前后不一致
    pub fn set_viewing_direction(&mut self, direction: ViewingDirection) -> Result<(), AnalysisError> {
        if self.measurement.is_some() {
            return Err(AnalysisError::MeasurementInProgress);
        }
        self.direction = direction;
        Ok(())
    }

    /// 替换基线并重新推导阈值。测量进行中拒绝，保证一次测量只对应一组阈值。
    pub fn apply_profile(&mut self, profile: CalibrationProfile) -> Result<(), AnalysisError> {
        if self.measurement.is_some() {
            return Err(AnalysisError::MeasurementInProgress);
        }
        self.set_profile(profile);
        Ok(())
    }

    fn set_profile(&mut self, profile: CalibrationProfile) {
        self.profile = profile;
        self.thresholds = profile.thresholds(self.config.width_factor);
    }

    pub fn start_calibration(&mut self, now_ms: u64) -> Result<(), AnalysisError> {
        if self.measurement.is_some() {
            return Err(AnalysisError::MeasurementInProgress);
        }
        self.calibration.start(now_ms)?;
        self.smoothers.reset();
        Ok(())
    }

    pub fn cancel_calibration(&mut self) -> Result<(), AnalysisError> {
        self.calibration.cancel()
    }

    /// 无帧到达时推进校准倒计时
    pub fn tick(&mut self, now_ms: u64) -> Option<CalibrationOutcome> {
        let outcome = self.calibration.tick(now_ms)?;
        self.handle_outcome(&outcome);
        Some(outcome)
    }

    pub fn start_measurement(&mut self, now_ms: u64) -> Result<(), AnalysisError> {
        if self.calibration.is_active() {
            return Err(AnalysisError::CalibrationInProgress);
        }
        if self.measurement.is_some() {
            return Err(AnalysisError::MeasurementInProgress);
        }
        self.smoothers.reset();
        self.machine.reset();
        self.measurement = Some(Measurement {
            started_at_ms: now_ms,
            samples: Vec::new(),
        });
        tracing::debug!(now_ms, "measurement started");
        Ok(())
    }

    pub fn stop_measurement(&mut self, now_ms: u64) -> Result<SessionSummary, AnalysisError> {
        let measurement = self.measurement.take().ok_or(AnalysisError::NoActiveMeasurement)?;
        let duration = now_ms.saturating_sub(measurement.started_at_ms);
        let summary = SessionSummary::from_samples(&measurement.samples, duration);
        tracing::debug!(
            duration_ms = duration,
            samples = measurement.samples.len(),
            breaks = summary.break_count,
            "measurement stopped"
        );
        Ok(summary)
    }

    pub fn discard_measurement(&mut self) -> Result<(), AnalysisError> {
        self.measurement
            .take()
            .map(|_| ())
            .ok_or(AnalysisError::NoActiveMeasurement)
    }

    pub fn diagnose(&self, summary: &SessionSummary) -> Diagnosis {
        diagnose(summary, &self.profile, &self.thresholds, &self.config.diagnosis)
    }

    pub fn process_frame(&mut self, landmarks: &[Landmark], now_ms: u64) -> FrameAnalysis {
        let angle = select_anchors(landmarks, &self.config.anchor_policy)
            .map(|anchors| {
                let smoothed = self.smoothers.apply(&anchors);
                neck_angle(&smoothed, self.direction)
            })
            .filter(|angle| angle.is_finite());

        let outcome = self.calibration.record(now_ms, angle);
        if let Some(outcome) = &outcome {
            self.handle_outcome(outcome);
        }

        // 测量期间早于开始时间的帧按开始时间计，状态机与样本使用同一时间轴
        let clock_ms = match &self.measurement {
            Some(measurement) => now_ms.max(measurement.started_at_ms),
            None => now_ms,
        };
        let state = self.machine.update(angle, &self.thresholds, clock_ms);

        if let Some(measurement) = self.measurement.as_mut() {
            measurement.samples.push(PostureSample {
                elapsed_ms: clock_ms - measurement.started_at_ms,
                angle,
                state,
            });
        }
        self.last_frame_ms = Some(now_ms);

        FrameAnalysis {
            timestamp_ms: now_ms,
            state,
            angle,
            thresholds: self.thresholds,
            feedback: state.feedback(),
            measuring: self.measurement.is_some(),
            calibration: self.calibration_status(now_ms),
            calibration_outcome: outcome,
        }
    }

    fn handle_outcome(&mut self, outcome: &CalibrationOutcome) {
        if let CalibrationOutcome::Completed { profile, .. } = outcome {
            self.set_profile(*profile);
            self.smoothers.reset();
            self.machine.reset();
        }
    }
}
