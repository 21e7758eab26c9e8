//! 测量会话汇总模块
//!
//! 把逐帧采样聚合为一次测量的统计结果：各状态计数、不良姿态累计时长、
//! 姿态破坏次数、平均角度以及 (elapsed_ms, angle) 角度序列。
//!
//! 角度序列保留每一帧，未检测到的帧记为 `None`。未检测帧会重置驻留计时，
//! 回放时必须看到它们才能复现实时判定。

use serde::{Deserialize, Serialize};

use crate::calibration::Thresholds;
use crate::posture::{PostureState, PostureStateMachine};

/// 一帧的采样结果，`elapsed_ms` 相对测量开始时间
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureSample {
    pub elapsed_ms: u64,
    pub angle: Option<f64>,
    pub state: PostureState,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub good_count: u32,
    pub warning_count: u32,
    pub bad_count: u32,
    pub not_detected_count: u32,
    pub total_duration_ms: u64,
    pub break_count: u32,
    pub bad_posture_time_ms: u64,
    pub average_angle: f64,
    pub angle_series: Vec<(u64, Option<f64>)>,
}

impl SessionSummary {
    /// 样本需按 `elapsed_ms` 升序排列
    pub fn from_samples(samples: &[PostureSample], total_duration_ms: u64) -> Self {
        let mut summary = SessionSummary {
            total_duration_ms,
            ..SessionSummary::default()
        };

        // 最近一次“稳定”状态（忽略 Warning 与 NotDetected），用于判定姿态破坏
        let mut settled: Option<PostureState> = None;
        let mut previous_ms: Option<u64> = None;

        for sample in samples {
            match sample.state {
                PostureState::Good => summary.good_count += 1,
                PostureState::Warning => summary.warning_count += 1,
                PostureState::TurtleNeck | PostureState::ReclinedNeck => summary.bad_count += 1,
                PostureState::NotDetected => summary.not_detected_count += 1,
            }

            if sample.state.is_bad() {
                if let Some(prev) = previous_ms {
                    summary.bad_posture_time_ms += sample.elapsed_ms.saturating_sub(prev);
                }
                if settled == Some(PostureState::Good) {
                    summary.break_count += 1;
                }
            }

            if matches!(
                sample.state,
                PostureState::Good | PostureState::TurtleNeck | PostureState::ReclinedNeck
            ) {
                settled = Some(sample.state);
            }

            summary.angle_series.push((sample.elapsed_ms, sample.angle));
            previous_ms = Some(sample.elapsed_ms);
        }

        let detected = summary.sample_count();
        if detected > 0 {
            summary.average_angle = summary.angles().sum::<f64>() / detected as f64;
        }

        summary
    }

    /// 检测到角度的帧数
    pub fn sample_count(&self) -> usize {
        self.angles().count()
    }

    pub fn duration_minutes(&self) -> f64 {
        self.total_duration_ms as f64 / 60_000.0
    }

    pub fn angles(&self) -> impl Iterator<Item = f64> + '_ {
        self.angle_series.iter().filter_map(|(_, a)| *a)
    }
}

/// 用给定阈值重新回放角度序列，得到逐帧状态。`None` 按未检测处理。
pub fn replay(
    series: &[(u64, Option<f64>)],
    thresholds: &Thresholds,
    dwell_ms: u64,
) -> Vec<PostureSample> {
    let mut machine = PostureStateMachine::new(dwell_ms);
    series
        .iter()
        .map(|&(elapsed_ms, angle)| PostureSample {
            elapsed_ms,
            angle,
            state: machine.update(angle, thresholds, elapsed_ms),
        })
        .collect()
}
