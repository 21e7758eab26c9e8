//! 会话诊断模块
//!
//! 对一次测量的汇总结果按固定顺序逐条匹配规则，命中第一条即返回：
//! 1. 慢性乌龟颈  2. 后半程下滑  3. 姿态不稳  4. 过度后仰
//! 5. 临界姿态    6. 姿态僵硬    7. 良好（兜底）
//!
//! 样本不足时直接返回“数据不足”。每条规则输出一段模板化文案，
//! 其中插入了计算出的统计量。

use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationProfile, Thresholds};
use crate::summary::SessionSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagnosisConfig {
    pub min_samples: usize,
    /// 超过上阈值的样本占比
    pub chronic_fraction: f64,
    /// 后半程均值比前半程高出的角度
    pub decline_delta_deg: f64,
    pub unstable_breaks_per_minute: f64,
    pub unstable_min_minutes: f64,
    /// 低于下阈值的样本占比
    pub recline_fraction: f64,
    /// 会话方差 / 校准方差
    pub rigid_variance_ratio: f64,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            chronic_fraction: 0.5,
            decline_delta_deg: 5.0,
            unstable_breaks_per_minute: 3.0,
            unstable_min_minutes: 1.0,
            recline_fraction: 0.3,
            rigid_variance_ratio: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosisKind {
    InsufficientData,
    ChronicTurtleNeck,
    LateSessionDecline,
    UnstablePosture,
    ExcessiveRecline,
    BorderlinePosture,
    RigidPosture,
    GoodPosture,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub kind: DiagnosisKind,
    pub message: String,
}

/// 诊断规则，按 `RULES` 中的顺序匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Chronic,
    LateDecline,
    Unstable,
    ExcessiveRecline,
    Borderline,
    Rigid,
    Good,
}

pub const RULES: [Rule; 7] = [
    Rule::Chronic,
    Rule::LateDecline,
    Rule::Unstable,
    Rule::ExcessiveRecline,
    Rule::Borderline,
    Rule::Rigid,
    Rule::Good,
];

/// 规则判定所需的会话统计量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStats {
    pub samples: usize,
    pub fraction_above: f64,
    pub fraction_below: f64,
    pub first_half_mean: f64,
    pub second_half_mean: f64,
    pub minutes: f64,
    pub breaks: u32,
    pub breaks_per_minute: f64,
    pub average: f64,
    pub variance: f64,
    pub calibration_std_dev: f64,
    pub upper: f64,
    pub lower: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl SessionStats {
    pub fn compute(summary: &SessionSummary, profile: &CalibrationProfile, thresholds: &Thresholds) -> Self {
        let angles: Vec<f64> = summary.angles().collect();
        let n = angles.len();
        let denom = n.max(1) as f64;

        let above = angles.iter().filter(|a| **a > thresholds.upper).count();
        let below = angles.iter().filter(|a| **a < thresholds.lower).count();
        let (first, second) = angles.split_at(n / 2);

        let average = mean(&angles);
        let variance = if n == 0 {
            0.0
        } else {
            angles.iter().map(|a| (a - average).powi(2)).sum::<f64>() / n as f64
        };

        let minutes = summary.duration_minutes();
        let breaks_per_minute = if minutes > 0.0 {
            summary.break_count as f64 / minutes
        } else {
            0.0
        };

        Self {
            samples: n,
            fraction_above: above as f64 / denom,
            fraction_below: below as f64 / denom,
            first_half_mean: mean(first),
            second_half_mean: mean(second),
            minutes,
            breaks: summary.break_count,
            breaks_per_minute,
            average,
            variance,
            calibration_std_dev: profile.std_dev,
            upper: thresholds.upper,
            lower: thresholds.lower,
        }
    }
}

impl Rule {
    pub fn kind(self) -> DiagnosisKind {
        match self {
            Self::Chronic => DiagnosisKind::ChronicTurtleNeck,
            Self::LateDecline => DiagnosisKind::LateSessionDecline,
            Self::Unstable => DiagnosisKind::UnstablePosture,
            Self::ExcessiveRecline => DiagnosisKind::ExcessiveRecline,
            Self::Borderline => DiagnosisKind::BorderlinePosture,
            Self::Rigid => DiagnosisKind::RigidPosture,
            Self::Good => DiagnosisKind::GoodPosture,
        }
    }

    pub fn matches(self, s: &SessionStats, cfg: &DiagnosisConfig) -> bool {
        match self {
            Self::Chronic => s.fraction_above > cfg.chronic_fraction,
            Self::LateDecline => s.second_half_mean - s.first_half_mean > cfg.decline_delta_deg,
            Self::Unstable => {
                s.minutes >= cfg.unstable_min_minutes
                    && s.breaks_per_minute > cfg.unstable_breaks_per_minute
            }
            Self::ExcessiveRecline => s.fraction_below > cfg.recline_fraction,
            Self::Borderline => s.average > s.upper,
            Self::Rigid => {
                let calibration_variance = s.calibration_std_dev * s.calibration_std_dev;
                s.calibration_std_dev > 0.0
                    && s.variance < cfg.rigid_variance_ratio * calibration_variance
            }
            Self::Good => true,
        }
    }

    pub fn message(self, s: &SessionStats) -> String {
        match self {
            Self::Chronic => format!(
                "- Diagnosis: chronic turtle neck\n- Advice: {:.0}% of the session was spent above your safe range (upper {:.1}°). \
                 Forward head posture has likely become a habit. Raise your monitor and practice tucking your chin.",
                s.fraction_above * 100.0,
                s.upper
            ),
            Self::LateDecline => format!(
                "- Diagnosis: late-session decline\n- Advice: your average angle rose from {:.1}° in the first half to {:.1}° in the second half. \
                 Fatigue may be wearing your posture down. Set a reminder to reset your posture every 20 minutes.",
                s.first_half_mean, s.second_half_mean
            ),
            Self::Unstable => format!(
                "- Diagnosis: unstable posture\n- Advice: your posture broke {} times in {:.1} minutes ({:.1} per minute). \
                 Core strengthening exercises will help you hold a stable position.",
                s.breaks, s.minutes, s.breaks_per_minute
            ),
            Self::ExcessiveRecline => format!(
                "- Diagnosis: excessive recline\n- Advice: {:.0}% of the session was spent below your safe range (lower {:.1}°). \
                 Avoid leaning your head back and keep your ears over your shoulders.",
                s.fraction_below * 100.0,
                s.lower
            ),
            Self::Borderline => format!(
                "- Diagnosis: borderline posture\n- Advice: your average angle of {:.1}° is above your safe range (upper {:.1}°). \
                 It is not severe yet, but it can develop into turtle neck. Make a habit of gently tucking your chin.",
                s.average, s.upper
            ),
            Self::Rigid => format!(
                "- Diagnosis: rigid posture\n- Advice: your neck barely moved this session (spread {:.1}° vs {:.1}° at calibration). \
                 Holding one position for long periods strains the neck. Take short stretching breaks.",
                s.variance.sqrt(),
                s.calibration_std_dev
            ),
            Self::Good => format!(
                "- Diagnosis: good posture\n- Advice: great work! You stayed within your safe range ({:.1}° to {:.1}°) with an average of {:.1}°. Keep it up!",
                s.lower, s.upper, s.average
            ),
        }
    }
}

pub fn diagnose(
    summary: &SessionSummary,
    profile: &CalibrationProfile,
    thresholds: &Thresholds,
    cfg: &DiagnosisConfig,
) -> Diagnosis {
    if summary.sample_count() < cfg.min_samples {
        return Diagnosis {
            kind: DiagnosisKind::InsufficientData,
            message: format!(
                "- Diagnosis: not enough data\n- Advice: only {} samples were recorded. Measure for at least a minute for a meaningful analysis.",
                summary.sample_count()
            ),
        };
    }

    let stats = SessionStats::compute(summary, profile, thresholds);
    let rule = RULES
        .iter()
        .copied()
        .find(|rule| rule.matches(&stats, cfg))
        .unwrap_or(Rule::Good);

    tracing::debug!(kind = ?rule.kind(), samples = stats.samples, "diagnosis selected");

    Diagnosis {
        kind: rule.kind(),
        message: rule.message(&stats),
    }
}
