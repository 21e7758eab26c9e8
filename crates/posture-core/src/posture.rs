//! 姿态状态机模块
//!
//! 根据角度与阈值得到“潜在状态”，再经过驻留防抖得到对外报告的状态：
//! - Good / NotDetected 立即生效
//! - TurtleNeck / ReclinedNeck 需持续达到驻留时长才确认，确认前报告为 Warning
//!
//! 潜在状态一旦改变，驻留计时重新开始。

use serde::{Deserialize, Serialize};

use crate::calibration::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostureState {
    #[default]
    Good,
    Warning,
    TurtleNeck,
    ReclinedNeck,
    NotDetected,
}

impl PostureState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::Warning => "WARNING",
            Self::TurtleNeck => "TURTLE_NECK",
            Self::ReclinedNeck => "RECLINED_NECK",
            Self::NotDetected => "NOT_DETECTED",
        }
    }

    /// 已确认的不良姿态
    pub fn is_bad(self) -> bool {
        matches!(self, Self::TurtleNeck | Self::ReclinedNeck)
    }

    /// 实时提示文案
    pub fn feedback(self) -> &'static str {
        match self {
            Self::Good => "Good posture, keep it up!",
            Self::Warning => "Your posture is starting to slip. Watch out!",
            Self::TurtleNeck => "Turtle neck detected. Pull your head back!",
            Self::ReclinedNeck => "Your neck is tilted too far back. Straighten up!",
            Self::NotDetected => "Analyzing posture...",
        }
    }
}

/// 不经防抖的角度分类
pub fn classify(angle: f64, thresholds: &Thresholds) -> PostureState {
    if angle > thresholds.upper {
        PostureState::TurtleNeck
    } else if angle < thresholds.lower {
        PostureState::ReclinedNeck
    } else {
        PostureState::Good
    }
}

#[derive(Debug, Clone)]
pub struct PostureStateMachine {
    dwell_ms: u64,
    current: PostureState,
    potential: Option<PostureState>,
    potential_since_ms: u64,
}

impl PostureStateMachine {
    pub fn new(dwell_ms: u64) -> Self {
        Self {
            dwell_ms,
            current: PostureState::Good,
            potential: None,
            potential_since_ms: 0,
        }
    }

    pub fn state(&self) -> PostureState {
        self.current
    }

    pub fn dwell_ms(&self) -> u64 {
        self.dwell_ms
    }

    pub fn reset(&mut self) {
        self.current = PostureState::Good;
        self.potential = None;
        self.potential_since_ms = 0;
    }

    /// `angle` 为 None 表示本帧未检测到关键点
    pub fn update(&mut self, angle: Option<f64>, thresholds: &Thresholds, now_ms: u64) -> PostureState {
        let potential = match angle {
            Some(angle) => classify(angle, thresholds),
            None => PostureState::NotDetected,
        };

        if self.potential != Some(potential) {
            self.potential = Some(potential);
            self.potential_since_ms = now_ms;
        }

        let next = if potential.is_bad() {
            if now_ms.saturating_sub(self.potential_since_ms) >= self.dwell_ms {
                potential
            } else {
                PostureState::Warning
            }
        } else {
            potential
        };

        if next != self.current {
            tracing::debug!(from = self.current.as_str(), to = next.as_str(), now_ms, "posture transition");
            self.current = next;
        }
        self.current
    }
}
