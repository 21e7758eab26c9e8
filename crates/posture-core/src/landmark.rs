//! 关键点与锚点选择模块
//!
//! 姿态模型每帧输出 33 个归一化关键点，本模块只关心耳、肩、髋三对。
//! 每对关键点按可见度选出一个锚点：两侧都清晰时取中点，否则取
//! 可见度更高且超过下限的一侧，都不满足则视为未检测到。

use serde::{Deserialize, Serialize};

pub const LEFT_EAR: usize = 7;
pub const RIGHT_EAR: usize = 8;
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;

/// 完整姿态模型输出的关键点数
pub const POSE_LANDMARK_COUNT: usize = 33;

/// 扁平输入中每个关键点占用的数值个数
pub const LANDMARK_STRIDE: usize = 4;

/// 帧内至少需要的关键点数（覆盖到髋部索引）
pub const MIN_FRAME_LANDMARKS: usize = RIGHT_HIP + 1;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn midpoint(&self, other: &Point3) -> Point3 {
        Point3 {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: (self.z + other.z) / 2.0,
        }
    }
}

/// 单个关键点：归一化坐标 + 可选可见度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64, visibility: Option<f64>) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
        }
    }

    pub fn point(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }

    /// 缺失可见度按 0 处理；坐标非有限值的点视为不可见
    pub fn confidence(&self) -> f64 {
        if !(self.x.is_finite() && self.y.is_finite() && self.z.is_finite()) {
            return 0.0;
        }
        match self.visibility {
            Some(v) if v.is_finite() => v,
            _ => 0.0,
        }
    }

    /// 解析扁平数组：每点 4 个数 (x, y, z, visibility)，visibility 为 NaN 表示缺失。
    /// 末尾不足 4 个数的部分被忽略。
    pub fn from_flat(values: &[f64]) -> Vec<Landmark> {
        values
            .chunks_exact(LANDMARK_STRIDE)
            .map(|c| {
                let visibility = if c[3].is_nan() { None } else { Some(c[3]) };
                Landmark::new(c[0], c[1], c[2], visibility)
            })
            .collect()
    }
}

/// 锚点选择的可见度阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorPolicy {
    /// 两侧均高于此值时取中点
    pub midpoint_visibility: f64,
    /// 单侧可用的最低可见度
    pub min_visibility: f64,
}

impl Default for AnchorPolicy {
    fn default() -> Self {
        Self {
            midpoint_visibility: 0.7,
            min_visibility: 0.2,
        }
    }
}

impl AnchorPolicy {
    pub fn select(&self, left: &Landmark, right: &Landmark) -> Option<Point3> {
        let (vl, vr) = (left.confidence(), right.confidence());
        if vl > self.midpoint_visibility && vr > self.midpoint_visibility {
            return Some(left.point().midpoint(&right.point()));
        }

        let (best, visibility) = if vl >= vr { (left, vl) } else { (right, vr) };
        if visibility > self.min_visibility {
            Some(best.point())
        } else {
            None
        }
    }
}

/// 一帧选出的三个锚点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchors {
    pub ear: Point3,
    pub shoulder: Point3,
    pub hip: Point3,
}

/// 从整帧关键点中选出耳、肩、髋锚点。关键点不足或任一锚点缺失时返回 None。
pub fn select_anchors(landmarks: &[Landmark], policy: &AnchorPolicy) -> Option<Anchors> {
    if landmarks.len() < MIN_FRAME_LANDMARKS {
        return None;
    }

    let ear = policy.select(&landmarks[LEFT_EAR], &landmarks[RIGHT_EAR])?;
    let shoulder = policy.select(&landmarks[LEFT_SHOULDER], &landmarks[RIGHT_SHOULDER])?;
    let hip = policy.select(&landmarks[LEFT_HIP], &landmarks[RIGHT_HIP])?;

    Some(Anchors { ear, shoulder, hip })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(x: f64, y: f64, v: f64) -> Landmark {
        Landmark::new(x, y, 0.0, Some(v))
    }

    #[test]
    fn both_visible_uses_midpoint() {
        let p = AnchorPolicy::default()
            .select(&lm(0.2, 0.4, 0.9), &lm(0.4, 0.6, 0.8))
            .unwrap();
        assert!((p.x - 0.3).abs() < 1e-12);
        assert!((p.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn picks_more_visible_side() {
        let p = AnchorPolicy::default()
            .select(&lm(0.2, 0.4, 0.3), &lm(0.4, 0.6, 0.9))
            .unwrap();
        assert_eq!(p.x, 0.4);
    }

    #[test]
    fn low_visibility_is_undetected() {
        assert!(AnchorPolicy::default()
            .select(&lm(0.2, 0.4, 0.1), &lm(0.4, 0.6, 0.15))
            .is_none());
    }

    #[test]
    fn missing_visibility_counts_as_zero() {
        let left = Landmark::new(0.2, 0.4, 0.0, None);
        let right = lm(0.4, 0.6, 0.5);
        assert_eq!(AnchorPolicy::default().select(&left, &right).unwrap().x, 0.4);
    }

    #[test]
    fn parses_flat_input() {
        let lms = Landmark::from_flat(&[0.1, 0.2, 0.3, 0.9, 0.4, 0.5, 0.6, f64::NAN, 1.0]);
        assert_eq!(lms.len(), 2);
        assert_eq!(lms[0].visibility, Some(0.9));
        assert_eq!(lms[1].visibility, None);
        assert_eq!(lms[1].y, 0.5);
    }

    #[test]
    fn non_finite_coordinates_are_not_visible() {
        let lms = Landmark::from_flat(&[f64::NAN, 0.2, 0.0, 0.99, 0.3, f64::INFINITY, 0.0, 0.99]);
        assert_eq!(lms[0].confidence(), 0.0);
        assert_eq!(lms[1].confidence(), 0.0);
        assert!(AnchorPolicy::default().select(&lms[0], &lms[1]).is_none());

        // 另一侧正常时退化为单侧
        let ok = lm(0.4, 0.5, 0.9);
        assert_eq!(AnchorPolicy::default().select(&lms[0], &ok).unwrap().x, 0.4);
    }

    #[test]
    fn short_frame_has_no_anchors() {
        let frame = vec![lm(0.5, 0.5, 1.0); MIN_FRAME_LANDMARKS - 1];
        assert!(select_anchors(&frame, &AnchorPolicy::default()).is_none());
    }
}
