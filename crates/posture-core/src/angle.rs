//! 颈部角度计算模块
//!
//! 躯干向量为髋→肩，颈部向量为肩→耳（只取图像平面 x/y）。
//! 角度 = atan2(颈部) - atan2(躯干)，归一化到 (-180°, 180°]。
//! 头部沿面朝方向前伸时角度为正；从右侧拍摄时需要翻转符号。

use serde::{Deserialize, Serialize};

use crate::landmark::{Anchors, Point3};

const DEGENERATE_EPSILON: f64 = 1e-12;

/// 摄像头拍摄的是用户哪一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewingDirection {
    Left,
    #[default]
    Right,
}

impl ViewingDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// 把任意角度（度）归一化到 (-180, 180]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees % 360.0;
    if wrapped > 180.0 {
        wrapped - 360.0
    } else if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// 两个 2D 向量之间的有符号夹角（度）。任一向量长度为 0 时返回 0。
pub fn signed_angle(from: (f64, f64), to: (f64, f64)) -> f64 {
    let from_len = from.0 * from.0 + from.1 * from.1;
    let to_len = to.0 * to.0 + to.1 * to.1;
    if from_len < DEGENERATE_EPSILON || to_len < DEGENERATE_EPSILON {
        return 0.0;
    }

    let diff = to.1.atan2(to.0) - from.1.atan2(from.0);
    normalize_degrees(diff.to_degrees())
}

pub fn neck_angle_from_points(
    ear: &Point3,
    shoulder: &Point3,
    hip: &Point3,
    direction: ViewingDirection,
) -> f64 {
    let torso = (shoulder.x - hip.x, shoulder.y - hip.y);
    let neck = (ear.x - shoulder.x, ear.y - shoulder.y);
    let angle = signed_angle(torso, neck);
    match direction {
        ViewingDirection::Left => angle,
        // -180 取反后落在区间外，需要再归一化一次
        ViewingDirection::Right => normalize_degrees(-angle),
    }
}

pub fn neck_angle(anchors: &Anchors, direction: ViewingDirection) -> f64 {
    neck_angle_from_points(&anchors.ear, &anchors.shoulder, &anchors.hip, direction)
}
