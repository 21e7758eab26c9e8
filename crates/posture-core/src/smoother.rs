//! 关键点平滑模块
//!
//! 对每个锚点做指数移动平均：`blended = α·new + (1-α)·previous`。
//! 耳部动作快，使用较大的 α；肩、髋基本静止，使用很小的 α 抑制抖动。

use crate::landmark::{Anchors, Point3};

/// 单点 EMA 平滑器
#[derive(Debug, Clone)]
pub struct LandmarkSmoother {
    alpha: f64,
    previous: Option<Point3>,
}

impl LandmarkSmoother {
    /// α 会被限制在 (0, 1]，非法值按 1.0（不平滑）处理
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() && alpha > 0.0 {
            alpha.min(1.0)
        } else {
            1.0
        };
        Self {
            alpha,
            previous: None,
        }
    }

    pub fn apply(&mut self, point: Point3) -> Point3 {
        let blended = match self.previous {
            None => point,
            Some(prev) => Point3 {
                x: self.alpha * point.x + (1.0 - self.alpha) * prev.x,
                y: self.alpha * point.y + (1.0 - self.alpha) * prev.y,
                z: self.alpha * point.z + (1.0 - self.alpha) * prev.z,
            },
        };
        self.previous = Some(blended);
        blended
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn is_primed(&self) -> bool {
        self.previous.is_some()
    }
}

/// 耳、肩、髋三个锚点的平滑器组
#[derive(Debug, Clone)]
pub struct AnchorSmoothers {
    ear: LandmarkSmoother,
    shoulder: LandmarkSmoother,
    hip: LandmarkSmoother,
}

impl AnchorSmoothers {
    pub fn new(ear_alpha: f64, torso_alpha: f64) -> Self {
        Self {
            ear: LandmarkSmoother::new(ear_alpha),
            shoulder: LandmarkSmoother::new(torso_alpha),
            hip: LandmarkSmoother::new(torso_alpha),
        }
    }

    pub fn apply(&mut self, anchors: &Anchors) -> Anchors {
        Anchors {
            ear: self.ear.apply(anchors.ear),
            shoulder: self.shoulder.apply(anchors.shoulder),
            hip: self.hip.apply(anchors.hip),
        }
    }

    pub fn reset(&mut self) {
        self.ear.reset();
        self.shoulder.reset();
        self.hip.reset();
    }

    pub fn is_primed(&self) -> bool {
        self.ear.is_primed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_point_passes_through() {
        let mut s = LandmarkSmoother::new(0.05);
        let p = Point3::new(0.3, 0.7, -0.1);
        assert_eq!(s.apply(p), p);
    }

    #[test]
    fn blends_with_previous() {
        let mut s = LandmarkSmoother::new(0.4);
        s.apply(Point3::new(0.0, 0.0, 0.0));
        let out = s.apply(Point3::new(1.0, 1.0, 1.0));
        assert!((out.x - 0.4).abs() < 1e-12);
        let out = s.apply(Point3::new(1.0, 1.0, 1.0));
        assert!((out.x - 0.64).abs() < 1e-12);
    }

    #[test]
    fn reset_forgets_history() {
        let mut s = LandmarkSmoother::new(0.05);
        s.apply(Point3::new(0.0, 0.0, 0.0));
        s.reset();
        assert!(!s.is_primed());
        let p = Point3::new(0.9, 0.9, 0.9);
        assert_eq!(s.apply(p), p);
    }

    #[test]
    fn invalid_alpha_disables_smoothing() {
        assert_eq!(LandmarkSmoother::new(0.0).alpha(), 1.0);
        assert_eq!(LandmarkSmoother::new(f64::NAN).alpha(), 1.0);
        assert_eq!(LandmarkSmoother::new(3.0).alpha(), 1.0);
    }
}
