use proptest::prelude::*;

use posture_core::angle::{neck_angle_from_points, normalize_degrees};
use posture_core::calibration::compute_profile;
use posture_core::{
    CalibrationProfile, LandmarkSmoother, Point3, PostureState, PostureStateMachine, Thresholds,
    ViewingDirection,
};

fn rotate(p: &Point3, origin: &Point3, radians: f64) -> Point3 {
    let (s, c) = radians.sin_cos();
    let dx = p.x - origin.x;
    let dy = p.y - origin.y;
    Point3::new(origin.x + dx * c - dy * s, origin.y + dx * s + dy * c, p.z)
}

fn angle_gap(a: f64, b: f64) -> f64 {
    normalize_degrees(a - b).abs()
}

proptest! {
    #[test]
    fn pt_smoother_converges_to_constant_input(
        alpha in 0.05_f64..1.0,
        start in -1.0_f64..1.0,
        target in -1.0_f64..1.0,
    ) {
        let mut smoother = LandmarkSmoother::new(alpha);
        smoother.apply(Point3::new(start, start, 0.0));
        let mut last = Point3::new(start, start, 0.0);
        for _ in 0..600 {
            last = smoother.apply(Point3::new(target, target, 0.0));
        }
        prop_assert!((last.x - target).abs() < 1e-6);
        prop_assert!((last.y - target).abs() < 1e-6);
    }

    #[test]
    fn pt_neck_angle_is_rotation_invariant(
        ear_dx in -0.3_f64..0.3,
        ear_dy in -0.4_f64..-0.05,
        torso in 0.1_f64..0.5,
        theta in -3.0_f64..3.0,
    ) {
        let shoulder = Point3::new(0.5, 0.5, 0.0);
        let hip = Point3::new(0.5, 0.5 + torso, 0.0);
        let ear = Point3::new(0.5 + ear_dx, 0.5 + ear_dy, 0.0);

        for direction in [ViewingDirection::Left, ViewingDirection::Right] {
            let base = neck_angle_from_points(&ear, &shoulder, &hip, direction);
            let turned = neck_angle_from_points(
                &rotate(&ear, &shoulder, theta),
                &shoulder,
                &rotate(&hip, &shoulder, theta),
                direction,
            );
            prop_assert!(angle_gap(base, turned) < 1e-6);
        }
    }

    #[test]
    fn pt_viewing_direction_flips_sign(
        ear_dx in -0.3_f64..0.3,
        ear_dy in -0.4_f64..-0.05,
    ) {
        let shoulder = Point3::new(0.5, 0.5, 0.0);
        let hip = Point3::new(0.5, 0.8, 0.0);
        let ear = Point3::new(0.5 + ear_dx, 0.5 + ear_dy, 0.0);
        let left = neck_angle_from_points(&ear, &shoulder, &hip, ViewingDirection::Left);
        let right = neck_angle_from_points(&ear, &shoulder, &hip, ViewingDirection::Right);
        prop_assert!(angle_gap(left, -right) < 1e-9);
    }

    #[test]
    fn pt_constant_calibration_has_zero_spread(value in -60.0_f64..60.0, n in 5_usize..200) {
        let profile = compute_profile(&vec![value; n], 5, 0.2).unwrap();
        prop_assert!((profile.mean - value).abs() < 1e-9);
        prop_assert!(profile.std_dev.abs() < 1e-9);
    }

    #[test]
    fn pt_thresholds_bracket_mean(mean in -45.0_f64..45.0, std_dev in 0.0_f64..20.0, k in 0.0_f64..5.0) {
        let t = CalibrationProfile::new(mean, std_dev).thresholds(k);
        prop_assert!(t.lower <= mean && mean <= t.upper);
        prop_assert!((t.upper - t.lower - 2.0 * k * std_dev).abs() < 1e-9);
    }

    #[test]
    fn pt_bad_state_never_confirmed_before_dwell(
        dwell_ms in 1_u64..10_000,
        step_ms in 1_u64..1_000,
        frames in 1_usize..60,
    ) {
        let thresholds = Thresholds { upper: 10.0, lower: -10.0 };
        let mut machine = PostureStateMachine::new(dwell_ms);
        machine.update(Some(0.0), &thresholds, 0);

        let start = 1_000;
        for i in 0..frames {
            let now = start + i as u64 * step_ms;
            let state = machine.update(Some(30.0), &thresholds, now);
            if now - start < dwell_ms {
                prop_assert_eq!(state, PostureState::Warning);
            } else {
                prop_assert_eq!(state, PostureState::TurtleNeck);
            }
        }
    }
}
