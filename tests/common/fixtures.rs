use serde_json::{json, Value};

use posture_core::landmark::{
    LEFT_EAR, LEFT_HIP, LEFT_SHOULDER, POSE_LANDMARK_COUNT, RIGHT_EAR, RIGHT_HIP, RIGHT_SHOULDER,
};

/// 右侧视角下（用户面向 -x）的一帧关键点 JSON。
///
/// 肩在 (0.5, 0.5)，髋在 (0.5, 0.8)，耳在肩正上方 0.2 处再向前偏移
/// `forward`。`forward = 0` 时颈部角度为 0，越大越前倾。
pub fn side_view_frame(forward: f64) -> Vec<Value> {
    let mut landmarks = vec![json!({ "x": 0.0, "y": 0.0, "z": 0.0, "visibility": 0.0 }); POSE_LANDMARK_COUNT];
    let mut put = |idx: usize, x: f64, y: f64| {
        landmarks[idx] = json!({ "x": x, "y": y, "z": 0.0, "visibility": 0.95 });
    };
    put(LEFT_EAR, 0.5 - forward, 0.3);
    put(RIGHT_EAR, 0.5 - forward, 0.3);
    put(LEFT_SHOULDER, 0.5, 0.5);
    put(RIGHT_SHOULDER, 0.5, 0.5);
    put(LEFT_HIP, 0.5, 0.8);
    put(RIGHT_HIP, 0.5, 0.8);
    landmarks
}

/// 关键点全部不可见的一帧
pub fn empty_frame() -> Vec<Value> {
    vec![json!({ "x": 0.0, "y": 0.0, "visibility": 0.0 }); POSE_LANDMARK_COUNT]
}

pub fn frame_body(timestamp_ms: u64, landmarks: Vec<Value>) -> Value {
    json!({ "timestampMs": timestamp_ms, "landmarks": landmarks })
}

pub fn timestamp_body(timestamp_ms: u64) -> Value {
    json!({ "timestampMs": timestamp_ms })
}

/// 客户端本地测量的逐帧角度，`None` 表示该帧未检测到
pub fn samples(entries: &[(u64, Option<f64>)]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|(elapsed_ms, angle)| json!({ "elapsedMs": elapsed_ms, "angle": angle }))
            .collect(),
    )
}
