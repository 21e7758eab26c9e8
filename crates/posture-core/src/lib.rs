//! 颈部姿态分析核心库
//!
//! 基于姿态估计模型输出的身体关键点（MediaPipe Pose 33 点索引）实时计算
//! 颈部角度，并结合个人校准基线判断姿态质量。可作为普通 Rust 库被服务端
//! 调用，也可在启用 `wasm` feature 后编译为 WebAssembly 在浏览器端运行。
//!
//! ## 模块
//! - `landmark`: 关键点与锚点选择
//! - `smoother`: 关键点指数移动平均平滑
//! - `angle`: 颈部角度计算
//! - `calibration`: 个人基线校准
//! - `posture`: 带驻留防抖的姿态状态机
//! - `summary`: 测量会话汇总
//! - `diagnosis`: 基于规则的会话诊断
//! - `session`: 单用户分析会话（组合以上组件）

pub mod angle;
pub mod calibration;
pub mod config;
pub mod diagnosis;
pub mod error;
pub mod landmark;
pub mod posture;
pub mod session;
pub mod smoother;
pub mod summary;

#[cfg(feature = "wasm")]
pub mod wasm;

// 重新导出核心类型，方便外部使用
pub use angle::{neck_angle, ViewingDirection};
pub use calibration::{
    CalibrationEngine, CalibrationOutcome, CalibrationPhase, CalibrationProfile, Thresholds,
};
pub use config::AnalysisConfig;
pub use diagnosis::{diagnose, Diagnosis, DiagnosisConfig, DiagnosisKind};
pub use error::AnalysisError;
pub use landmark::{Anchors, AnchorPolicy, Landmark, Point3};
pub use posture::{PostureState, PostureStateMachine};
pub use session::{AnalysisSession, CalibrationStatus, FrameAnalysis};
pub use smoother::{AnchorSmoothers, LandmarkSmoother};
pub use summary::{replay, PostureSample, SessionSummary};
