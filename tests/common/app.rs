use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use posture_backend::config::{AnalysisEnvConfig, Config, LiveConfig, WorkerConfig};
use posture_backend::routes::build_router;
use posture_backend::state::AppState;
use posture_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

/// 测试用短时校准窗口：准备 100ms、采集 1000ms、至少 5 个样本。
/// 关闭平滑，帧角度即时反映关键点。
pub fn fast_analysis() -> AnalysisEnvConfig {
    AnalysisEnvConfig {
        prepare_ms: 100,
        collect_ms: 1_000,
        min_calibration_samples: 5,
        ear_alpha: 1.0,
        torso_alpha: 1.0,
        ..AnalysisEnvConfig::default()
    }
}

pub async fn spawn_with(analysis: AnalysisEnvConfig) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("posture-test.sled");

    // 直接构造 Config，避免 set_var 造成多线程测试环境变量竞态
    let config = Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        jwt_secret: format!("integration-test-jwt-secret-{}", uuid::Uuid::new_v4()),
        jwt_expires_in_hours: 24,
        cors_origin: "http://localhost:5173".to_string(),
        worker: WorkerConfig { is_leader: false },
        live: LiveConfig {
            idle_timeout_secs: 600,
            max_sessions: 16,
        },
        analysis,
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_server() -> TestApp {
    spawn_with(fast_analysis()).await
}
