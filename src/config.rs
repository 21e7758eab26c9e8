use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use std::fmt;

use posture_core::config::{
    DEFAULT_COLLECT_MS, DEFAULT_DWELL_MS, DEFAULT_EAR_ALPHA, DEFAULT_MIN_CALIBRATION_SAMPLES,
    DEFAULT_PREPARE_MS, DEFAULT_TORSO_ALPHA, DEFAULT_TRIM_FRACTION, DEFAULT_WIDTH_FACTOR,
};
use posture_core::AnalysisConfig;

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub jwt_secret: String,
    pub jwt_expires_in_hours: u64,
    pub cors_origin: String,
    pub worker: WorkerConfig,
    pub live: LiveConfig,
    pub analysis: AnalysisEnvConfig,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
}

#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// 实时会话无帧多久后被回收
    pub idle_timeout_secs: u64,
    pub max_sessions: usize,
}

/// 姿态分析的可调参数，最终转换为 `posture_core::AnalysisConfig`
#[derive(Debug, Clone)]
pub struct AnalysisEnvConfig {
    pub width_factor: f64,
    pub dwell_ms: u64,
    pub prepare_ms: u64,
    pub collect_ms: u64,
    pub min_calibration_samples: usize,
    pub trim_fraction: f64,
    pub ear_alpha: f64,
    pub torso_alpha: f64,
}

impl Default for AnalysisEnvConfig {
    fn default() -> Self {
        Self {
            width_factor: DEFAULT_WIDTH_FACTOR,
            dwell_ms: DEFAULT_DWELL_MS,
            prepare_ms: DEFAULT_PREPARE_MS,
            collect_ms: DEFAULT_COLLECT_MS,
            min_calibration_samples: DEFAULT_MIN_CALIBRATION_SAMPLES,
            trim_fraction: DEFAULT_TRIM_FRACTION,
            ear_alpha: DEFAULT_EAR_ALPHA,
            torso_alpha: DEFAULT_TORSO_ALPHA,
        }
    }
}

impl AnalysisEnvConfig {
    pub fn to_analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            ear_alpha: self.ear_alpha,
            torso_alpha: self.torso_alpha,
            width_factor: self.width_factor,
            dwell_ms: self.dwell_ms,
            prepare_ms: self.prepare_ms,
            collect_ms: self.collect_ms,
            min_calibration_samples: self.min_calibration_samples,
            trim_fraction: self.trim_fraction,
            ..AnalysisConfig::default()
        }
        .sanitized()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("jwt_secret", &"***REDACTED***")
            .field("jwt_expires_in_hours", &self.jwt_expires_in_hours)
            .field("cors_origin", &self.cors_origin)
            .field("worker", &self.worker)
            .field("live", &self.live)
            .field("analysis", &self.analysis)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/posture.sled"),
            jwt_secret: env_or(
                "JWT_SECRET",
                "change_me_to_random_64_chars_change_me_to_random_64_chars",
            ),
            jwt_expires_in_hours: env_or_parse("JWT_EXPIRES_IN_HOURS", 24_u64),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
            },
            live: LiveConfig {
                idle_timeout_secs: env_or_parse("LIVE_SESSION_IDLE_SECS", 600_u64),
                max_sessions: env_or_parse("LIVE_SESSION_MAX", 1_000_usize),
            },
            analysis: AnalysisEnvConfig {
                width_factor: env_or_parse("THRESHOLD_WIDTH_FACTOR", DEFAULT_WIDTH_FACTOR),
                dwell_ms: env_or_parse("POSTURE_DWELL_MS", DEFAULT_DWELL_MS),
                prepare_ms: env_or_parse("CALIBRATION_PREPARE_MS", DEFAULT_PREPARE_MS),
                collect_ms: env_or_parse("CALIBRATION_COLLECT_MS", DEFAULT_COLLECT_MS),
                min_calibration_samples: env_or_parse(
                    "CALIBRATION_MIN_SAMPLES",
                    DEFAULT_MIN_CALIBRATION_SAMPLES,
                ),
                trim_fraction: env_or_parse("CALIBRATION_TRIM_FRACTION", DEFAULT_TRIM_FRACTION),
                ear_alpha: env_or_parse("EAR_SMOOTHING_ALPHA", DEFAULT_EAR_ALPHA),
                torso_alpha: env_or_parse("TORSO_SMOOTHING_ALPHA", DEFAULT_TORSO_ALPHA),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn managed_keys() -> &'static [&'static str] {
        &[
            "HOST",
            "PORT",
            "RUST_LOG",
            "THRESHOLD_WIDTH_FACTOR",
            "POSTURE_DWELL_MS",
            "CALIBRATION_TRIM_FRACTION",
            "WORKER_LEADER",
        ]
    }

    fn clear_keys(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.analysis.width_factor, 2.5);
        assert_eq!(cfg.analysis.dwell_ms, 3_000);
        assert!(cfg.worker.is_leader);
    }

    #[test]
    fn parses_numeric_values() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "4000");
        env::set_var("THRESHOLD_WIDTH_FACTOR", "3.0");
        env::set_var("POSTURE_DWELL_MS", "1500");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.analysis.width_factor, 3.0);
        assert_eq!(cfg.analysis.to_analysis_config().dwell_ms, 1_500);
        clear_keys(managed_keys());
    }

    #[test]
    fn invalid_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "bad");
        env::set_var("THRESHOLD_WIDTH_FACTOR", "wide");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.analysis.width_factor, 2.5);
        clear_keys(managed_keys());
    }

    #[test]
    fn out_of_range_trim_is_sanitized() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("CALIBRATION_TRIM_FRACTION", "0.9");
        let cfg = Config::from_env();
        assert_eq!(cfg.analysis.to_analysis_config().trim_fraction, 0.2);
        clear_keys(managed_keys());
    }

    #[test]
    fn debug_redacts_secret() {
        let cfg = Config::from_env();
        let text = format!("{cfg:?}");
        assert!(!text.contains(&cfg.jwt_secret));
        assert!(text.contains("REDACTED"));
    }
}
