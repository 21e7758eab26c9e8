//! 每个用户至多一个实时分析会话，帧处理在会话锁内串行执行。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use posture_core::{AnalysisConfig, AnalysisSession, CalibrationProfile, ViewingDirection};
use tokio::sync::{Mutex, RwLock};

use crate::response::AppError;

pub struct LiveSession {
    pub session: AnalysisSession,
    last_seen: Instant,
}

impl LiveSession {
    fn new(session: AnalysisSession) -> Self {
        Self {
            session,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }
}

pub type SharedLiveSession = Arc<Mutex<LiveSession>>;

pub struct LiveSessions {
    sessions: RwLock<HashMap<String, SharedLiveSession>>,
    max_sessions: usize,
}

impl LiveSessions {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// 打开（或替换）用户的实时会话
    pub async fn open(
        &self,
        user_id: &str,
        config: AnalysisConfig,
        profile: CalibrationProfile,
        direction: ViewingDirection,
    ) -> Result<SharedLiveSession, AppError> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(user_id) && sessions.len() >= self.max_sessions {
            tracing::warn!(active = sessions.len(), "Live session capacity reached");
            return Err(AppError {
                status: axum::http::StatusCode::SERVICE_UNAVAILABLE,
                code: "LIVE_SESSION_CAPACITY".to_string(),
                message: "Too many active live sessions".to_string(),
                is_operational: true,
            });
        }

        let live = Arc::new(Mutex::new(LiveSession::new(AnalysisSession::new(
            config, profile, direction,
        ))));
        if sessions.insert(user_id.to_string(), live.clone()).is_some() {
            tracing::info!(user_id, "Live session replaced");
        } else {
            tracing::info!(user_id, "Live session opened");
        }
        Ok(live)
    }

    pub async fn get(&self, user_id: &str) -> Option<SharedLiveSession> {
        self.sessions.read().await.get(user_id).cloned()
    }

    /// 不存在时返回 404，供路由直接使用
    pub async fn require(&self, user_id: &str) -> Result<SharedLiveSession, AppError> {
        self.get(user_id)
            .await
            .ok_or_else(|| AppError::not_found("No live session; open one first"))
    }

    pub async fn remove(&self, user_id: &str) -> bool {
        self.sessions.write().await.remove(user_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// 回收空闲超过 `idle_timeout` 的会话，返回回收数。
    /// 正被其他请求持有锁的会话视为活跃。
    pub async fn evict_idle(&self, idle_timeout: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|user_id, live| match live.try_lock() {
            Ok(guard) => {
                let keep = guard.idle_for() < idle_timeout;
                if !keep {
                    tracing::info!(user_id = %user_id, "Evicting idle live session");
                }
                keep
            }
            Err(_) => true,
        });
        before - sessions.len()
    }
}
