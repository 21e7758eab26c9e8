use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{map_tx_error, Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token_hash: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

impl Store {
    pub fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let key = keys::session_key(&session.token_hash)?;
        let index_key = keys::session_user_index_key(&session.user_id, &session.token_hash)?;
        let session_bytes = Self::serialize(session)?;

        self.sessions
            .transaction(move |tx| {
                tx.insert(key.as_bytes(), session_bytes.as_slice())?;
                tx.insert(index_key.as_bytes(), &[] as &[u8])?;
                Ok(())
            })
            .map_err(map_tx_error)?;
        Ok(())
    }

    /// 过期或已撤销的会话视为不存在；删除交给后台清理任务
    pub fn get_session(&self, token_hash: &str) -> Result<Option<Session>, StoreError> {
        let key = keys::session_key(token_hash)?;
        let Some(raw) = self.sessions.get(key.as_bytes())? else {
            return Ok(None);
        };

        let session = Self::deserialize::<Session>(&raw)?;
        if !session.is_live(Utc::now()) {
            return Ok(None);
        }

        Ok(Some(session))
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<(), StoreError> {
        let key = keys::session_key(token_hash)?;
        let index_key = self
            .sessions
            .get(key.as_bytes())?
            .and_then(|raw| Self::deserialize::<Session>(&raw).ok())
            .and_then(|session| keys::session_user_index_key(&session.user_id, token_hash).ok());

        self.sessions
            .transaction(move |tx| {
                if let Some(ref idx_key) = index_key {
                    tx.remove(idx_key.as_bytes())?;
                }
                tx.remove(key.as_bytes())?;
                Ok(())
            })
            .map_err(map_tx_error)?;

        Ok(())
    }

    fn user_session_hashes(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let prefix = keys::session_user_index_prefix(user_id)?;
        let mut hashes = Vec::new();
        for item in self.sessions.scan_prefix(prefix.as_bytes()) {
            let (k, _) = item?;
            let Ok(key_str) = std::str::from_utf8(&k) else {
                tracing::warn!("Skipping session index key with invalid UTF-8");
                continue;
            };
            if let Some(hash) = key_str.rsplit(':').next() {
                hashes.push(hash.to_string());
            }
        }
        Ok(hashes)
    }

    pub fn count_user_sessions(&self, user_id: &str) -> Result<usize, StoreError> {
        Ok(self.user_session_hashes(user_id)?.len())
    }

    /// 用户会话数超过 `max_sessions` 时，从最旧的开始删除
    pub fn cleanup_oldest_user_sessions(
        &self,
        user_id: &str,
        max_sessions: usize,
    ) -> Result<usize, StoreError> {
        let mut sessions: Vec<(String, DateTime<Utc>)> = Vec::new();
        for hash in self.user_session_hashes(user_id)? {
            let session_key = keys::session_key(&hash)?;
            if let Some(raw) = self.sessions.get(session_key.as_bytes())? {
                let session = Self::deserialize::<Session>(&raw)?;
                sessions.push((hash, session.created_at));
            }
        }

        if sessions.len() <= max_sessions {
            return Ok(0);
        }

        sessions.sort_by_key(|(_, created_at)| *created_at);
        let to_remove = sessions.len() - max_sessions;
        for (hash, _) in sessions.into_iter().take(to_remove) {
            self.delete_session(&hash)?;
        }

        Ok(to_remove)
    }

    /// 每批最多清理 1000 条过期或已撤销的会话，返回实际删除数
    pub fn cleanup_expired_sessions(&self) -> Result<u32, StoreError> {
        const MAX_BATCH_SIZE: usize = 1000;

        let now = Utc::now();
        let mut expired = Vec::new();
        for item in self.sessions.iter() {
            let (k, v) = item?;
            if k.starts_with(b"user:") {
                continue;
            }
            let session: Session = Self::deserialize(&v)?;
            if !session.is_live(now) {
                expired.push(session.token_hash);
                if expired.len() >= MAX_BATCH_SIZE {
                    break;
                }
            }
        }

        let count = expired.len() as u32;
        for token_hash in expired {
            self.delete_session(&token_hash)?;
        }

        Ok(count)
    }
}
