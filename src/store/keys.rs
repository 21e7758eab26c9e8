use crate::store::StoreError;

/// 键中各段以 ':' 分隔，因此组成部分不得为空或包含 ':'
fn validate_component(entity: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty() || value.contains(':') {
        return Err(StoreError::Validation(format!(
            "invalid {entity} key component: {value:?}"
        )));
    }
    Ok(())
}

pub fn user_key(user_id: &str) -> Result<String, StoreError> {
    validate_component("user_id", user_id)?;
    Ok(user_id.to_string())
}

pub fn username_index_key(username: &str) -> Result<String, StoreError> {
    let normalized = username.trim().to_lowercase();
    validate_component("username", &normalized)?;
    Ok(format!("username:{normalized}"))
}

pub fn session_key(token_hash: &str) -> Result<String, StoreError> {
    validate_component("token_hash", token_hash)?;
    Ok(token_hash.to_string())
}

pub fn session_user_index_key(user_id: &str, token_hash: &str) -> Result<String, StoreError> {
    validate_component("user_id", user_id)?;
    validate_component("token_hash", token_hash)?;
    Ok(format!("user:{user_id}:{token_hash}"))
}

pub fn session_user_index_prefix(user_id: &str) -> Result<String, StoreError> {
    validate_component("user_id", user_id)?;
    Ok(format!("user:{user_id}:"))
}

/// 大端序保证按 ID 升序遍历
pub fn measurement_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// `{user_id}:{reverse_ts:020}:{reverse_id:020}`，前缀扫描即按时间倒序
pub fn measurement_user_index_key(
    user_id: &str,
    recorded_at_ms: i64,
    id: u64,
) -> Result<String, StoreError> {
    validate_component("user_id", user_id)?;
    let ts = recorded_at_ms.max(0) as u64;
    Ok(format!(
        "{}:{:020}:{:020}",
        user_id,
        u64::MAX - ts,
        u64::MAX - id
    ))
}

pub fn measurement_user_prefix(user_id: &str) -> Result<String, StoreError> {
    validate_component("user_id", user_id)?;
    Ok(format!("{user_id}:"))
}

pub fn posture_settings_key(user_id: &str) -> Result<String, StoreError> {
    validate_component("user_id", user_id)?;
    Ok(user_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_index_orders_newest_first() {
        let newer = measurement_user_index_key("u1", 2_000, 2).unwrap();
        let older = measurement_user_index_key("u1", 1_000, 1).unwrap();
        assert!(newer < older);
    }

    #[test]
    fn same_millisecond_orders_by_id_desc() {
        let a = measurement_user_index_key("u1", 1_000, 7).unwrap();
        let b = measurement_user_index_key("u1", 1_000, 8).unwrap();
        assert!(b < a);
    }

    #[test]
    fn measurement_keys_sort_by_id() {
        assert!(measurement_key(2) < measurement_key(256));
    }

    #[test]
    fn username_index_is_normalized() {
        assert_eq!(username_index_key(" Alice ").unwrap(), "username:alice");
    }

    #[test]
    fn separator_in_component_rejected() {
        assert!(matches!(
            user_key("a:b"),
            Err(StoreError::Validation(_))
        ));
        assert!(session_user_index_prefix("").is_err());
    }
}
