use crate::store::{keys, operations::measurements::MeasurementRecord};
use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_measurement_user_index", m002_measurement_user_index),
    ]
}

/// 执行所有未应用的数据库迁移。
///
/// 每个迁移函数必须幂等：进程可能在迁移成功但版本号写入之前中断，
/// 重启后会重新执行该迁移。版本号在每个迁移完成后立即持久化，且拒绝降级。
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;

    for (index, (name, func)) in migrations().iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.config_versions.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("corrupt version marker ({} bytes)", raw.len()),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {current} to {version}"),
        });
    }

    store
        .config_versions
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

/// 从主表重建按用户的测量索引，已存在的索引项会被原样覆盖
fn m002_measurement_user_index(store: &Store) -> Result<(), StoreError> {
    let mut rebuilt = 0usize;
    for item in store.measurements.iter() {
        let (_, value) = item?;
        let record: MeasurementRecord = Store::deserialize(&value)?;
        let index_key = keys::measurement_user_index_key(
            &record.user_id,
            record.recorded_at.timestamp_millis(),
            record.id,
        )?;
        store
            .measurements_by_user
            .insert(index_key.as_bytes(), &keys::measurement_key(record.id))?;
        rebuilt += 1;
    }
    tracing::info!(rebuilt, "Measurement user index rebuilt");
    Ok(())
}
