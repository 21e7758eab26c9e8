use chrono::{DateTime, Utc};
use posture_core::{CalibrationProfile, Diagnosis, SessionSummary, Thresholds, ViewingDirection};
use serde::{Deserialize, Serialize};
use sled::Transactional;

use crate::store::keys;
use crate::store::{map_tx_error, Store, StoreError};

/// 一次完成的测量及其诊断结果。
///
/// 保存测量当时的校准档案、阈值与去抖时长，回放时据此重建状态序列，
/// 之后重新校准不会改变历史记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    pub id: u64,
    pub user_id: String,
    pub summary: SessionSummary,
    pub profile: CalibrationProfile,
    pub thresholds: Thresholds,
    pub width_factor: f64,
    pub dwell_ms: u64,
    pub viewing_direction: ViewingDirection,
    pub diagnosis: Diagnosis,
    pub recorded_at: DateTime<Utc>,
}

impl Store {
    /// 分配新 ID 并写入主表与用户索引，返回最终记录
    pub fn create_measurement(
        &self,
        mut record: MeasurementRecord,
    ) -> Result<MeasurementRecord, StoreError> {
        record.id = self.next_id()?;
        let key = keys::measurement_key(record.id);
        let index_key = keys::measurement_user_index_key(
            &record.user_id,
            record.recorded_at.timestamp_millis(),
            record.id,
        )?;
        let bytes = Self::serialize(&record)?;

        (&self.measurements, &self.measurements_by_user)
            .transaction(|(measurements, by_user)| {
                measurements.insert(&key[..], bytes.as_slice())?;
                by_user.insert(index_key.as_bytes(), &key[..])?;
                Ok(())
            })
            .map_err(map_tx_error)?;

        tracing::debug!(id = record.id, user_id = %record.user_id, "Measurement stored");
        Ok(record)
    }

    pub fn get_measurement(&self, id: u64) -> Result<Option<MeasurementRecord>, StoreError> {
        match self.measurements.get(keys::measurement_key(id))? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// 不属于该用户的记录与不存在的记录一样返回 NotFound
    pub fn get_user_measurement(
        &self,
        user_id: &str,
        id: u64,
    ) -> Result<MeasurementRecord, StoreError> {
        match self.get_measurement(id)? {
            Some(record) if record.user_id == user_id => Ok(record),
            _ => Err(StoreError::NotFound {
                entity: "measurement".to_string(),
                key: id.to_string(),
            }),
        }
    }

    /// 按记录时间倒序分页
    pub fn list_user_measurements(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MeasurementRecord>, StoreError> {
        let prefix = keys::measurement_user_prefix(user_id)?;
        let mut records = Vec::new();

        for item in self
            .measurements_by_user
            .scan_prefix(prefix.as_bytes())
            .skip(offset)
            .take(limit)
        {
            let (_, primary_key) = item?;
            let Some(raw) = self.measurements.get(&primary_key)? else {
                tracing::warn!(user_id, "Dangling measurement index entry");
                continue;
            };
            records.push(Self::deserialize(&raw)?);
        }

        Ok(records)
    }

    pub fn count_user_measurements(&self, user_id: &str) -> Result<usize, StoreError> {
        let prefix = keys::measurement_user_prefix(user_id)?;
        let mut count = 0usize;
        for item in self.measurements_by_user.scan_prefix(prefix.as_bytes()) {
            let _ = item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn delete_measurement(&self, user_id: &str, id: u64) -> Result<(), StoreError> {
        let record = self.get_user_measurement(user_id, id)?;
        let key = keys::measurement_key(id);
        let index_key = keys::measurement_user_index_key(
            &record.user_id,
            record.recorded_at.timestamp_millis(),
            record.id,
        )?;

        (&self.measurements, &self.measurements_by_user)
            .transaction(|(measurements, by_user)| {
                measurements.remove(&key[..])?;
                by_user.remove(index_key.as_bytes())?;
                Ok(())
            })
            .map_err(map_tx_error)?;

        Ok(())
    }
}
