use crate::core::{AttributeBag, Result, UserId, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Plain state of one user for one (cycle, type) pair.
///
/// Loaders and creators hand this to the store; storers and expiry
/// handlers receive a copy of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordData {
    pub user_id: UserId,
    /// Last field-level mutation. Drives cold-data reclamation and cooldowns.
    pub update_time: DateTime<Utc>,
    /// Epoch seconds; 0 means the default expiry policy never removes it.
    pub expire_time: i64,
    pub attributes: AttributeBag,
}

impl RecordData {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            update_time: Utc::now(),
            expire_time: 0,
            attributes: AttributeBag::new(),
        }
    }

    /// Expire `secs` seconds from now. Non-positive values keep the record
    /// out of default expiry.
    pub fn expires_in(mut self, secs: i32) -> Self {
        self.expire_time = if secs > 0 {
            Utc::now().timestamp() + i64::from(secs)
        } else {
            0
        };
        self
    }

    pub fn expires_at(mut self, epoch_secs: i64) -> Self {
        self.expire_time = epoch_secs;
        self
    }

    pub fn updated_at(mut self, update_time: DateTime<Utc>) -> Self {
        self.update_time = update_time;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: AttributeBag) -> Self {
        self.attributes = attributes;
        self
    }

    /// Expired under the default policy at `now` (epoch seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expire_time != 0 && self.expire_time <= now
    }

    pub fn is_cold(&self, threshold: DateTime<Utc>) -> bool {
        self.update_time < threshold
    }
}

/// A resident record: the user it belongs to plus its lock-guarded state.
#[derive(Debug)]
pub struct Record {
    user_id: UserId,
    state: RwLock<RecordData>,
}

impl Record {
    pub fn new(data: RecordData) -> Self {
        Self {
            user_id: data.user_id,
            state: RwLock::new(data),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Deep copy of the whole state.
    pub fn snapshot(&self) -> Result<RecordData> {
        Ok(self.state.read()?.clone())
    }

    /// Deep copy of the attribute bag.
    pub fn attributes(&self) -> Result<AttributeBag> {
        Ok(self.state.read()?.attributes.clone())
    }

    pub fn attribute(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.state.read()?.attributes.get(key).cloned())
    }

    pub fn update_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.state.read()?.update_time)
    }

    pub fn expire_time(&self) -> Result<i64> {
        Ok(self.state.read()?.expire_time)
    }

    /// Set one attribute and refresh `update_time`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let mut state = self.state.write()?;
        state.attributes.insert(key.into(), value.into());
        state.update_time = Utc::now();
        Ok(())
    }

    /// Replace the bag wholesale. `update_time` is left alone.
    pub fn replace_attributes(&self, attributes: AttributeBag) -> Result<()> {
        self.state.write()?.attributes = attributes;
        Ok(())
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, RecordData>> {
        Ok(self.state.read()?)
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, RecordData>> {
        Ok(self.state.write()?)
    }
}
