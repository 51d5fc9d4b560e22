use super::lazy::LazyMap;
use super::record::{Record, RecordData};
use super::registry::Registry;
use crate::core::{AttributeBag, Cycle, Result, StoreError, TypeKey, UserId};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;

/// Evictions racing with a resolve are retried this many times.
const RESIDENT_ATTEMPTS: usize = 3;

/// Outcome of one cold-data reclamation pass over a shard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Cold records handed to the storer successfully.
    pub stored: usize,
    /// Records removed from memory.
    pub evicted: usize,
    /// Cold records whose store failed and records that could not be read;
    /// they stay resident.
    pub failed: usize,
    /// Records updated within the threshold.
    pub retained: usize,
}

impl ReclaimReport {
    pub fn merge(&mut self, other: ReclaimReport) {
        self.stored += other.stored;
        self.evicted += other.evicted;
        self.failed += other.failed;
        self.retained += other.retained;
    }
}

/// Outcome of a flush (write-through without eviction).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub stored: usize,
    /// Failed stores plus records that could not be read.
    pub failed: usize,
    /// Records in shards that have no storer registered.
    pub skipped: usize,
    /// Shards that could not be flushed at all.
    pub shard_errors: usize,
}

impl FlushReport {
    pub fn merge(&mut self, other: FlushReport) {
        self.stored += other.stored;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.shard_errors += other.shard_errors;
    }
}

/// All resident records of one (cycle, type) pair.
pub struct TypeShard {
    cycle: Cycle,
    type_key: TypeKey,
    records: LazyMap<UserId, Record>,
}

impl TypeShard {
    pub fn new(cycle: Cycle, type_key: TypeKey) -> Self {
        Self {
            cycle,
            type_key,
            records: LazyMap::new(),
        }
    }

    pub fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn get(&self, user_id: UserId) -> Result<Option<Arc<Record>>> {
        self.records.get(&user_id)
    }

    /// Resident record, else loader, else creator, else `None`.
    ///
    /// The loader and creator run under the shard's write lock, so each is
    /// called at most once for a user that is missing.
    pub fn resolve(&self, user_id: UserId, registry: &Registry) -> Result<Option<Arc<Record>>> {
        let mut failure = None;
        let record = self.records.get_or_try_insert_with(user_id, || {
            match self.populate(user_id, registry) {
                Ok(data) => data.map(Record::new),
                Err(err) => {
                    failure = Some(err);
                    None
                }
            }
        })?;

        match failure {
            Some(err) => Err(err),
            None => Ok(record),
        }
    }

    /// Resolve the user and run `f` on the resident record while the shard's
    /// read lock is held, so reclamation or expiry cannot evict the record
    /// before `f` returns.
    ///
    /// `f` must not call back into this shard.
    pub fn with_resident<R, F>(&self, user_id: UserId, registry: &Registry, f: F) -> Result<R>
    where
        F: FnOnce(&Record) -> Result<R>,
    {
        for _ in 0..RESIDENT_ATTEMPTS {
            if self.resolve(user_id, registry)?.is_none() {
                return Err(StoreError::NoRecord);
            }
            let records = self.records.read()?;
            if let Some(record) = records.get(&user_id) {
                return f(record);
            }
        }
        Err(StoreError::NoRecord)
    }

    fn populate(&self, user_id: UserId, registry: &Registry) -> Result<Option<RecordData>> {
        if let Some(loader) = registry.loader(&self.cycle, self.type_key)? {
            if let Some(loaded) = loader(&self.cycle, self.type_key, user_id) {
                debug!(
                    "Loaded record for user {} ({}/{})",
                    user_id, self.cycle, self.type_key
                );
                return Ok(Some(loaded));
            }
        }

        if let Some(creator) = registry.creator(&self.cycle, self.type_key)? {
            if let Some(created) = creator(user_id) {
                debug!(
                    "Created record for user {} ({}/{})",
                    user_id, self.cycle, self.type_key
                );
                return Ok(Some(created));
            }
        }

        Ok(None)
    }

    /// Replace the user's bag, or build a record with the creator (never the
    /// loader) and inject the bag into it.
    pub fn overwrite(
        &self,
        user_id: UserId,
        attributes: AttributeBag,
        registry: &Registry,
    ) -> Result<()> {
        let mut records = self.records.write()?;

        if let Some(existing) = records.get(&user_id) {
            return existing.replace_attributes(attributes);
        }

        let creator = registry
            .creator(&self.cycle, self.type_key)?
            .ok_or_else(|| {
                StoreError::MissingCreator(format!("{}/{}", self.cycle, self.type_key))
            })?;
        let created = creator(user_id).ok_or(StoreError::NoRecord)?;

        records.insert(user_id, Arc::new(Record::new(created.with_attributes(attributes))));
        Ok(())
    }

    /// Write cold records back through the storer and drop them from memory.
    ///
    /// A record is cold when its `update_time` is older than `now - threshold`.
    /// Without a storer the shard is left untouched. A record whose store
    /// fails stays resident and is retried on the next pass.
    pub fn reclaim_cold(
        &self,
        now: DateTime<Utc>,
        threshold: chrono::Duration,
        registry: &Registry,
    ) -> Result<ReclaimReport> {
        let mut report = ReclaimReport::default();
        let Some(storer) = registry.storer(&self.cycle, self.type_key)? else {
            return Ok(report);
        };

        let mut records = self.records.write()?;
        let Some(cutoff) = now.checked_sub_signed(threshold) else {
            report.retained = records.len();
            return Ok(report);
        };

        let mut cold = Vec::new();
        for (user_id, record) in records.iter() {
            let data = match record.snapshot() {
                Ok(data) => data,
                Err(err) => {
                    warn!(
                        "Skipping unreadable record for user {} ({}/{}): {}",
                        user_id, self.cycle, self.type_key, err
                    );
                    report.failed += 1;
                    continue;
                }
            };
            if data.is_cold(cutoff) {
                cold.push((*user_id, data));
            } else {
                report.retained += 1;
            }
        }

        for (user_id, data) in cold {
            match storer(&self.cycle, self.type_key, &data) {
                Ok(()) => {
                    records.remove(&user_id);
                    report.stored += 1;
                    report.evicted += 1;
                }
                Err(err) => {
                    warn!(
                        "Failed to store cold data for user {} ({}/{}): {:#}",
                        user_id, self.cycle, self.type_key, err
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Remove expired records and return how many were removed.
    ///
    /// With a custom expiry handler registered, the handler sees every
    /// record and every record is removed regardless of its expire time.
    /// Otherwise a record goes when `expire_time != 0 && expire_time <= now`.
    pub fn expire(&self, now: i64, registry: &Registry) -> Result<usize> {
        let handler = registry.expiry_handler(&self.cycle, self.type_key)?;
        let mut records = self.records.write()?;
        let before = records.len();

        match handler {
            Some(handler) => {
                for (user_id, record) in records.iter() {
                    match record.snapshot() {
                        Ok(data) => handler(&self.cycle, self.type_key, &data),
                        Err(err) => warn!(
                            "Expiring unreadable record for user {} ({}/{}): {}",
                            user_id, self.cycle, self.type_key, err
                        ),
                    }
                }
                records.clear();
            }
            None => {
                let mut expired = Vec::new();
                for (user_id, record) in records.iter() {
                    match record.read() {
                        Ok(data) if data.is_expired_at(now) => expired.push(*user_id),
                        Ok(_) => {}
                        Err(err) => warn!(
                            "Keeping unreadable record for user {} ({}/{}): {}",
                            user_id, self.cycle, self.type_key, err
                        ),
                    }
                }
                for user_id in expired {
                    records.remove(&user_id);
                }
            }
        }

        Ok(before - records.len())
    }

    /// Store every resident record without evicting any.
    pub fn flush(&self, registry: &Registry) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        let records = self.records.snapshot()?;

        let Some(storer) = registry.storer(&self.cycle, self.type_key)? else {
            if !records.is_empty() {
                debug!(
                    "No storer for {}/{}, skipping {} records",
                    self.cycle,
                    self.type_key,
                    records.len()
                );
            }
            report.skipped = records.len();
            return Ok(report);
        };

        for (user_id, record) in records {
            let data = match record.snapshot() {
                Ok(data) => data,
                Err(err) => {
                    warn!(
                        "Skipping unreadable record for user {} ({}/{}): {}",
                        user_id, self.cycle, self.type_key, err
                    );
                    report.failed += 1;
                    continue;
                }
            };
            match storer(&self.cycle, self.type_key, &data) {
                Ok(()) => report.stored += 1,
                Err(err) => {
                    warn!(
                        "Failed to store data for user {} ({}/{}): {:#}",
                        user_id, self.cycle, self.type_key, err
                    );
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    pub fn len(&self) -> Result<usize> {
        self.records.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.records.is_empty()
    }

    pub fn user_ids(&self) -> Result<Vec<UserId>> {
        self.records.keys()
    }

    /// Put a record in place directly, bypassing loader and creator.
    pub fn insert(&self, data: RecordData) -> Result<Arc<Record>> {
        self.records.insert(data.user_id, Record::new(data))
    }
}
