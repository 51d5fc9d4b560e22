use crate::config::StoreConfig;
use crate::core::{AttributeBag, Cycle, Result, TypeKey, UserId, Value};
use crate::storage::{
    CycleHandler, CycleService, FlushReport, ReclaimReport, Record, RecordData, Registry,
    RegistryStats, SweepReport, SweepWorker, TypeShard, spawn_sweep_worker,
};
use chrono::{DateTime, Utc};
use log::warn;
use std::sync::Arc;

/// Cache of periodically scoped per-user state.
///
/// A store owns its registries, the cycle → type → user hierarchy and the
/// configuration of its sweep. Cloning is cheap and every clone shares the
/// same state, so one store is built at startup and handed to request code.
///
/// # Examples
///
/// ```
/// use cyclestate::{Cycle, CycleStore, RecordData, Value};
///
/// let store = CycleStore::new();
/// store
///     .register_creator(Cycle::Daily, 1, |user| Some(RecordData::new(user)))
///     .unwrap();
///
/// assert!(store.increase_int(Cycle::Daily, 1, 42, "score", 10, |_| true));
/// assert!(!store.decrease_int(Cycle::Daily, 1, 42, "score", 15));
/// assert!(store.decrease_int(Cycle::Daily, 1, 42, "score", 5));
/// assert_eq!(
///     store.attributes(Cycle::Daily, 1, 42).get("score"),
///     Some(&Value::Int(5))
/// );
/// ```
#[derive(Clone)]
pub struct CycleStore {
    config: Arc<StoreConfig>,
    registry: Arc<Registry>,
    handler: Arc<CycleHandler>,
}

/// Point-in-time counts for a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub cycles: usize,
    pub shards: usize,
    pub records: usize,
    pub registry: RegistryStats,
}

impl CycleStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(Registry::new()),
            handler: Arc::new(CycleHandler::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn handler(&self) -> &CycleHandler {
        &self.handler
    }

    // ========================================
    // Registration
    // ========================================

    pub fn register_loader<F>(&self, cycle: Cycle, type_key: TypeKey, loader: F) -> Result<()>
    where
        F: Fn(&Cycle, TypeKey, UserId) -> Option<RecordData> + Send + Sync + 'static,
    {
        self.registry.register_loader(cycle, type_key, loader)
    }

    pub fn register_creator<F>(&self, cycle: Cycle, type_key: TypeKey, creator: F) -> Result<()>
    where
        F: Fn(UserId) -> Option<RecordData> + Send + Sync + 'static,
    {
        self.registry.register_creator(cycle, type_key, creator)
    }

    pub fn register_storer<F>(&self, cycle: Cycle, type_key: TypeKey, storer: F) -> Result<()>
    where
        F: Fn(&Cycle, TypeKey, &RecordData) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.registry.register_storer(cycle, type_key, storer)
    }

    pub fn register_expiry_handler<F>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(&Cycle, TypeKey, &RecordData) + Send + Sync + 'static,
    {
        self.registry.register_expiry_handler(cycle, type_key, handler)
    }

    pub fn register_default_expire<F>(&self, cycle: Cycle, type_key: TypeKey, f: F) -> Result<()>
    where
        F: Fn() -> i32 + Send + Sync + 'static,
    {
        self.registry.register_default_expire(cycle, type_key, f)
    }

    /// Registered default expiry for the pair, else the configured fallback.
    pub fn default_expire_for(&self, cycle: &Cycle, type_key: TypeKey) -> i32 {
        match self.registry.default_expire_for(cycle, type_key) {
            Ok(0) => self.config.default_expire_secs,
            Ok(secs) => secs,
            Err(err) => {
                warn!("Default expiry lookup failed for {}/{}: {}", cycle, type_key, err);
                self.config.default_expire_secs
            }
        }
    }

    // ========================================
    // Hierarchy
    // ========================================

    /// Service for `cycle`, created on first reference with the default
    /// expiry of the type that referenced it first.
    pub fn service(&self, cycle: &Cycle, type_key: TypeKey) -> Result<Arc<CycleService>> {
        if let Some(service) = self.handler.existing_service(cycle)? {
            return Ok(service);
        }
        self.handler
            .service(cycle, self.default_expire_for(cycle, type_key))
    }

    pub fn shard(&self, cycle: &Cycle, type_key: TypeKey) -> Result<Arc<TypeShard>> {
        self.service(cycle, type_key)?.shard(type_key)
    }

    // ========================================
    // Resolution and direct access
    // ========================================

    /// Resident record, else loaded, else created.
    pub fn try_resolve(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
    ) -> Result<Option<Arc<Record>>> {
        self.shard(&cycle, type_key)?
            .resolve(user_id, &self.registry)
    }

    /// Like [`try_resolve`](Self::try_resolve); lock failures read as absent
    /// and are logged.
    pub fn resolve(&self, cycle: Cycle, type_key: TypeKey, user_id: UserId) -> Option<Arc<Record>> {
        match self.try_resolve(cycle.clone(), type_key, user_id) {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    "Failed to resolve user {} ({}/{}): {}",
                    user_id, cycle, type_key, err
                );
                None
            }
        }
    }

    /// Deep copy of the user's attributes; empty when no record exists or
    /// can be produced.
    pub fn attributes(&self, cycle: Cycle, type_key: TypeKey, user_id: UserId) -> AttributeBag {
        self.resolve(cycle, type_key, user_id)
            .and_then(|record| record.attributes().ok())
            .unwrap_or_default()
    }

    /// Copy of a single attribute.
    pub fn attribute(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
    ) -> Option<Value> {
        self.resolve(cycle, type_key, user_id)
            .and_then(|record| record.attribute(key).ok().flatten())
    }

    /// Replace the whole bag. An absent record is built by the creator,
    /// never the loader. `update_time` is not refreshed.
    pub fn set_attributes(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        attributes: AttributeBag,
    ) -> bool {
        let outcome = self
            .shard(&cycle, type_key)
            .and_then(|shard| shard.overwrite(user_id, attributes, &self.registry));
        match outcome {
            Ok(()) => true,
            Err(err) => {
                log::debug!(
                    "Overwrite for user {} ({}/{}) failed: {}",
                    user_id, cycle, type_key, err
                );
                false
            }
        }
    }

    /// Set one attribute unconditionally and refresh `update_time`.
    pub fn set_attribute(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> bool {
        let (key, value) = (key.into(), value.into());
        self.shard(&cycle, type_key)
            .and_then(|shard| {
                shard.with_resident(user_id, &self.registry, |record| record.set(key, value))
            })
            .is_ok()
    }

    // ========================================
    // Write-back, reclamation and expiry
    // ========================================

    /// Store every resident record of one type without evicting.
    pub fn flush(&self, cycle: &Cycle, type_key: TypeKey) -> Result<FlushReport> {
        self.handler.flush(cycle, type_key, &self.registry)
    }

    /// Store every resident record of every cycle and type without evicting.
    pub fn flush_all(&self) -> Result<FlushReport> {
        self.handler.flush_all(&self.registry)
    }

    pub fn expire_by_type(&self, cycle: &Cycle, type_key: TypeKey) -> Result<usize> {
        self.expire_by_type_at(cycle, type_key, Utc::now().timestamp())
    }

    pub fn expire_by_type_at(&self, cycle: &Cycle, type_key: TypeKey, now: i64) -> Result<usize> {
        self.handler
            .expire_by_type_at(cycle, type_key, now, &self.registry)
    }

    pub fn expire_cycle(&self, cycle: &Cycle) -> Result<usize> {
        self.expire_cycle_at(cycle, Utc::now().timestamp())
    }

    pub fn expire_cycle_at(&self, cycle: &Cycle, now: i64) -> Result<usize> {
        self.handler.expire_cycle_at(cycle, now, &self.registry)
    }

    pub fn reclaim_cold(&self, cycle: &Cycle) -> Result<ReclaimReport> {
        self.reclaim_cold_at(cycle, Utc::now())
    }

    pub fn reclaim_cold_at(&self, cycle: &Cycle, now: DateTime<Utc>) -> Result<ReclaimReport> {
        self.handler.reclaim_cold_at(
            cycle,
            now,
            self.config.cold_threshold_delta(),
            &self.registry,
        )
    }

    /// One maintenance pass over every cycle: reclamation, then expiration
    /// when the config asks for it.
    pub fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        self.handler.sweep_at(
            now,
            self.config.cold_threshold_delta(),
            self.config.expire_on_sweep,
            &self.registry,
        )
    }

    /// Start the periodic sweep. Must be called inside a tokio runtime.
    pub fn spawn_sweeper(&self) -> SweepWorker {
        spawn_sweep_worker(self.clone())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats {
            registry: self.registry.stats()?,
            ..Default::default()
        };
        for service in self.handler.services()? {
            stats.cycles += 1;
            for shard in service.shards()? {
                stats.shards += 1;
                stats.records += shard.len()?;
            }
        }
        Ok(stats)
    }
}

impl Default for CycleStore {
    fn default() -> Self {
        Self::new()
    }
}
