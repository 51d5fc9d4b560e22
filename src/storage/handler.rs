use super::collection::{FlushReport, ReclaimReport, TypeShard};
use super::lazy::LazyMap;
use super::registry::Registry;
use super::service::CycleService;
use crate::core::{Cycle, Result, StoreError, TypeKey};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// Report of one maintenance sweep across every cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Cycles visited.
    pub cycles: usize,
    /// Type shards visited.
    pub shards: usize,
    /// Cold-data reclamation totals.
    pub reclaim: ReclaimReport,
    /// Records removed by expiration.
    pub expired: usize,
    /// Shards or cycles skipped because a step failed on them.
    pub shard_errors: usize,
}

/// Owns every cycle service of a store.
pub struct CycleHandler {
    services: LazyMap<Cycle, CycleService>,
}

impl CycleHandler {
    pub fn new() -> Self {
        Self {
            services: LazyMap::new(),
        }
    }

    /// Service for `cycle`, created with `default_expire` on first reference.
    pub fn service(&self, cycle: &Cycle, default_expire: i32) -> Result<Arc<CycleService>> {
        self.services
            .get_or_insert_with(cycle.clone(), || CycleService::new(cycle.clone(), default_expire))
    }

    pub fn existing_service(&self, cycle: &Cycle) -> Result<Option<Arc<CycleService>>> {
        self.services.get(cycle)
    }

    pub fn cycles(&self) -> Result<Vec<Cycle>> {
        self.services.keys()
    }

    /// Copy of the service list, taken under the read lock.
    pub fn services(&self) -> Result<Vec<Arc<CycleService>>> {
        Ok(self
            .services
            .snapshot()?
            .into_iter()
            .map(|(_, service)| service)
            .collect())
    }

    pub fn reclaim_cold_at(
        &self,
        cycle: &Cycle,
        now: DateTime<Utc>,
        threshold: chrono::Duration,
        registry: &Registry,
    ) -> Result<ReclaimReport> {
        let mut report = ReclaimReport::default();
        if let Some(service) = self.existing_service(cycle)? {
            for shard in service.shards()? {
                match shard.reclaim_cold(now, threshold, registry) {
                    Ok(shard_report) => report.merge(shard_report),
                    Err(err) => shard_failed(&shard, "reclaim", &err),
                }
            }
        }
        Ok(report)
    }

    pub fn expire_cycle_at(&self, cycle: &Cycle, now: i64, registry: &Registry) -> Result<usize> {
        let mut removed = 0;
        if let Some(service) = self.existing_service(cycle)? {
            for shard in service.shards()? {
                match shard.expire(now, registry) {
                    Ok(count) => removed += count,
                    Err(err) => shard_failed(&shard, "expire", &err),
                }
            }
        }
        Ok(removed)
    }

    pub fn expire_by_type_at(
        &self,
        cycle: &Cycle,
        type_key: TypeKey,
        now: i64,
        registry: &Registry,
    ) -> Result<usize> {
        let Some(service) = self.existing_service(cycle)? else {
            return Ok(0);
        };
        match service.existing_shard(type_key)? {
            Some(shard) => shard.expire(now, registry),
            None => Ok(0),
        }
    }

    /// Reclaim cold data and, when `expire` is set, run expiration over
    /// every shard known when the sweep started.
    pub fn sweep_at(
        &self,
        now: DateTime<Utc>,
        threshold: chrono::Duration,
        expire: bool,
        registry: &Registry,
    ) -> Result<SweepReport> {
        let span = info_span!("cycle_sweep", now = %now);
        let _guard = span.enter();

        let mut report = SweepReport::default();
        for service in self.services()? {
            report.cycles += 1;
            let shards = match service.shards() {
                Ok(shards) => shards,
                Err(err) => {
                    event!(
                        Level::WARN,
                        cycle = %service.cycle(),
                        error = %err,
                        "cycle skipped"
                    );
                    report.shard_errors += 1;
                    continue;
                }
            };
            for shard in shards {
                report.shards += 1;
                match shard.reclaim_cold(now, threshold, registry) {
                    Ok(reclaimed) => report.reclaim.merge(reclaimed),
                    Err(err) => {
                        shard_failed(&shard, "reclaim", &err);
                        report.shard_errors += 1;
                        continue;
                    }
                }
                if expire {
                    match shard.expire(now.timestamp(), registry) {
                        Ok(count) => report.expired += count,
                        Err(err) => {
                            shard_failed(&shard, "expire", &err);
                            report.shard_errors += 1;
                        }
                    }
                }
            }
        }

        event!(
            Level::INFO,
            cycles = report.cycles,
            shards = report.shards,
            evicted = report.reclaim.evicted,
            store_failures = report.reclaim.failed,
            expired = report.expired,
            shard_errors = report.shard_errors,
            "sweep finished"
        );
        Ok(report)
    }

    pub fn flush(
        &self,
        cycle: &Cycle,
        type_key: TypeKey,
        registry: &Registry,
    ) -> Result<FlushReport> {
        match self.existing_service(cycle)? {
            Some(service) => service.flush(type_key, registry),
            None => Ok(FlushReport::default()),
        }
    }

    pub fn flush_all(&self, registry: &Registry) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        for service in self.services()? {
            match service.flush_all(registry) {
                Ok(flushed) => report.merge(flushed),
                Err(err) => {
                    event!(
                        Level::WARN,
                        cycle = %service.cycle(),
                        error = %err,
                        "cycle not flushed"
                    );
                    report.shard_errors += 1;
                }
            }
        }
        Ok(report)
    }
}

fn shard_failed(shard: &TypeShard, step: &str, err: &StoreError) {
    event!(
        Level::WARN,
        cycle = %shard.cycle(),
        type_key = shard.type_key(),
        step,
        error = %err,
        "shard skipped"
    );
}

impl Default for CycleHandler {
    fn default() -> Self {
        Self::new()
    }
}
