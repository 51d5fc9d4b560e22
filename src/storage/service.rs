use super::collection::{FlushReport, TypeShard};
use super::lazy::LazyMap;
use super::registry::Registry;
use crate::core::{Cycle, Result, TypeKey};
use log::warn;
use std::sync::Arc;

/// All type shards of one cycle.
pub struct CycleService {
    cycle: Cycle,
    default_expire: i32,
    shards: LazyMap<TypeKey, TypeShard>,
}

impl CycleService {
    pub fn new(cycle: Cycle, default_expire: i32) -> Self {
        Self {
            cycle,
            default_expire,
            shards: LazyMap::new(),
        }
    }

    pub fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    /// Expiry in seconds this service was created with.
    pub fn default_expire(&self) -> i32 {
        self.default_expire
    }

    /// Shard for `type_key`, created on first reference.
    pub fn shard(&self, type_key: TypeKey) -> Result<Arc<TypeShard>> {
        self.shards
            .get_or_insert_with(type_key, || TypeShard::new(self.cycle.clone(), type_key))
    }

    /// Shard for `type_key` if one was ever referenced.
    pub fn existing_shard(&self, type_key: TypeKey) -> Result<Option<Arc<TypeShard>>> {
        self.shards.get(&type_key)
    }

    /// Copy of the shard list; callers process it without holding the lock.
    pub fn shards(&self) -> Result<Vec<Arc<TypeShard>>> {
        Ok(self
            .shards
            .snapshot()?
            .into_iter()
            .map(|(_, shard)| shard)
            .collect())
    }

    pub fn type_keys(&self) -> Result<Vec<TypeKey>> {
        self.shards.keys()
    }

    pub fn flush(&self, type_key: TypeKey, registry: &Registry) -> Result<FlushReport> {
        match self.existing_shard(type_key)? {
            Some(shard) => shard.flush(registry),
            None => Ok(FlushReport::default()),
        }
    }

    pub fn flush_all(&self, registry: &Registry) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        for shard in self.shards()? {
            match shard.flush(registry) {
                Ok(flushed) => report.merge(flushed),
                Err(err) => {
                    warn!(
                        "Flush of {}/{} failed, continuing: {}",
                        self.cycle,
                        shard.type_key(),
                        err
                    );
                    report.shard_errors += 1;
                }
            }
        }
        Ok(report)
    }

    /// Resident records across all shards.
    pub fn record_count(&self) -> Result<usize> {
        let mut total = 0;
        for shard in self.shards()? {
            total += shard.len()?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::RecordData;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_shard_is_created_once() {
        let service = CycleService::new(Cycle::Daily, 3600);
        let first = service.shard(1).unwrap();
        let second = service.shard(1).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(service.default_expire(), 3600);
        assert_eq!(service.type_keys().unwrap(), vec![1]);
        assert!(service.existing_shard(2).unwrap().is_none());
    }

    #[test]
    fn test_flush_single_type() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        registry
            .register_storer(Cycle::Daily, 1, move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let service = CycleService::new(Cycle::Daily, 3600);
        service
            .shard(1)
            .unwrap()
            .insert(RecordData::new(1).with_attribute("key", "value"))
            .unwrap();
        service.shard(2).unwrap().insert(RecordData::new(1)).unwrap();

        let report = service.flush(1, &registry).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.stored, 1);
        assert_eq!(service.record_count().unwrap(), 2);

        let all = service.flush_all(&registry).unwrap();
        assert_eq!(all.stored, 1);
        assert_eq!(all.skipped, 1);
    }
}
