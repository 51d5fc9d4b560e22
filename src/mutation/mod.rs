//! Conditional single-attribute mutations.
//!
//! Every primitive resolves the record, takes its write lock and hands the
//! current raw value to a step function. The step coerces the value, checks
//! its guards and returns the value to write back. Any error leaves the
//! record untouched and surfaces as `false`; the error itself is only logged,
//! so callers cannot tell a type mismatch from a rejected guard.
//!
//! Guards run inside the record's critical section, with the shard pinned
//! against eviction. They must not block or call back into the store.

pub mod map;
pub mod numeric;
pub mod slice;
pub mod update;

use crate::core::{Cycle, Result, StoreError, TypeKey, UserId, Value};
use crate::facade::CycleStore;
use chrono::{DateTime, Utc};
use log::{debug, warn};

impl CycleStore {
    /// Shared skeleton of every conditional primitive.
    pub(crate) fn mutate_attribute<F>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        step: F,
    ) -> bool
    where
        F: FnOnce(Option<&Value>, DateTime<Utc>) -> Result<Value>,
    {
        match self.try_mutate_attribute(&cycle, type_key, user_id, key, step) {
            Ok(()) => true,
            Err(err) if err.is_rejection() => {
                debug!(
                    "Mutation of '{}' for user {} ({}/{}) rejected: {}",
                    key, user_id, cycle, type_key, err
                );
                false
            }
            Err(err) => {
                warn!(
                    "Mutation of '{}' for user {} ({}/{}) failed: {}",
                    key, user_id, cycle, type_key, err
                );
                false
            }
        }
    }

    fn try_mutate_attribute<F>(
        &self,
        cycle: &Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        step: F,
    ) -> Result<()>
    where
        F: FnOnce(Option<&Value>, DateTime<Utc>) -> Result<Value>,
    {
        self.shard(cycle, type_key)?
            .with_resident(user_id, self.registry(), |record| {
                let mut state = record.write()?;
                let next = step(state.attributes.get(key), state.update_time)?;
                state.attributes.insert(key.to_string(), next);
                state.update_time = Utc::now();
                Ok(())
            })
    }
}

pub(crate) fn mismatch(key: &str, expected: &'static str, found: &Value) -> StoreError {
    StoreError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.type_name(),
    }
}

/// Guard helper: `Ok(())` when `passed`, else a rejection for `key`.
pub(crate) fn guard(passed: bool, key: &str) -> Result<()> {
    if passed {
        Ok(())
    } else {
        Err(StoreError::GuardRejected(key.to_string()))
    }
}
