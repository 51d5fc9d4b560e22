use super::{guard, mismatch};
use crate::core::{Cycle, Result, StoreError, TypeKey, UserId, Value};
use crate::facade::CycleStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

type I32Map = HashMap<i32, i32>;

fn existing_map<'a>(key: &str, current: Option<&'a Value>) -> Result<&'a I32Map> {
    let raw = current.ok_or_else(|| StoreError::MissingAttribute(key.to_string()))?;
    raw.as_int32_map().ok_or_else(|| mismatch(key, "int32_map", raw))
}

fn map_or_empty(key: &str, current: Option<&Value>) -> Result<I32Map> {
    match current {
        None => Ok(HashMap::new()),
        Some(raw) => raw
            .as_int32_map()
            .cloned()
            .ok_or_else(|| mismatch(key, "int32_map", raw)),
    }
}

/// Fails once more than `limit_secs` whole seconds have passed since the
/// record's last update. A non-positive limit disables the check.
fn check_cooldown(key: &str, update_time: DateTime<Utc>, limit_secs: i64) -> Result<()> {
    if limit_secs <= 0 {
        return Ok(());
    }
    if (Utc::now() - update_time).num_seconds() > limit_secs {
        return Err(StoreError::CooldownElapsed(key.to_string()));
    }
    Ok(())
}

impl CycleStore {
    /// Insert `map_key → val` when `cond(current)` holds and the key is new.
    /// A missing attribute is an empty map.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_in_i32_map_if<C>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        map_key: i32,
        val: i32,
        cond: C,
    ) -> bool
    where
        C: FnOnce(&I32Map) -> bool,
    {
        self.mutate_attribute(cycle, type_key, user_id, key, |current, _| {
            let mut map = map_or_empty(key, current)?;
            guard(cond(&map), key)?;
            if map.contains_key(&map_key) {
                return Err(StoreError::KeyExists(map_key));
            }
            map.insert(map_key, val);
            Ok(Value::Int32Map(map))
        })
    }

    /// Like [`insert_in_i32_map_if`](Self::insert_in_i32_map_if), but first
    /// runs the cooldown check against the record's `update_time`.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_with_cooldown_in_i32_map_if<C>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        map_key: i32,
        val: i32,
        limit_secs: i64,
        cond: C,
    ) -> bool
    where
        C: FnOnce(&I32Map) -> bool,
    {
        self.mutate_attribute(cycle, type_key, user_id, key, |current, update_time| {
            check_cooldown(key, update_time, limit_secs)?;
            let mut map = map_or_empty(key, current)?;
            guard(cond(&map), key)?;
            if map.contains_key(&map_key) {
                return Err(StoreError::KeyExists(map_key));
            }
            map.insert(map_key, val);
            Ok(Value::Int32Map(map))
        })
    }

    /// Delete `map_key` from an existing map, subject to the cooldown check
    /// and `cond`.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_with_cooldown_from_i32_map_if<C>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        map_key: i32,
        limit_secs: i64,
        cond: C,
    ) -> bool
    where
        C: FnOnce(&I32Map) -> bool,
    {
        self.mutate_attribute(cycle, type_key, user_id, key, |current, update_time| {
            let map = existing_map(key, current)?;
            check_cooldown(key, update_time, limit_secs)?;
            guard(cond(map), key)?;
            if !map.contains_key(&map_key) {
                return Err(StoreError::KeyMissing(map_key));
            }
            let mut map = map.clone();
            map.remove(&map_key);
            Ok(Value::Int32Map(map))
        })
    }

    /// Overwrite the value under an existing `map_key`.
    #[allow(clippy::too_many_arguments)]
    pub fn update_in_i32_map_if<C>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        map_key: i32,
        val: i32,
        cond: C,
    ) -> bool
    where
        C: FnOnce(&I32Map) -> bool,
    {
        self.mutate_attribute(cycle, type_key, user_id, key, |current, _| {
            let map = existing_map(key, current)?;
            guard(cond(map), key)?;
            if !map.contains_key(&map_key) {
                return Err(StoreError::KeyMissing(map_key));
            }
            let mut map = map.clone();
            map.insert(map_key, val);
            Ok(Value::Int32Map(map))
        })
    }
}
