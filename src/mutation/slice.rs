use super::{guard, mismatch};
use crate::core::{Cycle, StoreError, TypeKey, UserId, Value};
use crate::facade::CycleStore;

impl CycleStore {
    /// Append `val` to an int32 list when `cond(current)` holds.
    ///
    /// A missing attribute is an empty list. Duplicates are kept.
    pub fn append_to_i32_slice_if<C>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        val: i32,
        cond: C,
    ) -> bool
    where
        C: FnOnce(&[i32]) -> bool,
    {
        self.mutate_attribute(cycle, type_key, user_id, key, |current, _| {
            let mut list = match current {
                None => Vec::new(),
                Some(raw) => raw
                    .as_int32_list()
                    .cloned()
                    .ok_or_else(|| mismatch(key, "int32_list", raw))?,
            };
            guard(cond(&list), key)?;
            list.push(val);
            Ok(Value::Int32List(list))
        })
    }

    /// Remove every occurrence of `val` when `cond(current)` holds.
    pub fn remove_from_i32_slice_if<C>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        val: i32,
        cond: C,
    ) -> bool
    where
        C: FnOnce(&[i32]) -> bool,
    {
        self.mutate_attribute(cycle, type_key, user_id, key, |current, _| {
            let raw = current.ok_or_else(|| StoreError::MissingAttribute(key.to_string()))?;
            let list = raw
                .as_int32_list()
                .ok_or_else(|| mismatch(key, "int32_list", raw))?;
            guard(cond(list), key)?;
            let kept: Vec<i32> = list.iter().copied().filter(|v| *v != val).collect();
            Ok(Value::Int32List(kept))
        })
    }
}
