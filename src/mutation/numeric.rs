use super::{guard, mismatch};
use crate::core::value::{Arith, FLOAT64, INT, INT32, INT64, NumericSlot};
use crate::core::{Coercion, Cycle, StoreError, TypeKey, UserId};
use crate::facade::CycleStore;
use std::cmp::Ordering;

impl CycleStore {
    fn increase_with<N, C>(
        &self,
        slot: &NumericSlot<N>,
        (cycle, type_key, user_id): (Cycle, TypeKey, UserId),
        key: &str,
        amount: N,
        cond: C,
    ) -> bool
    where
        N: Arith,
        C: FnOnce(N) -> bool,
    {
        self.mutate_attribute(cycle, type_key, user_id, key, |current, _| {
            let current = match current {
                None => N::ZERO,
                Some(raw) => slot
                    .read(raw, Coercion::Accumulate)
                    .ok_or_else(|| mismatch(key, slot.name, raw))?,
            };
            guard(cond(current), key)?;
            let next = current
                .checked_plus(amount)
                .ok_or_else(|| StoreError::Overflow(key.to_string()))?;
            Ok(slot.write(next))
        })
    }

    fn decrease_with<N: Arith>(
        &self,
        slot: &NumericSlot<N>,
        (cycle, type_key, user_id): (Cycle, TypeKey, UserId),
        key: &str,
        amount: N,
    ) -> bool {
        self.mutate_attribute(cycle, type_key, user_id, key, |current, _| {
            let raw = current.ok_or_else(|| StoreError::MissingAttribute(key.to_string()))?;
            let current = slot
                .read(raw, Coercion::Deduct)
                .ok_or_else(|| mismatch(key, slot.name, raw))?;
            // NaN compares as None and is treated as insufficient.
            match current.partial_cmp(&amount) {
                Some(Ordering::Greater | Ordering::Equal) => {}
                _ => return Err(StoreError::Insufficient(key.to_string())),
            }
            let next = current
                .checked_minus(amount)
                .ok_or_else(|| StoreError::Overflow(key.to_string()))?;
            Ok(slot.write(next))
        })
    }

    /// Add `amount` to a native int attribute when `cond(current)` holds.
    /// A missing attribute counts as 0.
    pub fn increase_int<C>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        amount: i64,
        cond: C,
    ) -> bool
    where
        C: FnOnce(i64) -> bool,
    {
        self.increase_with(&INT, (cycle, type_key, user_id), key, amount, cond)
    }

    pub fn increase_i32<C>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        amount: i32,
        cond: C,
    ) -> bool
    where
        C: FnOnce(i32) -> bool,
    {
        self.increase_with(&INT32, (cycle, type_key, user_id), key, amount, cond)
    }

    pub fn increase_i64<C>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        amount: i64,
        cond: C,
    ) -> bool
    where
        C: FnOnce(i64) -> bool,
    {
        self.increase_with(&INT64, (cycle, type_key, user_id), key, amount, cond)
    }

    /// Float32 values are widened and written back as float64.
    pub fn increase_f64<C>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        amount: f64,
        cond: C,
    ) -> bool
    where
        C: FnOnce(f64) -> bool,
    {
        self.increase_with(&FLOAT64, (cycle, type_key, user_id), key, amount, cond)
    }

    /// Subtract `amount` only if the current value is at least `amount`.
    /// A missing attribute fails; stored int64 values are accepted.
    pub fn decrease_int(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        amount: i64,
    ) -> bool {
        self.decrease_with(&INT, (cycle, type_key, user_id), key, amount)
    }

    /// Stored int and int64 values are narrowed to int32.
    pub fn decrease_i32(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        amount: i32,
    ) -> bool {
        self.decrease_with(&INT32, (cycle, type_key, user_id), key, amount)
    }

    pub fn decrease_i64(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        amount: i64,
    ) -> bool {
        self.decrease_with(&INT64, (cycle, type_key, user_id), key, amount)
    }

    pub fn decrease_f64(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        amount: f64,
    ) -> bool {
        self.decrease_with(&FLOAT64, (cycle, type_key, user_id), key, amount)
    }
}
