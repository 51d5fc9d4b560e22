use super::guard;
use crate::core::{Cycle, TypeKey, UserId, Value};
use crate::facade::CycleStore;

impl CycleStore {
    /// Overwrite `key` with `new_value` when `cond(old, new)` holds.
    ///
    /// `old` is `None` when the attribute is absent; the guard can match on
    /// the variant itself.
    pub fn update_if<C>(
        &self,
        cycle: Cycle,
        type_key: TypeKey,
        user_id: UserId,
        key: &str,
        new_value: impl Into<Value>,
        cond: C,
    ) -> bool
    where
        C: FnOnce(Option<&Value>, &Value) -> bool,
    {
        let new_value = new_value.into();
        self.mutate_attribute(cycle, type_key, user_id, key, |current, _| {
            guard(cond(current, &new_value), key)?;
            Ok(new_value)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{Cycle, Value};
    use crate::facade::CycleStore;
    use crate::storage::RecordData;

    #[test]
    fn test_update_only_when_higher() {
        let store = CycleStore::new();
        store
            .register_creator(Cycle::Daily, 1, |user| Some(RecordData::new(user)))
            .unwrap();

        let higher = |old: Option<&Value>, new: &Value| match (old, new) {
            (None, _) => true,
            (Some(Value::Int(o)), Value::Int(n)) => n > o,
            _ => false,
        };

        assert!(store.update_if(Cycle::Daily, 1, 12345, "score", Value::Int(200), higher));
        assert!(!store.update_if(Cycle::Daily, 1, 12345, "score", Value::Int(150), higher));
        assert!(store.update_if(Cycle::Daily, 1, 12345, "score", Value::Int(250), higher));

        assert_eq!(
            store.attribute(Cycle::Daily, 1, 12345, "score"),
            Some(Value::Int(250))
        );
    }
}
