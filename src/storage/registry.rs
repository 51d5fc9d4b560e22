use super::record::RecordData;
use crate::core::{Cycle, Result, TypeKey, UserId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type LoaderFn = dyn Fn(&Cycle, TypeKey, UserId) -> Option<RecordData> + Send + Sync;
pub type CreatorFn = dyn Fn(UserId) -> Option<RecordData> + Send + Sync;
pub type StorerFn = dyn Fn(&Cycle, TypeKey, &RecordData) -> anyhow::Result<()> + Send + Sync;
pub type ExpiryHandlerFn = dyn Fn(&Cycle, TypeKey, &RecordData) + Send + Sync;
pub type DefaultExpireFn = dyn Fn() -> i32 + Send + Sync;

/// One cycle → type → function table.
struct Table<F: ?Sized> {
    entries: RwLock<HashMap<Cycle, HashMap<TypeKey, Arc<F>>>>,
}

impl<F: ?Sized> Table<F> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Last write wins.
    fn register(&self, cycle: Cycle, type_key: TypeKey, f: Arc<F>) -> Result<()> {
        self.entries
            .write()?
            .entry(cycle)
            .or_default()
            .insert(type_key, f);
        Ok(())
    }

    fn get(&self, cycle: &Cycle, type_key: TypeKey) -> Result<Option<Arc<F>>> {
        Ok(self
            .entries
            .read()?
            .get(cycle)
            .and_then(|types| types.get(&type_key))
            .cloned())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.entries.read()?.values().map(HashMap::len).sum())
    }
}

/// Per-(cycle, type) callbacks supplied by feature modules at startup.
///
/// Unregistered pairs read as `None`; nothing here is an error except a
/// poisoned lock.
pub struct Registry {
    loaders: Table<LoaderFn>,
    creators: Table<CreatorFn>,
    storers: Table<StorerFn>,
    expiry_handlers: Table<ExpiryHandlerFn>,
    default_expires: Table<DefaultExpireFn>,
}

/// Number of registered functions per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub loaders: usize,
    pub creators: usize,
    pub storers: usize,
    pub expiry_handlers: usize,
    pub default_expires: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            loaders: Table::new(),
            creators: Table::new(),
            storers: Table::new(),
            expiry_handlers: Table::new(),
            default_expires: Table::new(),
        }
    }

    pub fn register_loader<F>(&self, cycle: Cycle, type_key: TypeKey, loader: F) -> Result<()>
    where
        F: Fn(&Cycle, TypeKey, UserId) -> Option<RecordData> + Send + Sync + 'static,
    {
        self.loaders.register(cycle, type_key, Arc::new(loader))
    }

    pub fn register_creator<F>(&self, cycle: Cycle, type_key: TypeKey, creator: F) -> Result<()>
    where
        F: Fn(UserId) -> Option<RecordData> + Send + Sync + 'static,
    {
        self.creators.register(cycle, type_key, Arc::new(creator))
    }

    pub fn register_storer<F>(&self, cycle: Cycle, type_key: TypeKey, storer: F) -> Result<()>
    where
        F: Fn(&Cycle, TypeKey, &RecordData) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.storers.register(cycle, type_key, Arc::new(storer))
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
        self.expiry_handlers.register(cycle, type_key, Arc::new(handler))
    }

    pub fn register_default_expire<F>(&self, cycle: Cycle, type_key: TypeKey, f: F) -> Result<()>
    where
        F: Fn() -> i32 + Send + Sync + 'static,
    {
        self.default_expires.register(cycle, type_key, Arc::new(f))
    }

    pub fn loader(&self, cycle: &Cycle, type_key: TypeKey) -> Result<Option<Arc<LoaderFn>>> {
        self.loaders.get(cycle, type_key)
    }

    pub fn creator(&self, cycle: &Cycle, type_key: TypeKey) -> Result<Option<Arc<CreatorFn>>> {
        self.creators.get(cycle, type_key)
    }

    pub fn storer(&self, cycle: &Cycle, type_key: TypeKey) -> Result<Option<Arc<StorerFn>>> {
        self.storers.get(cycle, type_key)
    }

    pub fn expiry_handler(
        &self,
        cycle: &Cycle,
        type_key: TypeKey,
    ) -> Result<Option<Arc<ExpiryHandlerFn>>> {
        self.expiry_handlers.get(cycle, type_key)
    }

    /// Default expiry in seconds for the pair, or 0 when none is registered.
    pub fn default_expire_for(&self, cycle: &Cycle, type_key: TypeKey) -> Result<i32> {
        // The function runs after the table lock is released.
        let f = self.default_expires.get(cycle, type_key)?;
        Ok(f.map(|f| f()).unwrap_or(0))
    }

    pub fn stats(&self) -> Result<RegistryStats> {
        Ok(RegistryStats {
            loaders: self.loaders.count()?,
            creators: self.creators.count()?,
            storers: self.storers.count()?,
            expiry_handlers: self.expiry_handlers.count()?,
            default_expires: self.default_expires.count()?,
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
