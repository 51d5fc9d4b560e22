// ============================================================================
// CycleState Library
// ============================================================================

pub mod config;
pub mod core;
pub mod facade;
pub mod mutation;
pub mod storage;

// Re-export main types for convenience
pub use config::StoreConfig;
pub use core::{AttributeBag, Cycle, Result, StoreError, TypeKey, UserId, Value};
pub use facade::{CycleStore, StoreStats};

// Re-export storage building blocks
pub use storage::{
    FlushReport, ReclaimReport, Record, RecordData, RegistryStats, SweepReport, SweepWorker,
};
