pub mod collection;
pub mod handler;
pub mod lazy;
pub mod record;
pub mod registry;
pub mod service;
pub mod worker;

pub use collection::{FlushReport, ReclaimReport, TypeShard};
pub use handler::{CycleHandler, SweepReport};
pub use lazy::LazyMap;
pub use record::{Record, RecordData};
pub use registry::{Registry, RegistryStats};
pub use service::CycleService;
pub use worker::{SweepWorker, spawn_sweep_worker};
