pub mod store;

pub use store::{CycleStore, StoreStats};
