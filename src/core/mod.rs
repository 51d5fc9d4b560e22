pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, StoreError};
pub use types::{Cycle, TypeKey, UserId};
pub use value::{AttributeBag, Coercion, Value};
