use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No record could be loaded or created")]
    NoRecord,

    #[error("No creator registered for {0}")]
    MissingCreator(String),

    #[error("Attribute '{0}' not found")]
    MissingAttribute(String),

    #[error("Type mismatch on '{key}': expected {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Condition rejected update of '{0}'")]
    GuardRejected(String),

    #[error("Insufficient value in '{0}'")]
    Insufficient(String),

    #[error("Cooldown window elapsed for '{0}'")]
    CooldownElapsed(String),

    #[error("Map key {0} already present")]
    KeyExists(i32),

    #[error("Map key {0} not present")]
    KeyMissing(i32),

    #[error("Arithmetic overflow on '{0}'")]
    Overflow(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Lock error: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    /// True for failures that only reflect record contents (absence, guards,
    /// type mismatches) rather than a broken store.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::LockPoisoned(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned(err.to_string())
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", err))
    }
}
