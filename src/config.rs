use std::time::Duration;

/// Store configuration
///
/// Fixed once the store is built.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Period of the background sweep
    pub sweep_interval: Duration,

    /// Records not updated for this long are written back and evicted
    pub cold_threshold: Duration,

    /// Default expiry (seconds) for cycles with no registered default
    pub default_expire_secs: i32,

    /// Whether each sweep also runs expiration after reclamation
    pub expire_on_sweep: bool,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3600), // 1 hour
            cold_threshold: Duration::from_secs(3600), // 1 hour
            default_expire_secs: 0,
            expire_on_sweep: true,
        }
    }

    /// Set the sweep period
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the cold-data threshold
    pub fn cold_threshold(mut self, threshold: Duration) -> Self {
        self.cold_threshold = threshold;
        self
    }

    /// Set the fallback default expiry
    pub fn default_expire_secs(mut self, secs: i32) -> Self {
        self.default_expire_secs = secs;
        self
    }

    /// Enable or disable expiration during sweeps
    pub fn expire_on_sweep(mut self, enabled: bool) -> Self {
        self.expire_on_sweep = enabled;
        self
    }

    /// Cold threshold as a chrono delta, saturating on overflow.
    pub(crate) fn cold_threshold_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.cold_threshold).unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
