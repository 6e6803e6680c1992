//! Check cache options

use std::time::Duration;

/// Default number of cached check decisions
pub const DEFAULT_NUM_ENTRIES: i64 = 200;
/// Default resend window
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(500);
/// Default lifetime of a cached decision
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(1);

/// Sizing and timing of the check-decision cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOptions {
    /// Maximum cached fingerprints; `<= 0` disables caching
    pub num_entries: i64,
    /// Resend window; `None` disables time-based resends
    pub flush_interval: Option<Duration>,
    /// Lifetime of a decision since it was last refreshed
    pub expiration: Duration,
}

impl CheckOptions {
    /// Build options; `expiration` is raised above `flush_interval` when needed
    pub fn new(num_entries: i64, flush_interval: Option<Duration>, expiration: Duration) -> Self {
        let expiration = match flush_interval {
            Some(interval) if expiration <= interval => interval + Duration::from_millis(1),
            _ => expiration,
        };
        Self {
            num_entries,
            flush_interval,
            expiration,
        }
    }

    /// Options with caching turned off
    pub fn disabled() -> Self {
        Self::new(-1, Some(DEFAULT_FLUSH_INTERVAL), DEFAULT_EXPIRATION)
    }

    pub fn caching_enabled(&self) -> bool {
        self.num_entries > 0
    }

    pub(crate) fn capacity(&self) -> usize {
        usize::try_from(self.num_entries).unwrap_or(0)
    }
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_ENTRIES, Some(DEFAULT_FLUSH_INTERVAL), DEFAULT_EXPIRATION)
    }
}
