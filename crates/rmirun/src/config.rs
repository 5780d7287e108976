//! Dispatcher configuration.

use std::time::Duration;

/// URI scheme every dispatcher answers to.
pub const SCHEME: &str = "rmi";

/// Reserved registry identifier of the dispatcher's own service.
pub const SERVICE_ID: &str = "service";

/// How often the dispatcher sweeps its pending calls.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// How long a call may wait for its response before the sweep drops it.
pub const CALL_EXPIRY: Duration = Duration::from_secs(60);

/// Timing knobs for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub cleanup_interval: Duration,
    pub call_expiry: Duration,
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self {
            cleanup_interval: CLEANUP_INTERVAL,
            call_expiry: CALL_EXPIRY,
        }
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn call_expiry(mut self, expiry: Duration) -> Self {
        self.call_expiry = expiry;
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.cleanup_interval, Duration::from_secs(30));
        assert_eq!(config.call_expiry, Duration::from_secs(60));
    }

    #[test]
    fn test_fluent_overrides() {
        let config = DispatcherConfig::new()
            .cleanup_interval(Duration::from_millis(10))
            .call_expiry(Duration::from_millis(25));
        assert_eq!(config.cleanup_interval, Duration::from_millis(10));
        assert_eq!(config.call_expiry, Duration::from_millis(25));
    }
}
