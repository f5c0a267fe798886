//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum number of mutations attempted per push phase.
    pub push_batch_size: usize,
    /// Failed attempts after which a mutation stops being retried
    /// automatically. It stays in the queue and in `pending_count`.
    pub max_retry: u32,
    /// How long synced queue entries are kept before pruning.
    pub retention: Duration,
    /// Cadence of the periodic sync timer.
    pub sync_interval: Duration,
    /// Bound applied to each individual remote call, handed to the
    /// HTTP client with every request. A timed-out call counts as a
    /// transient failure.
    pub request_timeout: Duration,
    /// Maximum number of entries kept in `recent_errors`.
    pub recent_error_cap: usize,
}

impl SyncConfig {
    /// Creates a configuration with production defaults.
    pub fn new() -> Self {
        Self {
            push_batch_size: 10,
            max_retry: 3,
            retention: Duration::from_secs(24 * 60 * 60),
            sync_interval: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(30),
            recent_error_cap: 20,
        }
    }

    /// Sets the push batch size.
    pub fn with_push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = size;
        self
    }

    /// Sets the automatic retry bound.
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Sets the retention window for synced entries.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Sets the periodic sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the recent-errors capacity.
    pub fn with_recent_error_cap(mut self, cap: usize) -> Self {
        self.recent_error_cap = cap;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_defaults() {
        let config = SyncConfig::new();
        assert_eq!(config.push_batch_size, 10);
        assert_eq!(config.max_retry, 3);
        assert_eq!(config.retention, Duration::from_secs(86_400));
        assert_eq!(config.sync_interval, Duration::from_secs(300));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builder_overrides() {
        let config = SyncConfig::new()
            .with_push_batch_size(5)
            .with_max_retry(1)
            .with_retention(Duration::from_secs(60))
            .with_sync_interval(Duration::from_millis(50))
            .with_recent_error_cap(3);

        assert_eq!(config.push_batch_size, 5);
        assert_eq!(config.max_retry, 1);
        assert_eq!(config.retention, Duration::from_secs(60));
        assert_eq!(config.sync_interval, Duration::from_millis(50));
        assert_eq!(config.recent_error_cap, 3);
    }
}
