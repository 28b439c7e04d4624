//! Per-query cache policy

use std::time::Duration;
use trakure_core::config::QueryConfig;

/// Cache policy for one query key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long fetched data is served without refetching
    pub stale_time: Duration,
    /// Background refetch period while subscribed; `None` disables it
    pub refetch_interval: Option<Duration>,
    /// How long an unsubscribed entry stays cached
    pub gc_time: Duration,
    /// Retries after a transient failure
    pub retry: u32,
    /// Delay before the first retry
    pub retry_delay: Duration,
    /// Upper bound on the retry delay
    pub max_retry_delay: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from(&QueryConfig::default())
    }
}

impl From<&QueryConfig> for QueryOptions {
    fn from(config: &QueryConfig) -> Self {
        Self {
            stale_time: Duration::from_millis(config.stale_time_ms),
            refetch_interval: None,
            gc_time: Duration::from_millis(config.gc_time_ms),
            retry: config.retry,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            max_retry_delay: Duration::from_millis(config.max_retry_delay_ms),
        }
    }
}

impl QueryOptions {
    /// Set the fresh window
    #[must_use]
    pub const fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// Refetch periodically while subscribed; a zero period disables it
    #[must_use]
    pub const fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = if interval.is_zero() {
            None
        } else {
            Some(interval)
        };
        self
    }

    /// Set the eviction delay
    #[must_use]
    pub const fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }

    /// Set the retry count
    #[must_use]
    pub const fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Set the base retry delay
    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Delay before retry number `attempt + 1`: doubles each time, capped.
    #[must_use]
    pub fn retry_delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.retry_delay
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_follow_config() {
        let options = QueryOptions::default();

        assert_eq!(options.stale_time, Duration::from_secs(30));
        assert_eq!(options.gc_time, Duration::from_secs(300));
        assert_eq!(options.retry, 3);
        assert!(options.refetch_interval.is_none());
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let options = QueryOptions::default().with_retry_delay(Duration::from_secs(1));

        assert_eq!(options.retry_delay_for(0), Duration::from_secs(1));
        assert_eq!(options.retry_delay_for(1), Duration::from_secs(2));
        assert_eq!(options.retry_delay_for(3), Duration::from_secs(8));
        assert_eq!(options.retry_delay_for(10), Duration::from_secs(30));
        assert_eq!(options.retry_delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_refetch_interval_disables_timer() {
        let options = QueryOptions::default()
            .with_refetch_interval(Duration::from_secs(5))
            .with_refetch_interval(Duration::ZERO);

        assert!(options.refetch_interval.is_none());
    }
}
