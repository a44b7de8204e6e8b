use std::time::Duration;

use kontrol_core::fingerprint::SessionFingerprintFields;

/// Period between scheduled ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Shortest accepted period; shorter intervals are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Consecutive failed ticks after which a domain's failures are escalated in the log.
pub const DEFAULT_PERSISTENT_FAILURE_THRESHOLD: u32 = 10;

/// Tuning for [`SyncAggregator`](super::SyncAggregator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    pub session_fingerprint: SessionFingerprintFields,
    pub persistent_failure_threshold: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            session_fingerprint: SessionFingerprintFields::default(),
            persistent_failure_threshold: DEFAULT_PERSISTENT_FAILURE_THRESHOLD,
        }
    }
}

impl SyncConfig {
    /// Sets the tick period, raised to [`MIN_POLL_INTERVAL`] if shorter.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// The period the loop actually runs at, even if `poll_interval` was set directly.
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }

    pub fn with_session_fingerprint(mut self, fields: SessionFingerprintFields) -> Self {
        self.session_fingerprint = fields;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_is_raised_to_minimum() {
        let config = SyncConfig::default().with_poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval, MIN_POLL_INTERVAL);

        let direct = SyncConfig {
            poll_interval: Duration::ZERO,
            ..SyncConfig::default()
        };
        assert_eq!(direct.effective_poll_interval(), MIN_POLL_INTERVAL);
        assert_eq!(
            SyncConfig::default().effective_poll_interval(),
            DEFAULT_POLL_INTERVAL
        );
    }
}
