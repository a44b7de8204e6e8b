//! Per-domain failure streaks.

use std::collections::HashMap;

use kontrol_core::gateway::InvocationError;
use kontrol_core::snapshot::Domain;

#[derive(Debug)]
pub(crate) struct FailureStreaks {
    threshold: u32,
    streaks: HashMap<Domain, u32>,
}

impl FailureStreaks {
    pub(crate) fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            streaks: HashMap::new(),
        }
    }

    pub(crate) fn record_failure(&mut self, domain: Domain, error: &InvocationError) {
        let streak = self.streaks.entry(domain).or_insert(0);
        *streak += 1;

        match error {
            _ if error.is_configuration() => {
                if *streak == 1 {
                    tracing::error!(
                        domain = %domain,
                        "[SyncAggregator] {} cannot be fetched until settings change: {}",
                        domain,
                        error
                    );
                } else {
                    tracing::debug!(domain = %domain, "[SyncAggregator] {} still misconfigured", domain);
                }
                return;
            }
            InvocationError::Protocol { .. } => tracing::error!(
                domain = %domain,
                "[SyncAggregator] {} response shape changed: {}",
                domain,
                error
            ),
            _ => tracing::warn!(
                domain = %domain,
                kind = %error.kind(),
                "[SyncAggregator] {} fetch failed: {}",
                domain,
                error
            ),
        }

        if *streak == self.threshold {
            tracing::error!(
                domain = %domain,
                "[SyncAggregator] {} has failed {} consecutive ticks; last error: {}",
                domain,
                streak,
                error
            );
        }
    }

    pub(crate) fn record_success(&mut self, domain: Domain) {
        if let Some(streak) = self.streaks.remove(&domain)
            && streak >= self.threshold
        {
            tracing::info!(
                domain = %domain,
                "[SyncAggregator] {} recovered after {} failed ticks",
                domain,
                streak
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn streak(&self, domain: Domain) -> u32 {
        self.streaks.get(&domain).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streak_counts_and_resets() {
        let mut streaks = FailureStreaks::new(2);
        let err = InvocationError::network("refused");

        streaks.record_failure(Domain::Jobs, &err);
        streaks.record_failure(Domain::Jobs, &err);
        streaks.record_failure(Domain::Jobs, &err);
        assert_eq!(streaks.streak(Domain::Jobs), 3);
        assert_eq!(streaks.streak(Domain::Config), 0);

        streaks.record_success(Domain::Jobs);
        assert_eq!(streaks.streak(Domain::Jobs), 0);
    }

    #[test]
    fn test_configuration_failures_still_count() {
        let mut streaks = FailureStreaks::new(2);
        let err = InvocationError::invalid_address("unsupported gateway scheme 'ftp'");
        for _ in 0..3 {
            streaks.record_failure(Domain::Status, &err);
        }
        assert_eq!(streaks.streak(Domain::Status), 3);
    }
}
