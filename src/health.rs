//! Provider Health Tracking
//!
//! Per-provider rolling failure counters shared by every concurrent request
//! targeting the same provider. Status is a pure function of the counter
//! (see [`HealthStatus::from_consecutive_failures`]): 0 is Healthy, 1–2 is
//! Degraded, 3 or more is Unhealthy. An Unhealthy provider is excluded from
//! new fallback attempts until a success is recorded for it; there is no
//! timer-based healing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::{HealthStatus, ProviderId};

/// Tracks consecutive failures per provider. All mutations are atomic.
pub struct HealthTracker {
    failures: HashMap<ProviderId, AtomicU32>,
}

impl HealthTracker {
    /// Tracker covering every known provider, all starting Healthy.
    pub fn new() -> Self {
        Self {
            failures: ProviderId::ALL
                .iter()
                .map(|p| (*p, AtomicU32::new(0)))
                .collect(),
        }
    }

    /// A success decrements the failure count, floored at zero. The provider
    /// is Healthy again once the count reaches zero.
    pub fn record_success(&self, provider: ProviderId) {
        let counter = &self.failures[&provider];
        let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            n.checked_sub(1)
        });
        tracing::debug!(
            provider = %provider,
            consecutive_failures = counter.load(Ordering::Acquire),
            "provider success recorded"
        );
    }

    /// A failure increments the failure count.
    pub fn record_failure(&self, provider: ProviderId) {
        let failures = self.failures[&provider].fetch_add(1, Ordering::AcqRel) + 1;
        let status = HealthStatus::from_consecutive_failures(failures);
        if status == HealthStatus::Unhealthy {
            tracing::warn!(
                provider = %provider,
                consecutive_failures = failures,
                "provider marked unhealthy"
            );
        } else {
            tracing::debug!(
                provider = %provider,
                consecutive_failures = failures,
                "provider failure recorded"
            );
        }
    }

    /// Current status for a provider.
    pub fn status(&self, provider: ProviderId) -> HealthStatus {
        HealthStatus::from_consecutive_failures(self.failures[&provider].load(Ordering::Acquire))
    }

    /// Whether the provider may receive new fallback attempts.
    /// True unless Unhealthy.
    pub fn is_eligible(&self, provider: ProviderId) -> bool {
        self.status(provider) != HealthStatus::Unhealthy
    }

    /// Point-in-time status of every tracked provider.
    pub fn snapshot(&self) -> HashMap<ProviderId, HealthStatus> {
        self.failures
            .keys()
            .map(|p| (*p, self.status(*p)))
            .collect()
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_failures_make_unhealthy() {
        let tracker = HealthTracker::new();
        let p = ProviderId::Kling;

        assert!(tracker.is_eligible(p));
        tracker.record_failure(p);
        assert_eq!(tracker.status(p), HealthStatus::Degraded);
        assert!(tracker.is_eligible(p));
        tracker.record_failure(p);
        tracker.record_failure(p);
        assert_eq!(tracker.status(p), HealthStatus::Unhealthy);
        assert!(!tracker.is_eligible(p));
    }

    #[test]
    fn success_decrements_with_floor_zero() {
        let tracker = HealthTracker::new();
        let p = ProviderId::Suno;

        tracker.record_failure(p);
        tracker.record_failure(p);
        tracker.record_failure(p);
        assert_eq!(tracker.status(p), HealthStatus::Unhealthy);

        tracker.record_success(p);
        assert_eq!(tracker.status(p), HealthStatus::Degraded);
        assert!(tracker.is_eligible(p));

        tracker.record_success(p);
        tracker.record_success(p);
        assert_eq!(tracker.status(p), HealthStatus::Healthy);

        // Floor at zero.
        tracker.record_success(p);
        assert_eq!(tracker.status(p), HealthStatus::Healthy);
    }

    #[test]
    fn providers_are_tracked_independently() {
        let tracker = HealthTracker::new();
        tracker.record_failure(ProviderId::Openai);
        assert_eq!(tracker.status(ProviderId::Openai), HealthStatus::Degraded);
        assert_eq!(tracker.status(ProviderId::Huggingface), HealthStatus::Healthy);
    }

    #[test]
    fn snapshot_covers_all_providers() {
        let tracker = HealthTracker::new();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), ProviderId::ALL.len());
        assert!(snapshot.values().all(|s| *s == HealthStatus::Healthy));
    }

    #[test]
    fn concurrent_mutation_is_consistent() {
        use std::sync::Arc;
        let tracker = Arc::new(HealthTracker::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let t = tracker.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    t.record_failure(ProviderId::Vidu);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tracker.status(ProviderId::Vidu), HealthStatus::Unhealthy);
        for _ in 0..800 {
            tracker.record_success(ProviderId::Vidu);
        }
        assert_eq!(tracker.status(ProviderId::Vidu), HealthStatus::Healthy);
    }
}
