//! Rate Limiting
//!
//! Per-provider token buckets guarding outbound call rate, plus a separate
//! time-boxed lockout set when an upstream explicitly signals rate limiting.
//! The lockout is independent of the bucket: a provider under lockout is
//! skipped by the orchestrator until the window passes, regardless of how
//! many tokens its bucket holds.
//!
//! Bucket state is guarded by a per-provider mutex held only across the
//! check-and-update, never across an await. Token counts always stay within
//! `[0, burst]`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::registry::{ProviderRegistry, RateLimitConfig};
use crate::types::ProviderId;

/// Default lockout applied on an explicit rate-limit signal without a
/// Retry-After hint.
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct Bucket {
    tokens: f64,
    last_update: Instant,
    rate: f64,
    period_secs: f64,
    burst: f64,
}

impl Bucket {
    fn new(config: &RateLimitConfig) -> Self {
        let burst = f64::from(config.burst.max(1));
        Self {
            tokens: burst,
            last_update: Instant::now(),
            rate: f64::from(config.rate),
            period_secs: config.period.as_secs_f64().max(f64::EPSILON),
            burst,
        }
    }

    fn try_acquire(&mut self, tokens: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        self.tokens = (self.tokens + elapsed * self.rate / self.period_secs).min(self.burst);

        if self.tokens >= tokens {
            self.tokens -= tokens;
            true
        } else {
            false
        }
    }
}

/// Token-bucket rate limiter with per-provider lockout windows.
pub struct RateLimiter {
    buckets: HashMap<ProviderId, Mutex<Bucket>>,
    lockouts: Mutex<HashMap<ProviderId, Instant>>,
}

impl RateLimiter {
    /// Limiter with no buckets configured; every acquire succeeds until a
    /// provider is configured. Lockouts still apply.
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            lockouts: Mutex::new(HashMap::new()),
        }
    }

    /// Build buckets for every provider registered in the given registry.
    pub fn from_registry(registry: &ProviderRegistry) -> Self {
        let mut limiter = Self::new();
        for provider in registry.provider_ids() {
            if let Some(config) = registry.config(provider) {
                limiter.configure(provider, &config.rate_limit);
            }
        }
        limiter
    }

    /// Install (or replace) the bucket for one provider.
    pub fn configure(&mut self, provider: ProviderId, config: &RateLimitConfig) {
        self.buckets.insert(provider, Mutex::new(Bucket::new(config)));
    }

    /// Atomically check-and-decrement the provider's bucket.
    ///
    /// Providers without a configured bucket are unlimited.
    pub fn try_acquire(&self, provider: ProviderId, tokens: u32) -> bool {
        let Some(bucket) = self.buckets.get(&provider) else {
            return true;
        };
        let mut bucket = bucket.lock().expect("rate limiter bucket poisoned");
        bucket.try_acquire(f64::from(tokens), Instant::now())
    }

    /// Poll [`Self::try_acquire`] until a token is available. Only used when
    /// the caller opts into blocking rather than failing over.
    pub async fn await_token(&self, provider: ProviderId) {
        while !self.try_acquire(provider, 1) {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Place a provider under a lockout window after an explicit upstream
    /// rate-limit signal.
    pub fn set_lockout(&self, provider: ProviderId, duration: Duration) {
        let until = Instant::now() + duration;
        self.lockouts
            .lock()
            .expect("rate limiter lockout map poisoned")
            .insert(provider, until);
        tracing::warn!(
            provider = %provider,
            lockout_secs = duration.as_secs(),
            "provider locked out after rate-limit signal"
        );
    }

    /// Whether the provider's lockout window is still active.
    pub fn is_locked_out(&self, provider: ProviderId) -> bool {
        let mut lockouts = self
            .lockouts
            .lock()
            .expect("rate limiter lockout map poisoned");
        match lockouts.get(&provider) {
            Some(until) if Instant::now() < *until => true,
            Some(_) => {
                lockouts.remove(&provider);
                false
            }
            None => false,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter_with(provider: ProviderId, config: RateLimitConfig) -> RateLimiter {
        let mut limiter = RateLimiter::new();
        limiter.configure(provider, &config);
        limiter
    }

    #[test]
    fn burst_capacity_is_honored() {
        let limiter = limiter_with(
            ProviderId::Kling,
            RateLimitConfig {
                rate: 60,
                period: Duration::from_secs(60),
                burst: 3,
            },
        );

        assert!(limiter.try_acquire(ProviderId::Kling, 1));
        assert!(limiter.try_acquire(ProviderId::Kling, 1));
        assert!(limiter.try_acquire(ProviderId::Kling, 1));
        // Bucket drained; refill of 1/s cannot restore a token instantly.
        assert!(!limiter.try_acquire(ProviderId::Kling, 1));
    }

    #[test]
    fn unconfigured_provider_is_unlimited() {
        let limiter = RateLimiter::new();
        for _ in 0..1000 {
            assert!(limiter.try_acquire(ProviderId::Openai, 1));
        }
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = limiter_with(
            ProviderId::Suno,
            RateLimitConfig {
                rate: 1000,
                period: Duration::from_secs(1),
                burst: 1,
            },
        );
        assert!(limiter.try_acquire(ProviderId::Suno, 1));
        assert!(!limiter.try_acquire(ProviderId::Suno, 1));
        std::thread::sleep(Duration::from_millis(10));
        // 1000 tokens/s restores the single-token burst within 10ms.
        assert!(limiter.try_acquire(ProviderId::Suno, 1));
    }

    #[test]
    fn lockout_expires() {
        let limiter = RateLimiter::new();
        limiter.set_lockout(ProviderId::Vidu, Duration::from_millis(20));
        assert!(limiter.is_locked_out(ProviderId::Vidu));
        std::thread::sleep(Duration::from_millis(30));
        assert!(!limiter.is_locked_out(ProviderId::Vidu));
        // Expired entry is dropped.
        assert!(!limiter.is_locked_out(ProviderId::Vidu));
    }

    #[tokio::test]
    async fn await_token_eventually_succeeds() {
        let limiter = limiter_with(
            ProviderId::Minimax,
            RateLimitConfig {
                rate: 20,
                period: Duration::from_secs(1),
                burst: 1,
            },
        );
        assert!(limiter.try_acquire(ProviderId::Minimax, 1));
        // 20 tokens/s: a token is back within ~50ms, inside the poll loop.
        tokio::time::timeout(Duration::from_secs(2), limiter.await_token(ProviderId::Minimax))
            .await
            .expect("token should become available");
    }
}
