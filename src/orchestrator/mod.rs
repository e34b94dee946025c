//! Fallback Orchestrator
//!
//! The top-level routing algorithm. For each request it walks the
//! priority-ordered provider list for the task type, skipping providers that
//! are unhealthy, locked out, or out of rate-limit tokens, drives the retry
//! executor for each candidate, and moves to the next provider on failure.
//! Providers are tried strictly sequentially, never raced in parallel, to
//! avoid duplicate billable side effects and to preserve priority ordering.
//!
//! Every collaborator (registry, health tracker, rate limiter, provider
//! adapters) is injected at construction, so tests can use isolated
//! instances per case.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use genroute::prelude::*;
//!
//! # async fn example(hf: Arc<dyn GenerationCapability>) -> Result<(), RouteError> {
//! let registry = ProviderRegistry::builder()
//!     .provider(ProviderConfig::new(ProviderId::Huggingface).with_priority(10))
//!     .default_routes()
//!     .build();
//!
//! let router = Router::builder()
//!     .registry(registry)
//!     .provider(ProviderId::Huggingface, hf)
//!     .build()?;
//!
//! let request = GenerationRequest::from_pairs(
//!     TaskType::TextToImage,
//!     [("prompt", serde_json::json!("a lighthouse at dusk"))],
//! );
//! let (result, notification) = router.generate(&request).await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{RouteError, RouteResult};
use crate::health::HealthTracker;
use crate::limiter::{DEFAULT_LOCKOUT, RateLimiter};
use crate::notify;
use crate::params::ParameterValidator;
use crate::registry::ProviderRegistry;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::traits::GenerationCapability;
use crate::types::{
    FallbackExecution, GenerationRequest, GenerationResult, HealthStatus, ProviderId, TaskType,
};

/// Tuning knobs for the router.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Retry policy applied per provider.
    pub retry_policy: RetryPolicy,
    /// Fixed delay between providers after a failure, independent of retry
    /// backoff. Avoids thrashing the next provider.
    pub provider_delay: Duration,
    /// When false, stop after the first provider instead of falling back.
    pub fallback_enabled: bool,
    /// When true, wait for a rate-limit token instead of skipping a
    /// token-dry provider.
    pub block_on_rate_limit: bool,
    /// Optional end-to-end deadline across the whole fallback chain.
    pub overall_deadline: Option<Duration>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            provider_delay: Duration::from_secs(1),
            fallback_enabled: true,
            block_on_rate_limit: false,
            overall_deadline: None,
        }
    }
}

/// Provider routing engine with automatic fallback.
pub struct Router {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthTracker>,
    limiter: Arc<RateLimiter>,
    providers: HashMap<ProviderId, Arc<dyn GenerationCapability>>,
    options: RouterOptions,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Generate with automatic provider selection and fallback.
    ///
    /// Validates parameters through the shared [`ParameterValidator`] before
    /// any provider is contacted; an invalid request fails fast with zero
    /// providers attempted. Returns the result together with an optional
    /// user-facing notification when a fallback occurred.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> (GenerationResult, Option<String>) {
        self.generate_cancellable(request, CancellationToken::new())
            .await
    }

    /// [`Self::generate`] with caller-controlled cancellation.
    pub async fn generate_cancellable(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> (GenerationResult, Option<String>) {
        if let Err(error) = ParameterValidator::validate(request.task_type, &request.parameters) {
            tracing::warn!(
                task = %request.task_type,
                error = %error,
                "parameter validation failed"
            );
            return (GenerationResult::failure(error.to_string()), None);
        }

        let execution = self.execute_cancellable(request, cancel).await;
        let notification = notify::fallback_message(&execution);
        (execution.result, notification)
    }

    /// Run the fallback chain and return the full execution record.
    ///
    /// Unlike [`Self::generate`], this does not run the shared validator
    /// first; each selected provider's own `validate_params` is still
    /// consulted and an invalid verdict aborts the whole call.
    pub async fn execute(&self, request: &GenerationRequest) -> FallbackExecution {
        self.execute_cancellable(request, CancellationToken::new())
            .await
    }

    /// [`Self::execute`] with caller-controlled cancellation. Cancellation
    /// propagates into whichever provider call or sleep is currently
    /// suspended and prevents further fallback attempts.
    pub async fn execute_cancellable(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> FallbackExecution {
        let task = request.task_type;
        let candidates = self.registry.providers_for(task);

        if candidates.is_empty() {
            return FallbackExecution::unattempted(GenerationResult::failure(
                "no providers available for this task type",
            ));
        }

        let deadline = self.options.overall_deadline.map(|d| Instant::now() + d);
        let executor = RetryExecutor::new(self.options.retry_policy.clone());

        let mut attempted: Vec<ProviderId> = Vec::new();
        let mut attempt_log = Vec::new();
        let mut original_provider: Option<ProviderId> = None;
        let mut last_error: Option<RouteError> = None;

        for (index, &provider) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                last_error = Some(RouteError::Cancelled);
                break;
            }
            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                last_error = Some(RouteError::DeadlineExceeded(
                    self.options.overall_deadline.unwrap_or_default(),
                ));
                break;
            }

            let Some(adapter) = self.providers.get(&provider) else {
                tracing::warn!(provider = %provider, "provider not registered, skipping");
                continue;
            };
            if !adapter.supports_task(task) {
                tracing::debug!(provider = %provider, task = %task, "task unsupported, skipping");
                continue;
            }
            if !self.health.is_eligible(provider) {
                tracing::debug!(provider = %provider, "provider unhealthy, skipping");
                continue;
            }
            if self.limiter.is_locked_out(provider) {
                tracing::debug!(provider = %provider, "provider locked out, skipping");
                continue;
            }
            if !self.limiter.try_acquire(provider, 1) {
                if self.options.block_on_rate_limit {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            last_error = Some(RouteError::Cancelled);
                            break;
                        }
                        _ = self.limiter.await_token(provider) => {}
                    }
                } else {
                    tracing::debug!(provider = %provider, "no rate-limit token, skipping");
                    continue;
                }
            }

            // A parameter the selected provider rejects is a caller problem,
            // not a provider problem: abort the whole call.
            if let Err(error) = adapter.validate_params(task, &request.parameters).await {
                tracing::warn!(
                    provider = %provider,
                    error = %error,
                    "provider rejected parameters, aborting"
                );
                return FallbackExecution {
                    result: GenerationResult::failure(format!(
                        "parameter validation failed: {error}"
                    )),
                    providers_attempted: attempted,
                    original_provider,
                    attempt_log,
                };
            }

            original_provider.get_or_insert(provider);
            attempted.push(provider);
            tracing::info!(provider = %provider, task = %task, "routing to provider");

            let call = executor.execute_cancellable(
                || adapter.generate(task, &request.parameters),
                &cancel,
            );
            let (outcome, report) = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline.into(), call).await {
                        Ok(result) => result,
                        Err(_) => {
                            last_error = Some(RouteError::DeadlineExceeded(
                                self.options.overall_deadline.unwrap_or_default(),
                            ));
                            break;
                        }
                    }
                }
                None => call.await,
            };
            if !report.attempts.is_empty() {
                attempt_log.push((provider, report.attempts));
            }

            match outcome {
                Ok(output) => {
                    self.health.record_success(provider);
                    let fallback_used = original_provider != Some(provider);

                    let mut result = GenerationResult::success(provider, output);
                    if result.model.is_none() {
                        result.model = self
                            .registry
                            .default_model(task, provider)
                            .map(str::to_string);
                    }
                    result.fallback_used = fallback_used;
                    if fallback_used {
                        result.fallback_from = original_provider;
                        if let Some(from) = original_provider {
                            tracing::info!(from = %from, to = %provider, "fallback succeeded");
                        }
                    }

                    return FallbackExecution {
                        result,
                        providers_attempted: attempted,
                        original_provider,
                        attempt_log,
                    };
                }
                Err(RouteError::Cancelled) => {
                    last_error = Some(RouteError::Cancelled);
                    break;
                }
                Err(error) => {
                    self.health.record_failure(provider);
                    tracing::warn!(
                        provider = %provider,
                        kind = error.kind(),
                        error = %error,
                        "provider failed"
                    );

                    if error.is_rate_limit() {
                        let lockout = error.retry_after().unwrap_or(DEFAULT_LOCKOUT);
                        self.limiter.set_lockout(provider, lockout);
                    }
                    last_error = Some(error);

                    if !self.options.fallback_enabled {
                        break;
                    }
                    // Fixed inter-provider delay to avoid thrashing the next
                    // candidate.
                    let more_candidates = index + 1 < candidates.len();
                    if more_candidates && !self.options.provider_delay.is_zero() {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                last_error = Some(RouteError::Cancelled);
                                break;
                            }
                            _ = tokio::time::sleep(self.options.provider_delay) => {}
                        }
                    }
                }
            }
        }

        let message = match (&last_error, attempted.is_empty()) {
            (Some(RouteError::Cancelled), _) => "request cancelled".to_string(),
            (Some(error), true) => format!("no providers could be attempted; last error: {error}"),
            (None, true) => {
                "no eligible providers available (unhealthy, locked out, or rate limited)"
                    .to_string()
            }
            (Some(error), false) => format!(
                "all providers failed; last error: {error}; attempted: [{}]",
                attempted
                    .iter()
                    .map(ProviderId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            (None, false) => "all providers failed".to_string(),
        };
        tracing::error!(task = %task, attempted = ?attempted, "fallback chain exhausted");

        FallbackExecution {
            result: GenerationResult::failure(message),
            providers_attempted: attempted,
            original_provider,
            attempt_log,
        }
    }

    /// Current health status of every registered provider, for operational
    /// dashboards.
    pub fn provider_status(&self) -> HashMap<ProviderId, HealthStatus> {
        self.providers
            .keys()
            .map(|p| (*p, self.health.status(*p)))
            .collect()
    }

    /// Providers that could serve a task right now: routed, registered, and
    /// claiming support.
    pub fn available_providers(&self, task: TaskType) -> Vec<ProviderId> {
        self.registry
            .providers_for(task)
            .iter()
            .copied()
            .filter(|p| {
                self.providers
                    .get(p)
                    .is_some_and(|adapter| adapter.supports_task(task))
            })
            .collect()
    }

    /// Run each registered provider's health probe once and feed the outcome
    /// into the health tracker. Returns the probe results. Scheduling
    /// periodic probes is the caller's concern.
    pub async fn refresh_health(&self) -> HashMap<ProviderId, bool> {
        let mut results = HashMap::new();
        for (provider, adapter) in &self.providers {
            let healthy = adapter.health_check().await;
            if healthy {
                self.health.record_success(*provider);
            } else {
                self.health.record_failure(*provider);
            }
            tracing::info!(provider = %provider, healthy, "health probe");
            results.insert(*provider, healthy);
        }
        results
    }

    /// The injected health tracker (shared with any external probes).
    pub fn health_tracker(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    /// The injected rate limiter.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

/// Builder for [`Router`].
#[derive(Default)]
pub struct RouterBuilder {
    registry: Option<Arc<ProviderRegistry>>,
    health: Option<Arc<HealthTracker>>,
    limiter: Option<Arc<RateLimiter>>,
    providers: HashMap<ProviderId, Arc<dyn GenerationCapability>>,
    options: RouterOptions,
}

impl RouterBuilder {
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    pub fn registry_shared(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Inject a health tracker (e.g. one shared with external probes).
    /// A fresh tracker is created when omitted.
    pub fn health_tracker(mut self, health: Arc<HealthTracker>) -> Self {
        self.health = Some(health);
        self
    }

    /// Inject a rate limiter. When omitted, buckets are built from the
    /// registry's per-provider rate-limit configuration.
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Register a provider adapter.
    pub fn provider(
        mut self,
        provider: ProviderId,
        adapter: Arc<dyn GenerationCapability>,
    ) -> Self {
        self.providers.insert(provider, adapter);
        self
    }

    pub fn options(mut self, options: RouterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.options.retry_policy = policy;
        self
    }

    pub fn provider_delay(mut self, delay: Duration) -> Self {
        self.options.provider_delay = delay;
        self
    }

    pub fn fallback_enabled(mut self, enabled: bool) -> Self {
        self.options.fallback_enabled = enabled;
        self
    }

    pub fn overall_deadline(mut self, deadline: Duration) -> Self {
        self.options.overall_deadline = Some(deadline);
        self
    }

    pub fn build(self) -> RouteResult<Router> {
        let registry = self
            .registry
            .ok_or_else(|| RouteError::Configuration("router requires a provider registry".into()))?;
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::from_registry(&registry)));
        Ok(Router {
            health: self.health.unwrap_or_default(),
            limiter,
            registry,
            providers: self.providers,
            options: self.options,
        })
    }
}
