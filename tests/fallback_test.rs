//! Fallback orchestration scenarios against mock providers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use genroute::prelude::*;

/// Mock provider that fails a configurable number of initial calls.
struct MockProvider {
    calls: AtomicU32,
    fail_first: u32,
    error: RouteError,
    reject_params: Option<String>,
}

impl MockProvider {
    fn succeeding() -> Self {
        Self::failing(0, RouteError::Internal("unused".into()))
    }

    fn failing(fail_first: u32, error: RouteError) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_first,
            error,
            reject_params: None,
        }
    }

    fn rejecting_params(reason: &str) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_first: 0,
            error: RouteError::Internal("unused".into()),
            reject_params: Some(reason.to_string()),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationCapability for MockProvider {
    fn supports_task(&self, _task_type: TaskType) -> bool {
        true
    }

    async fn validate_params(
        &self,
        _task_type: TaskType,
        _parameters: &Parameters,
    ) -> RouteResult<()> {
        match &self.reject_params {
            Some(reason) => Err(RouteError::InvalidParameter(reason.clone())),
            None => Ok(()),
        }
    }

    async fn generate(
        &self,
        _task_type: TaskType,
        _parameters: &Parameters,
    ) -> RouteResult<GenerationOutput> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_first {
            Err(self.error.clone())
        } else {
            Ok(GenerationOutput::new(json!({"ok": true})).with_model("mock-model"))
        }
    }
}

fn registry_for(providers: &[(ProviderId, u32)]) -> ProviderRegistry {
    let mut builder = ProviderRegistry::builder();
    for (provider, priority) in providers {
        builder = builder.provider(ProviderConfig::new(*provider).with_priority(*priority));
    }
    builder.default_routes().build()
}

fn fast_options() -> RouterOptions {
    RouterOptions {
        retry_policy: RetryPolicy::new()
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false),
        provider_delay: Duration::ZERO,
        ..RouterOptions::default()
    }
}

fn image_request(prompt: &str) -> GenerationRequest {
    GenerationRequest::from_pairs(TaskType::TextToImage, [("prompt", json!(prompt))])
}

#[tokio::test]
async fn scenario_a_falls_back_to_second_provider_after_timeouts() {
    let hf = Arc::new(MockProvider::failing(
        u32::MAX,
        RouteError::Timeout("no response".into()),
    ));
    let openai = Arc::new(MockProvider::succeeding());

    let router = Router::builder()
        .registry(registry_for(&[
            (ProviderId::Huggingface, 1),
            (ProviderId::Openai, 2),
        ]))
        .provider(ProviderId::Huggingface, hf.clone())
        .provider(ProviderId::Openai, openai.clone())
        .options(fast_options())
        .build()
        .unwrap();

    let execution = router.execute(&image_request("a cat")).await;

    assert!(execution.result.success);
    assert_eq!(execution.result.provider, Some(ProviderId::Openai));
    assert!(execution.result.fallback_used);
    assert_eq!(execution.result.fallback_from, Some(ProviderId::Huggingface));
    assert_eq!(
        execution.providers_attempted,
        vec![ProviderId::Huggingface, ProviderId::Openai]
    );
    // Three retry attempts against the primary, one call to the fallback.
    assert_eq!(hf.calls(), 3);
    assert_eq!(openai.calls(), 1);
}

#[tokio::test]
async fn scenario_b_validation_fails_fast_with_zero_attempts() {
    let minimax = Arc::new(MockProvider::succeeding());

    let router = Router::builder()
        .registry(registry_for(&[(ProviderId::Minimax, 1)]))
        .provider(ProviderId::Minimax, minimax.clone())
        .options(fast_options())
        .build()
        .unwrap();

    let request =
        GenerationRequest::from_pairs(TaskType::VoiceSynthesize, [("text", json!(""))]);
    let (result, notification) = router.generate(&request).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("text cannot be empty"));
    assert_eq!(notification, None);
    assert_eq!(minimax.calls(), 0);
}

#[tokio::test]
async fn scenario_c_non_retryable_error_exhausts_without_retries() {
    let suno = Arc::new(MockProvider::failing(
        u32::MAX,
        RouteError::api(400, "bad request"),
    ));

    let router = Router::builder()
        .registry(registry_for(&[(ProviderId::Suno, 1)]))
        .provider(ProviderId::Suno, suno.clone())
        .options(fast_options())
        .build()
        .unwrap();

    let request =
        GenerationRequest::from_pairs(TaskType::MusicGenerate, [("prompt", json!("lofi"))]);
    let execution = router.execute(&request).await;

    assert!(!execution.result.success);
    assert_eq!(execution.providers_attempted, vec![ProviderId::Suno]);
    // No retries beyond the initial non-retryable failure.
    assert_eq!(suno.calls(), 1);
    let error = execution.result.error.unwrap();
    assert!(error.contains("all providers failed"));
    assert!(error.contains("suno"));
}

#[tokio::test]
async fn scenario_d_rate_limit_locks_out_and_tries_next_provider() {
    let kling = Arc::new(MockProvider::failing(
        u32::MAX,
        RouteError::rate_limited("429 too many requests"),
    ));
    let jimeng = Arc::new(MockProvider::succeeding());

    let router = Router::builder()
        .registry(registry_for(&[
            (ProviderId::Kling, 1),
            (ProviderId::Jimeng, 2),
        ]))
        .provider(ProviderId::Kling, kling.clone())
        .provider(ProviderId::Jimeng, jimeng.clone())
        .options(fast_options())
        .build()
        .unwrap();

    let request = GenerationRequest::from_pairs(
        TaskType::ImageToVideo,
        [("prompt", json!("waves")), ("image", json!("img.png"))],
    );
    let execution = router.execute(&request).await;

    assert!(execution.result.success);
    assert_eq!(execution.result.provider, Some(ProviderId::Jimeng));
    // Exactly one call against kling: the rate limit aborted its retries.
    assert_eq!(kling.calls(), 1);
    assert!(router.rate_limiter().is_locked_out(ProviderId::Kling));
}

#[tokio::test]
async fn provider_delay_applies_after_rate_limited_provider() {
    let kling = Arc::new(MockProvider::failing(
        u32::MAX,
        RouteError::rate_limited("429 too many requests"),
    ));
    let jimeng = Arc::new(MockProvider::succeeding());

    let router = Router::builder()
        .registry(registry_for(&[
            (ProviderId::Kling, 1),
            (ProviderId::Jimeng, 2),
        ]))
        .provider(ProviderId::Kling, kling.clone())
        .provider(ProviderId::Jimeng, jimeng.clone())
        .options(RouterOptions {
            provider_delay: Duration::from_millis(50),
            ..fast_options()
        })
        .build()
        .unwrap();

    let request = GenerationRequest::from_pairs(
        TaskType::ImageToVideo,
        [("prompt", json!("waves")), ("image", json!("img.png"))],
    );
    let start = std::time::Instant::now();
    let execution = router.execute(&request).await;

    assert!(execution.result.success);
    assert_eq!(execution.result.provider, Some(ProviderId::Jimeng));
    // The fixed inter-provider delay runs even when the previous provider
    // failed with a rate limit.
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(kling.calls(), 1);
}

#[tokio::test]
async fn success_on_first_provider_reports_no_fallback() {
    let hf = Arc::new(MockProvider::succeeding());
    let openai = Arc::new(MockProvider::succeeding());

    let router = Router::builder()
        .registry(registry_for(&[
            (ProviderId::Huggingface, 1),
            (ProviderId::Openai, 2),
        ]))
        .provider(ProviderId::Huggingface, hf.clone())
        .provider(ProviderId::Openai, openai.clone())
        .options(fast_options())
        .build()
        .unwrap();

    let (result, notification) = router.generate(&image_request("a dog")).await;

    assert!(result.success);
    assert_eq!(result.provider, Some(ProviderId::Huggingface));
    assert!(!result.fallback_used);
    assert_eq!(result.fallback_from, None);
    assert_eq!(notification, None);
    assert_eq!(openai.calls(), 0);
}

#[tokio::test]
async fn notification_names_both_providers_on_fallback() {
    let hf = Arc::new(MockProvider::failing(
        u32::MAX,
        RouteError::Connection("refused".into()),
    ));
    let openai = Arc::new(MockProvider::succeeding());

    let router = Router::builder()
        .registry(registry_for(&[
            (ProviderId::Huggingface, 1),
            (ProviderId::Openai, 2),
        ]))
        .provider(ProviderId::Huggingface, hf)
        .provider(ProviderId::Openai, openai)
        .options(fast_options())
        .build()
        .unwrap();

    let (result, notification) = router.generate(&image_request("a fox")).await;

    assert!(result.success);
    let message = notification.expect("fallback must produce a notification");
    assert!(message.contains("HuggingFace"));
    assert!(message.contains("OpenAI"));
}

#[tokio::test]
async fn unhealthy_provider_is_skipped_until_success_recorded() {
    let hf = Arc::new(MockProvider::succeeding());
    let openai = Arc::new(MockProvider::succeeding());

    let router = Router::builder()
        .registry(registry_for(&[
            (ProviderId::Huggingface, 1),
            (ProviderId::Openai, 2),
        ]))
        .provider(ProviderId::Huggingface, hf.clone())
        .provider(ProviderId::Openai, openai.clone())
        .options(fast_options())
        .build()
        .unwrap();

    // Three consecutive failures exclude the provider from routing.
    for _ in 0..3 {
        router.health_tracker().record_failure(ProviderId::Huggingface);
    }
    assert_eq!(
        router.provider_status()[&ProviderId::Huggingface],
        HealthStatus::Unhealthy
    );

    let execution = router.execute(&image_request("a bird")).await;
    assert!(execution.result.success);
    assert_eq!(execution.result.provider, Some(ProviderId::Openai));
    assert_eq!(hf.calls(), 0);

    // A recorded success restores eligibility.
    router.health_tracker().record_success(ProviderId::Huggingface);
    let execution = router.execute(&image_request("a bird")).await;
    assert_eq!(execution.result.provider, Some(ProviderId::Huggingface));
    assert_eq!(hf.calls(), 1);
}

#[tokio::test]
async fn provider_param_rejection_aborts_whole_call() {
    let hf = Arc::new(MockProvider::rejecting_params("resolution not supported"));
    let openai = Arc::new(MockProvider::succeeding());

    let router = Router::builder()
        .registry(registry_for(&[
            (ProviderId::Huggingface, 1),
            (ProviderId::Openai, 2),
        ]))
        .provider(ProviderId::Huggingface, hf.clone())
        .provider(ProviderId::Openai, openai.clone())
        .options(fast_options())
        .build()
        .unwrap();

    let execution = router.execute(&image_request("a whale")).await;

    assert!(!execution.result.success);
    assert!(
        execution
            .result
            .error
            .unwrap()
            .contains("parameter validation failed")
    );
    // A parameter problem is not provider-specific: nothing is tried.
    assert_eq!(hf.calls(), 0);
    assert_eq!(openai.calls(), 0);
}

#[tokio::test]
async fn empty_route_fails_immediately() {
    let router = Router::builder()
        .registry(ProviderRegistry::builder().build())
        .options(fast_options())
        .build()
        .unwrap();

    let execution = router.execute(&image_request("anything")).await;

    assert!(!execution.result.success);
    assert_eq!(
        execution.result.error.as_deref(),
        Some("no providers available for this task type")
    );
    assert!(execution.providers_attempted.is_empty());
}

#[tokio::test]
async fn exhaustion_reports_attempted_providers_and_last_error() {
    let hf = Arc::new(MockProvider::failing(
        u32::MAX,
        RouteError::Timeout("slow".into()),
    ));
    let openai = Arc::new(MockProvider::failing(
        u32::MAX,
        RouteError::api(500, "exploded"),
    ));

    let router = Router::builder()
        .registry(registry_for(&[
            (ProviderId::Huggingface, 1),
            (ProviderId::Openai, 2),
        ]))
        .provider(ProviderId::Huggingface, hf)
        .provider(ProviderId::Openai, openai)
        .options(fast_options())
        .build()
        .unwrap();

    let execution = router.execute(&image_request("a moth")).await;

    assert!(!execution.result.success);
    assert_eq!(
        execution.providers_attempted,
        vec![ProviderId::Huggingface, ProviderId::Openai]
    );
    let error = execution.result.error.unwrap();
    assert!(error.contains("exploded"));
    assert!(error.contains("huggingface"));
    assert!(error.contains("openai"));
    // Both providers contributed retry history.
    assert_eq!(execution.attempt_log.len(), 2);
}

#[tokio::test]
async fn attempt_log_records_error_kinds() {
    let hf = Arc::new(MockProvider::failing(
        u32::MAX,
        RouteError::Timeout("slow".into()),
    ));
    let openai = Arc::new(MockProvider::succeeding());

    let router = Router::builder()
        .registry(registry_for(&[
            (ProviderId::Huggingface, 1),
            (ProviderId::Openai, 2),
        ]))
        .provider(ProviderId::Huggingface, hf)
        .provider(ProviderId::Openai, openai)
        .options(fast_options())
        .build()
        .unwrap();

    let execution = router.execute(&image_request("a crane")).await;

    let (provider, attempts) = &execution.attempt_log[0];
    assert_eq!(*provider, ProviderId::Huggingface);
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|a| a.error_kind == "timeout"));
}
