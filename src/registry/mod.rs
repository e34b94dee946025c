//! Provider Registry
//!
//! A configuration-driven registry that maps each task type to the ordered
//! list of providers eligible to serve it, plus per-provider configuration.
//! Built once at startup through [`RegistryBuilder`]; immutable thereafter,
//! so reads require no synchronization. The priority order is computed at
//! build time and never reordered at runtime (the orchestrator only filters
//! by enabled/health/rate state).

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::types::{ProviderId, TaskType};

/// Token-bucket parameters for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Tokens replenished per period.
    pub rate: u32,
    /// Replenishment period.
    pub period: Duration,
    /// Bucket capacity. Defaults to `rate`.
    pub burst: u32,
}

impl RateLimitConfig {
    /// `rate` requests per minute with burst equal to the rate.
    pub const fn per_minute(rate: u32) -> Self {
        Self {
            rate,
            period: Duration::from_secs(60),
            burst: rate,
        }
    }

    pub const fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Configuration for one provider. Created at startup, immutable thereafter.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: ProviderId,
    /// API endpoint, when the adapter needs one.
    pub endpoint: Option<String>,
    /// Credential reference (API key, token). Never logged.
    pub credentials: Option<SecretString>,
    /// Models this provider exposes, preferred first.
    pub models: Vec<String>,
    pub enabled: bool,
    /// Lower is tried first.
    pub priority: u32,
    pub rate_limit: RateLimitConfig,
    /// Per-call timeout enforced by the provider adapter.
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            endpoint: None,
            credentials: None,
            models: Vec::new(),
            enabled: true,
            priority: 100,
            rate_limit: RateLimitConfig::default(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(SecretString::from(credentials.into()));
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Immutable task-to-provider routing table plus provider configurations.
pub struct ProviderRegistry {
    configs: HashMap<ProviderId, ProviderConfig>,
    /// Enabled providers per task, ascending by priority. Computed once.
    routes: HashMap<TaskType, Vec<ProviderId>>,
}

impl ProviderRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Enabled providers for a task type, ascending by configured priority.
    pub fn providers_for(&self, task_type: TaskType) -> &[ProviderId] {
        self.routes.get(&task_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Configuration for a provider, when registered.
    pub fn config(&self, provider: ProviderId) -> Option<&ProviderConfig> {
        self.configs.get(&provider)
    }

    /// Default model for a provider on a task route (the first configured
    /// model), when the provider serves that task.
    pub fn default_model(&self, task_type: TaskType, provider: ProviderId) -> Option<&str> {
        if !self.providers_for(task_type).contains(&provider) {
            return None;
        }
        self.configs
            .get(&provider)
            .and_then(|c| c.models.first())
            .map(String::as_str)
    }

    /// All registered provider ids.
    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.configs.keys().copied().collect()
    }
}

/// Builder for [`ProviderRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    configs: HashMap<ProviderId, ProviderConfig>,
    routes: HashMap<TaskType, Vec<ProviderId>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a provider configuration.
    pub fn provider(mut self, config: ProviderConfig) -> Self {
        self.configs.insert(config.provider, config);
        self
    }

    /// Declare which providers may serve a task. Order here is irrelevant;
    /// the built registry orders by configured priority.
    pub fn route<I>(mut self, task_type: TaskType, providers: I) -> Self
    where
        I: IntoIterator<Item = ProviderId>,
    {
        let entry = self.routes.entry(task_type).or_default();
        for provider in providers {
            if !entry.contains(&provider) {
                entry.push(provider);
            }
        }
        self
    }

    /// Seed the default task routing table.
    pub fn default_routes(self) -> Self {
        use ProviderId::*;
        self.route(TaskType::ImageToPrompt, [Openai, Huggingface])
            .route(TaskType::PromptOptimize, [Openai, Huggingface])
            .route(TaskType::TextToImage, [Huggingface, Jimeng, Openai, Comfyui])
            .route(TaskType::ImageToImage, [Huggingface, Jimeng, Comfyui])
            .route(TaskType::Controlnet, [Comfyui, Huggingface])
            .route(TaskType::Inpainting, [Comfyui, Huggingface])
            .route(TaskType::RemoveBackground, [Huggingface, Comfyui])
            .route(TaskType::TextToVideo, [Jimeng, Kling, Vidu, Comfyui])
            .route(TaskType::ImageToVideo, [Kling, Jimeng, Vidu, Comfyui])
            .route(TaskType::VideoToVideo, [Kling, Jimeng, Comfyui])
            .route(TaskType::VideoUpscale, [Comfyui, Kling])
            .route(TaskType::MusicGenerate, [Suno])
            .route(TaskType::VoiceSynthesize, [Minimax, Openai])
            .route(TaskType::VoiceClone, [Minimax])
    }

    /// Finalize: drop disabled/unregistered providers from every route and
    /// order the remainder ascending by priority.
    pub fn build(self) -> ProviderRegistry {
        let mut routes: HashMap<TaskType, Vec<ProviderId>> = HashMap::new();
        for (task, providers) in self.routes {
            let mut eligible: Vec<ProviderId> = providers
                .into_iter()
                .filter(|p| self.configs.get(p).is_some_and(|c| c.enabled))
                .collect();
            eligible.sort_by_key(|p| self.configs[p].priority);
            tracing::debug!(
                task = %task,
                providers = ?eligible,
                "registry route built"
            );
            routes.insert(task, eligible);
        }
        ProviderRegistry {
            configs: self.configs,
            routes,
        }
    }
}
