//! Core Type Definitions
//!
//! Shared data model for the routing engine: task types, provider
//! identifiers, health states, and the request/result/execution records
//! that flow through the fallback orchestrator.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generation task types.
///
/// Closed enumeration, defined at build time. Providers declare which of
/// these they can service via [`crate::traits::GenerationCapability::supports_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    // Prompt
    ImageToPrompt,
    PromptOptimize,
    // Image
    TextToImage,
    ImageToImage,
    Controlnet,
    Inpainting,
    RemoveBackground,
    // Video
    TextToVideo,
    ImageToVideo,
    VideoToVideo,
    VideoUpscale,
    // Audio
    MusicGenerate,
    VoiceSynthesize,
    VoiceClone,
}

impl TaskType {
    /// All task types, in declaration order.
    pub const ALL: [TaskType; 14] = [
        TaskType::ImageToPrompt,
        TaskType::PromptOptimize,
        TaskType::TextToImage,
        TaskType::ImageToImage,
        TaskType::Controlnet,
        TaskType::Inpainting,
        TaskType::RemoveBackground,
        TaskType::TextToVideo,
        TaskType::ImageToVideo,
        TaskType::VideoToVideo,
        TaskType::VideoUpscale,
        TaskType::MusicGenerate,
        TaskType::VoiceSynthesize,
        TaskType::VoiceClone,
    ];

    /// Stable snake_case identifier, matching the serde representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TaskType::ImageToPrompt => "image_to_prompt",
            TaskType::PromptOptimize => "prompt_optimize",
            TaskType::TextToImage => "text_to_image",
            TaskType::ImageToImage => "image_to_image",
            TaskType::Controlnet => "controlnet",
            TaskType::Inpainting => "inpainting",
            TaskType::RemoveBackground => "remove_background",
            TaskType::TextToVideo => "text_to_video",
            TaskType::ImageToVideo => "image_to_video",
            TaskType::VideoToVideo => "video_to_video",
            TaskType::VideoUpscale => "video_upscale",
            TaskType::MusicGenerate => "music_generate",
            TaskType::VoiceSynthesize => "voice_synthesize",
            TaskType::VoiceClone => "voice_clone",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend provider identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Huggingface,
    Openai,
    Jimeng,
    Kling,
    Minimax,
    Suno,
    Vidu,
    Comfyui,
}

impl ProviderId {
    /// All provider identifiers, in declaration order.
    pub const ALL: [ProviderId; 8] = [
        ProviderId::Huggingface,
        ProviderId::Openai,
        ProviderId::Jimeng,
        ProviderId::Kling,
        ProviderId::Minimax,
        ProviderId::Suno,
        ProviderId::Vidu,
        ProviderId::Comfyui,
    ];

    /// Stable snake_case identifier, matching the serde representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Huggingface => "huggingface",
            ProviderId::Openai => "openai",
            ProviderId::Jimeng => "jimeng",
            ProviderId::Kling => "kling",
            ProviderId::Minimax => "minimax",
            ProviderId::Suno => "suno",
            ProviderId::Vidu => "vidu",
            ProviderId::Comfyui => "comfyui",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider health classification, derived from recent failure history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Pure mapping from a consecutive-failure count to a status.
    ///
    /// 0 failures is Healthy, 1–2 is Degraded, 3 or more is Unhealthy.
    pub const fn from_consecutive_failures(failures: u32) -> Self {
        match failures {
            0 => HealthStatus::Healthy,
            1 | 2 => HealthStatus::Degraded,
            _ => HealthStatus::Unhealthy,
        }
    }
}

/// Named parameters for a generation request.
///
/// Values are opaque to the router; only validators and providers interpret
/// them.
pub type Parameters = HashMap<String, Value>;

/// A single generation request.
///
/// Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub task_type: TaskType,
    pub parameters: Parameters,
}

impl GenerationRequest {
    pub fn new(task_type: TaskType, parameters: Parameters) -> Self {
        Self {
            task_type,
            parameters,
        }
    }

    /// Convenience constructor from `(name, value)` pairs.
    pub fn from_pairs<I, K>(task_type: TaskType, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            task_type,
            parameters: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Successful payload returned by a provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// Provider-specific payload (URLs, base64 blobs, text, ...).
    pub data: Value,
    /// Model that actually served the request, when the adapter knows it.
    pub model: Option<String>,
}

impl GenerationOutput {
    pub fn new(data: Value) -> Self {
        Self { data, model: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Result of a generation task, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    /// Payload on success.
    pub data: Option<Value>,
    /// Terminal error message on failure.
    pub error: Option<String>,
    /// Provider that produced the payload.
    pub provider: Option<ProviderId>,
    /// Model that served the request, when known.
    pub model: Option<String>,
    /// Whether a non-primary provider produced the result.
    pub fallback_used: bool,
    /// The primary provider that was bypassed, when fallback occurred.
    pub fallback_from: Option<ProviderId>,
}

impl GenerationResult {
    /// Successful result from the given provider.
    pub fn success(provider: ProviderId, output: GenerationOutput) -> Self {
        Self {
            success: true,
            data: Some(output.data),
            error: None,
            provider: Some(provider),
            model: output.model,
            fallback_used: false,
            fallback_from: None,
        }
    }

    /// Failed result carrying only an error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            provider: None,
            model: None,
            fallback_used: false,
            fallback_from: None,
        }
    }
}

/// One retry attempt observed by the retry executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-indexed attempt number.
    pub attempt: u32,
    /// Coarse error kind label (see [`crate::error::RouteError::kind`]).
    pub error_kind: String,
    /// Full error message for this attempt.
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Complete record of one fallback execution.
///
/// Created per call and handed back to the caller; the router keeps no copy.
#[derive(Debug, Clone)]
pub struct FallbackExecution {
    /// Final outcome.
    pub result: GenerationResult,
    /// Providers attempted, in order.
    pub providers_attempted: Vec<ProviderId>,
    /// First provider attempted, if any call was made.
    pub original_provider: Option<ProviderId>,
    /// Per-provider retry attempt history, for observability.
    pub attempt_log: Vec<(ProviderId, Vec<AttemptRecord>)>,
}

impl FallbackExecution {
    /// Whether a non-primary provider ended up serving the request.
    pub fn fallback_occurred(&self) -> bool {
        self.result.fallback_used
    }

    /// Failure execution with no provider attempts (e.g. no route, or
    /// validation rejected the call before any network activity).
    pub(crate) fn unattempted(result: GenerationResult) -> Self {
        Self {
            result,
            providers_attempted: Vec::new(),
            original_provider: None,
            attempt_log: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_thresholds() {
        assert_eq!(
            HealthStatus::from_consecutive_failures(0),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthStatus::from_consecutive_failures(1),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::from_consecutive_failures(2),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::from_consecutive_failures(3),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthStatus::from_consecutive_failures(100),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn enum_serde_uses_snake_case() {
        let json = serde_json::to_string(&TaskType::TextToImage).unwrap();
        assert_eq!(json, "\"text_to_image\"");
        let json = serde_json::to_string(&ProviderId::Huggingface).unwrap();
        assert_eq!(json, "\"huggingface\"");
        let back: ProviderId = serde_json::from_str("\"kling\"").unwrap();
        assert_eq!(back, ProviderId::Kling);
    }

    #[test]
    fn display_matches_serde_representation() {
        for task in TaskType::ALL {
            let json = serde_json::to_string(&task).unwrap();
            assert_eq!(json.trim_matches('"'), task.to_string());
        }
    }
}
