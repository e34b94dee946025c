//! Fallback Notifications
//!
//! Renders a user-facing message when a request was served by a non-primary
//! provider, naming the provider that failed and the one that stepped in.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::types::{FallbackExecution, ProviderId};

const GENERIC_ORIGINAL: &str = "The primary service";
const GENERIC_CURRENT: &str = "a backup service";

fn display_names() -> &'static HashMap<ProviderId, &'static str> {
    static NAMES: OnceLock<HashMap<ProviderId, &'static str>> = OnceLock::new();
    NAMES.get_or_init(|| {
        HashMap::from([
            (ProviderId::Huggingface, "HuggingFace"),
            (ProviderId::Openai, "OpenAI"),
            (ProviderId::Jimeng, "Jimeng"),
            (ProviderId::Kling, "Kling"),
            (ProviderId::Minimax, "Minimax"),
            (ProviderId::Suno, "Suno"),
            (ProviderId::Vidu, "Vidu"),
            (ProviderId::Comfyui, "local ComfyUI"),
        ])
    })
}

/// Display name for a provider, used in user-facing messages.
pub fn display_name(provider: ProviderId) -> Option<&'static str> {
    display_names().get(&provider).copied()
}

/// Notification message for a completed execution.
///
/// Returns `None` unless a fallback occurred. The serving provider is the
/// last entry of the attempted list.
pub fn fallback_message(execution: &FallbackExecution) -> Option<String> {
    if !execution.result.fallback_used {
        return None;
    }

    let original = execution
        .original_provider
        .and_then(display_name)
        .unwrap_or(GENERIC_ORIGINAL);
    let current = execution
        .providers_attempted
        .last()
        .and_then(|p| display_name(*p))
        .unwrap_or(GENERIC_CURRENT);

    Some(format!(
        "{original} call failed; seamlessly switched to {current}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GenerationOutput, GenerationResult};
    use serde_json::json;

    fn execution(fallback: bool) -> FallbackExecution {
        let mut result = GenerationResult::success(
            ProviderId::Openai,
            GenerationOutput::new(json!({"url": "https://example/img.png"})),
        );
        result.fallback_used = fallback;
        result.fallback_from = fallback.then_some(ProviderId::Huggingface);
        FallbackExecution {
            result,
            providers_attempted: vec![ProviderId::Huggingface, ProviderId::Openai],
            original_provider: Some(ProviderId::Huggingface),
            attempt_log: Vec::new(),
        }
    }

    #[test]
    fn no_message_without_fallback() {
        assert_eq!(fallback_message(&execution(false)), None);
    }

    #[test]
    fn message_names_both_providers() {
        let message = fallback_message(&execution(true)).unwrap();
        assert!(message.contains("HuggingFace"));
        assert!(message.contains("OpenAI"));
    }

    #[test]
    fn generic_labels_when_providers_unknown() {
        let mut exec = execution(true);
        exec.original_provider = None;
        exec.providers_attempted.clear();
        let message = fallback_message(&exec).unwrap();
        assert!(message.contains(GENERIC_ORIGINAL));
        assert!(message.contains(GENERIC_CURRENT));
    }
}
