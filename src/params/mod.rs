//! Parameter Validation
//!
//! Table-driven validation of request parameters against per-task
//! requirements and numeric ranges, evaluated before any network call.
//! Validation is synchronous, pure, and never contacts a provider.
//!
//! Three layers, applied in order:
//! 1. required-parameter presence (missing or null fails),
//! 2. numeric range constraints on any present parameter,
//! 3. task-specific rules (image dimensions, video duration, music/voice
//!    text rules), evaluated only when the generic layers pass.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{RouteError, RouteResult};
use crate::types::{Parameters, TaskType};

/// Validates parameters for generation tasks.
pub struct ParameterValidator;

/// Inclusive numeric range for a named parameter.
#[derive(Debug, Clone, Copy)]
pub struct Constraint {
    pub min: f64,
    pub max: f64,
}

impl ParameterValidator {
    /// Mandatory parameter names for a task type.
    pub const fn required_params(task_type: TaskType) -> &'static [&'static str] {
        match task_type {
            TaskType::ImageToPrompt => &["image"],
            TaskType::PromptOptimize => &["prompt"],
            TaskType::TextToImage => &["prompt"],
            TaskType::ImageToImage => &["prompt", "image"],
            TaskType::Controlnet => &["prompt", "control_image"],
            TaskType::Inpainting => &["prompt", "image", "mask"],
            TaskType::RemoveBackground => &["image"],
            TaskType::TextToVideo => &["prompt"],
            TaskType::ImageToVideo => &["prompt", "image"],
            TaskType::VideoToVideo => &["prompt", "video"],
            TaskType::VideoUpscale => &["video"],
            TaskType::MusicGenerate => &["prompt"],
            TaskType::VoiceSynthesize => &["text"],
            TaskType::VoiceClone => &["text", "reference_audio"],
        }
    }

    /// Numeric range for a parameter name, when one is defined.
    pub fn constraint(name: &str) -> Option<Constraint> {
        let (min, max) = match name {
            "width" | "height" => (256.0, 4096.0),
            "duration" => (1.0, 300.0),
            "fps" => (1.0, 60.0),
            "steps" => (1.0, 100.0),
            "cfg_scale" => (1.0, 20.0),
            "seed" => (0.0, u32::MAX as f64),
            "speed" | "pitch" => (0.5, 2.0),
            _ => return None,
        };
        Some(Constraint { min, max })
    }

    /// Validate parameters for a task type.
    pub fn validate(task_type: TaskType, parameters: &Parameters) -> RouteResult<()> {
        for param in Self::required_params(task_type) {
            match parameters.get(*param) {
                None | Some(Value::Null) => {
                    return Err(RouteError::InvalidParameter(format!(
                        "missing required parameter: {param}"
                    )));
                }
                Some(_) => {}
            }
        }

        for (name, value) in parameters {
            let Some(constraint) = Self::constraint(name) else {
                continue;
            };
            let Some(number) = value.as_f64() else {
                continue;
            };
            if number < constraint.min {
                return Err(RouteError::InvalidParameter(format!(
                    "{name} must be >= {}",
                    constraint.min
                )));
            }
            if number > constraint.max {
                return Err(RouteError::InvalidParameter(format!(
                    "{name} must be <= {}",
                    constraint.max
                )));
            }
        }

        Self::validate_task_specific(task_type, parameters)
    }

    fn validate_task_specific(task_type: TaskType, parameters: &Parameters) -> RouteResult<()> {
        match task_type {
            TaskType::TextToImage => Self::validate_image_params(parameters),
            TaskType::TextToVideo | TaskType::ImageToVideo => {
                Self::validate_video_params(parameters)
            }
            TaskType::MusicGenerate => Self::validate_music_params(parameters),
            TaskType::VoiceSynthesize => Self::validate_voice_params(parameters),
            _ => Ok(()),
        }
    }

    fn validate_image_params(parameters: &Parameters) -> RouteResult<()> {
        // Most diffusion backends require dimensions in multiples of 64.
        let width = int_param(parameters, "width").unwrap_or(1024);
        let height = int_param(parameters, "height").unwrap_or(1024);

        if width % 64 != 0 || height % 64 != 0 {
            return Err(RouteError::InvalidParameter(
                "width and height must be multiples of 64".into(),
            ));
        }
        Ok(())
    }

    fn validate_video_params(parameters: &Parameters) -> RouteResult<()> {
        let duration = int_param(parameters, "duration").unwrap_or(5);
        if duration > 60 {
            return Err(RouteError::InvalidParameter(
                "duration exceeds maximum of 60 seconds".into(),
            ));
        }
        Ok(())
    }

    fn validate_music_params(parameters: &Parameters) -> RouteResult<()> {
        let prompt = str_param(parameters, "prompt").unwrap_or("");
        if prompt.trim().is_empty() {
            return Err(RouteError::InvalidParameter("prompt cannot be empty".into()));
        }

        let instrumental = parameters
            .get("instrumental")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let has_lyrics = matches!(parameters.get("lyrics"), Some(v) if !v.is_null());
        if instrumental && has_lyrics {
            return Err(RouteError::InvalidParameter(
                "lyrics must not be provided for instrumental music".into(),
            ));
        }
        Ok(())
    }

    fn validate_voice_params(parameters: &Parameters) -> RouteResult<()> {
        let text = str_param(parameters, "text").unwrap_or("");
        if text.trim().is_empty() {
            return Err(RouteError::InvalidParameter("text cannot be empty".into()));
        }
        if text.chars().count() > 5000 {
            return Err(RouteError::InvalidParameter(
                "text exceeds maximum length of 5000 characters".into(),
            ));
        }
        Ok(())
    }

    /// Required parameters that are missing or null, for pre-flight UX checks.
    pub fn missing_params(task_type: TaskType, parameters: &Parameters) -> Vec<&'static str> {
        Self::required_params(task_type)
            .iter()
            .filter(|p| matches!(parameters.get(**p), None | Some(Value::Null)))
            .copied()
            .collect()
    }

    /// Human-readable prompts for each required parameter of a task type.
    pub fn suggestions(task_type: TaskType) -> HashMap<&'static str, &'static str> {
        Self::required_params(task_type)
            .iter()
            .filter_map(|p| suggestion_for(p).map(|s| (*p, s)))
            .collect()
    }
}

fn suggestion_for(param: &str) -> Option<&'static str> {
    match param {
        "prompt" => Some("Enter a description prompt"),
        "image" => Some("Upload an image"),
        "video" => Some("Upload a video"),
        "control_image" => Some("Upload a control reference image"),
        "mask" => Some("Mark the region to edit"),
        "reference_audio" => Some("Upload a reference audio clip"),
        "text" => Some("Enter the text to synthesize"),
        _ => None,
    }
}

fn int_param(parameters: &Parameters, name: &str) -> Option<i64> {
    parameters.get(name).and_then(Value::as_i64)
}

fn str_param<'a>(parameters: &'a Parameters, name: &str) -> Option<&'a str> {
    parameters.get(name).and_then(Value::as_str)
}
