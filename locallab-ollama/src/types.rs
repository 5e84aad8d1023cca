//! Ollama wire types

use locallab_core::{GenerationRequest, GenerationResponse, Hyperparameters};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/generate`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

/// Sampling options. Unset fields are left out so the model defaults apply.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

impl From<&Hyperparameters> for GenerateOptions {
    fn from(hp: &Hyperparameters) -> Self {
        Self {
            temperature: hp.temperature,
            top_p: hp.top_p,
            top_k: hp.top_k,
            num_ctx: hp.context_window,
            num_predict: hp.max_tokens,
        }
    }
}

impl From<GenerationRequest> for GenerateRequest {
    fn from(request: GenerationRequest) -> Self {
        let options = if request.hyperparameters.is_empty() {
            None
        } else {
            Some(GenerateOptions::from(&request.hyperparameters))
        };

        Self {
            model: request.model,
            prompt: request.prompt,
            system: request.system_prompt.filter(|s| !s.trim().is_empty()),
            stream: false,
            options,
        }
    }
}

/// Final (non-streaming) response of `/api/generate`. Durations are in
/// nanoseconds.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    pub total_duration: Option<u64>,
    pub load_duration: Option<u64>,
    pub prompt_eval_count: Option<u32>,
    pub prompt_eval_duration: Option<u64>,
    pub eval_count: Option<u32>,
    pub eval_duration: Option<u64>,
}

const NANOS_PER_MILLI: f64 = 1_000_000.0;
const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

impl GenerateResponse {
    /// Convert into run metrics. `wall_clock_ms` is used when the server did
    /// not report a total duration.
    pub fn into_generation_response(self, wall_clock_ms: u64) -> GenerationResponse {
        let duration_ms = self
            .total_duration
            .map(|ns| (ns as f64 / NANOS_PER_MILLI).round() as u64)
            .unwrap_or(wall_clock_ms);

        let tokens_per_second = match (self.eval_count, self.eval_duration) {
            (Some(count), Some(ns)) if ns > 0 => Some(count as f64 / (ns as f64 / NANOS_PER_SECOND)),
            _ => None,
        };

        let time_to_first_token_ms = match (self.load_duration, self.prompt_eval_duration) {
            (None, None) => None,
            (load, prompt) => {
                let ns = load.unwrap_or(0).saturating_add(prompt.unwrap_or(0));
                Some((ns as f64 / NANOS_PER_MILLI).round() as u64)
            }
        };

        GenerationResponse {
            text: self.response,
            duration_ms,
            tokens_per_second,
            time_to_first_token_ms,
            prompt_tokens: self.prompt_eval_count,
            completion_tokens: self.eval_count,
        }
    }
}

/// Response of `GET /api/tags`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_unset_options() {
        let request = GenerateRequest::from(GenerationRequest::new("llama3", "hi"));
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body, json!({"model": "llama3", "prompt": "hi", "stream": false}));
    }

    #[test]
    fn test_request_maps_hyperparameters() {
        let request = GenerationRequest::new("llama3", "hi")
            .with_system_prompt(Some("Be brief.".to_string()))
            .with_hyperparameters(Hyperparameters {
                temperature: Some(0.3),
                context_window: Some(4096),
                max_tokens: Some(64),
                ..Default::default()
            });

        let body = serde_json::to_value(GenerateRequest::from(request)).unwrap();
        assert_eq!(body["system"], "Be brief.");
        assert_eq!(
            body["options"],
            json!({"temperature": 0.3, "num_ctx": 4096, "num_predict": 64})
        );
    }

    #[test]
    fn test_blank_system_prompt_dropped() {
        let request = GenerationRequest::new("m", "p").with_system_prompt(Some("  ".to_string()));
        assert!(GenerateRequest::from(request).system.is_none());
    }

    #[test]
    fn test_metrics_from_durations() {
        let response = GenerateResponse {
            response: "ok".to_string(),
            done: true,
            total_duration: Some(2_500_000_000),
            load_duration: Some(100_000_000),
            prompt_eval_count: Some(20),
            prompt_eval_duration: Some(50_000_000),
            eval_count: Some(100),
            eval_duration: Some(2_000_000_000),
            ..Default::default()
        };

        let metrics = response.into_generation_response(9_999);
        assert_eq!(metrics.duration_ms, 2_500);
        assert_eq!(metrics.tokens_per_second, Some(50.0));
        assert_eq!(metrics.time_to_first_token_ms, Some(150));
        assert_eq!(metrics.prompt_tokens, Some(20));
        assert_eq!(metrics.completion_tokens, Some(100));
    }

    #[test]
    fn test_huge_load_duration_saturates() {
        let response = GenerateResponse {
            response: "ok".to_string(),
            load_duration: Some(u64::MAX),
            prompt_eval_duration: Some(5),
            ..Default::default()
        };

        let metrics = response.into_generation_response(10);
        assert_eq!(
            metrics.time_to_first_token_ms,
            Some((u64::MAX as f64 / 1_000_000.0).round() as u64)
        );
    }

    #[test]
    fn test_metrics_fall_back_to_wall_clock() {
        let response = GenerateResponse {
            response: "ok".to_string(),
            eval_count: Some(10),
            eval_duration: Some(0),
            ..Default::default()
        };

        let metrics = response.into_generation_response(321);
        assert_eq!(metrics.duration_ms, 321);
        assert!(metrics.tokens_per_second.is_none());
        assert!(metrics.time_to_first_token_ms.is_none());
    }
}
