use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::{Validate, ValidationError};

use super::ids::{DocumentId, SystemPromptId};
use crate::error::{CoreError, Result};

// ===== Context Mode =====

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextMode {
    /// Plain prompt, no retrieval.
    #[default]
    None,
    /// Prompt augmented with chunks retrieved from an indexed document.
    Rag,
}

impl ContextMode {
    pub fn is_rag(&self) -> bool {
        matches!(self, ContextMode::Rag)
    }
}

// ===== Generation Hyperparameters =====

/// Sampling options forwarded to the inference service. Unset values are
/// omitted from the request so the model's own defaults apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Hyperparameters {
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub top_p: Option<f64>,
    #[validate(range(min = 1))]
    pub top_k: Option<u32>,
    #[validate(range(min = 1))]
    pub context_window: Option<u32>,
    #[validate(range(min = 1))]
    pub max_tokens: Option<u32>,
}

impl Hyperparameters {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.top_p.is_none()
            && self.top_k.is_none()
            && self.context_window.is_none()
            && self.max_tokens.is_none()
    }
}

// ===== Experiment Configuration =====

/// Upper bound on `iterations` for a single experiment.
pub const MAX_ITERATIONS: u32 = 10_000;

/// The declarative experiment definition stored as a JSON blob on the
/// experiment record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_experiment_config", skip_on_field_errors = false))]
pub struct ExperimentConfig {
    pub models: Option<Vec<String>>,
    pub embedding_models: Option<Vec<String>>,
    #[validate(range(min = 1, max = MAX_ITERATIONS))]
    pub iterations: Option<u32>,
    #[serde(default)]
    pub context_mode: ContextMode,
    pub document_id: Option<DocumentId>,
    pub system_prompt_id: Option<SystemPromptId>,
    pub variable_values: Option<HashMap<String, String>>,
    #[validate(nested)]
    pub hyperparameters: Option<Hyperparameters>,
}

impl ExperimentConfig {
    pub fn new(models: Vec<String>) -> Self {
        Self {
            models: Some(models),
            ..Default::default()
        }
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn with_rag(mut self, document_id: DocumentId, embedding_models: Vec<String>) -> Self {
        self.context_mode = ContextMode::Rag;
        self.document_id = Some(document_id);
        self.embedding_models = Some(embedding_models);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt_id: SystemPromptId) -> Self {
        self.system_prompt_id = Some(system_prompt_id);
        self
    }

    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variable_values = Some(variables);
        self
    }

    pub fn with_hyperparameters(mut self, hyperparameters: Hyperparameters) -> Self {
        self.hyperparameters = Some(hyperparameters);
        self
    }

    /// Parse a stored configuration blob. Absent, blank and malformed blobs
    /// are configuration errors.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let raw = raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CoreError::Configuration("Experiment configuration is empty".to_string())
            })?;

        serde_json::from_str(raw).map_err(|e| {
            CoreError::Configuration(format!("Malformed experiment configuration: {}", e))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn models(&self) -> &[String] {
        self.models.as_deref().unwrap_or(&[])
    }

    pub fn embedding_models(&self) -> &[String] {
        self.embedding_models.as_deref().unwrap_or(&[])
    }

    /// Iteration count used for expansion: absent or zero counts as one.
    pub fn effective_iterations(&self) -> u32 {
        self.iterations.filter(|n| *n >= 1).unwrap_or(1)
    }

    pub fn variables(&self) -> HashMap<String, String> {
        self.variable_values.clone().unwrap_or_default()
    }

    pub fn hyperparameters(&self) -> Hyperparameters {
        self.hyperparameters.clone().unwrap_or_default()
    }
}

fn validate_experiment_config(config: &ExperimentConfig) -> std::result::Result<(), ValidationError> {
    if config.models().is_empty() {
        return Err(ValidationError::new("models_required")
            .with_message("at least one model must be selected".into()));
    }

    if config.context_mode.is_rag() {
        if config.embedding_models().is_empty() {
            return Err(ValidationError::new("embedding_models_required")
                .with_message("RAG context mode requires at least one embedding model".into()));
        }
        if config.document_id.is_none() {
            return Err(ValidationError::new("document_required")
                .with_message("RAG context mode requires a document".into()));
        }
    }

    Ok(())
}
