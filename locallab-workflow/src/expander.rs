use locallab_core::{CoreError, ExperimentConfig, Result, MAX_ITERATIONS};
use serde::{Deserialize, Serialize};

/// One unit of work: a (model, embedding model, iteration) triple.
///
/// Also serves as the identity of a run when working out what is left to do
/// on resume.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfiguration {
    pub model: String,
    pub embedding_model: Option<String>,
    pub iteration: u32,
}

impl RunConfiguration {
    pub fn new(model: impl Into<String>, embedding_model: Option<String>, iteration: u32) -> Self {
        Self {
            model: model.into(),
            embedding_model,
            iteration,
        }
    }
}

/// Upper bound on the number of runs one experiment may expand into.
pub const MAX_RUNS: usize = 100_000;

/// Expand a configuration into its ordered run queue.
///
/// For each model, for each embedding model (or a single `None` outside RAG
/// mode), for iterations `1..=N`. An empty model list expands to nothing.
/// Configurations above [`MAX_ITERATIONS`] or [`MAX_RUNS`] are rejected
/// before anything is allocated.
pub fn expand_runs(config: &ExperimentConfig) -> Result<Vec<RunConfiguration>> {
    let models = config.models();
    if models.is_empty() {
        return Ok(Vec::new());
    }

    let embedding_models = embedding_dimension(config)?;
    let iterations = config.effective_iterations();
    if iterations > MAX_ITERATIONS {
        return Err(CoreError::Configuration(format!(
            "iterations must be at most {}, got {}",
            MAX_ITERATIONS, iterations
        )));
    }

    let run_count = models
        .len()
        .checked_mul(embedding_models.len())
        .and_then(|n| n.checked_mul(iterations as usize))
        .filter(|n| *n <= MAX_RUNS)
        .ok_or_else(|| {
            CoreError::Configuration(format!(
                "Experiment expands to more than {} runs",
                MAX_RUNS
            ))
        })?;

    let mut runs = Vec::with_capacity(run_count);
    for model in models {
        for embedding_model in &embedding_models {
            for iteration in 1..=iterations {
                runs.push(RunConfiguration::new(
                    model.clone(),
                    embedding_model.clone(),
                    iteration,
                ));
            }
        }
    }

    Ok(runs)
}

/// Number of runs [`expand_runs`] would produce, without building them.
/// Saturates instead of overflowing.
pub fn expected_run_count(config: &ExperimentConfig) -> usize {
    let embedding_factor = if config.context_mode.is_rag() {
        config.embedding_models().len().max(1)
    } else {
        1
    };
    config
        .models()
        .len()
        .saturating_mul(embedding_factor)
        .saturating_mul(config.effective_iterations() as usize)
}

fn embedding_dimension(config: &ExperimentConfig) -> Result<Vec<Option<String>>> {
    if !config.context_mode.is_rag() {
        return Ok(vec![None]);
    }

    if config.embedding_models().is_empty() {
        return Err(CoreError::Configuration(
            "RAG context mode requires at least one embedding model".to_string(),
        ));
    }
    if config.document_id.is_none() {
        return Err(CoreError::Configuration(
            "RAG context mode requires a document".to_string(),
        ));
    }

    Ok(config
        .embedding_models()
        .iter()
        .cloned()
        .map(Some)
        .collect())
}
