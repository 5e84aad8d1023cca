use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ExperimentId, RunId};
use super::inference::GenerationResponse;
use crate::error::{CoreError, Result};

// ===== Run Status =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Success,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, RunStatus::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(RunStatus::Pending),
            "SUCCESS" => Some(RunStatus::Success),
            "FAILED" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Experiment Run =====

/// One persisted (model, embedding model, iteration) execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRun {
    pub id: RunId,
    pub experiment_id: ExperimentId,
    pub model_name: String,
    pub embedding_model: Option<String>,
    pub iteration: u32,
    pub status: RunStatus,
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: Option<u64>,
    pub tokens_per_second: Option<f64>,
    pub time_to_first_token_ms: Option<u64>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl ExperimentRun {
    pub fn new(
        experiment_id: ExperimentId,
        model_name: String,
        embedding_model: Option<String>,
        iteration: u32,
    ) -> Self {
        Self {
            id: RunId::new(),
            experiment_id,
            model_name,
            embedding_model,
            iteration,
            status: RunStatus::Pending,
            output: None,
            error_message: None,
            duration_ms: None,
            tokens_per_second: None,
            time_to_first_token_ms: None,
            prompt_tokens: None,
            completion_tokens: None,
            created_at: Utc::now(),
        }
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "Run {} already finished with status {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    pub fn succeed(&mut self, response: &GenerationResponse) -> Result<()> {
        self.ensure_pending()?;
        self.status = RunStatus::Success;
        self.output = Some(response.text.clone());
        self.error_message = None;
        self.duration_ms = Some(response.duration_ms);
        self.tokens_per_second = response.tokens_per_second;
        self.time_to_first_token_ms = response.time_to_first_token_ms;
        self.prompt_tokens = response.prompt_tokens;
        self.completion_tokens = response.completion_tokens;
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>, duration_ms: Option<u64>) -> Result<()> {
        self.ensure_pending()?;
        self.status = RunStatus::Failed;
        self.error_message = Some(message.into());
        self.duration_ms = duration_ms;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// ===== Run Statistics =====

/// Aggregate view over the runs of one experiment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    pub pending_runs: usize,
    pub avg_duration_ms: Option<f64>,
    pub avg_tokens_per_second: Option<f64>,
}

impl RunStatistics {
    pub fn from_runs(runs: &[ExperimentRun]) -> Self {
        let mut stats = Self {
            total_runs: runs.len(),
            ..Default::default()
        };

        let mut durations = Vec::new();
        let mut throughputs = Vec::new();

        for run in runs {
            match run.status {
                RunStatus::Success => {
                    stats.successful_runs += 1;
                    if let Some(d) = run.duration_ms {
                        durations.push(d as f64);
                    }
                    if let Some(tps) = run.tokens_per_second {
                        throughputs.push(tps);
                    }
                }
                RunStatus::Failed => stats.failed_runs += 1,
                RunStatus::Pending => stats.pending_runs += 1,
            }
        }

        stats.avg_duration_ms = mean(&durations);
        stats.avg_tokens_per_second = mean(&throughputs);
        stats
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
