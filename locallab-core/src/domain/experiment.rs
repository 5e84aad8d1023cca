use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::config::ExperimentConfig;
use super::ids::{ExperimentId, TaskTemplateId};
use crate::error::{CoreError, Result};

// ===== Experiment Status =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperimentStatus {
    Draft,
    Running,
    Paused,
    Completed,
    Failed,
}

impl ExperimentStatus {
    pub fn can_transition_to(&self, target: &ExperimentStatus) -> bool {
        use ExperimentStatus::*;
        match (self, target) {
            (Draft, Running) => true,

            (Running, Paused) | (Running, Completed) | (Running, Failed) => true,

            // Resuming with nothing left to do completes immediately
            (Paused, Running) | (Paused, Completed) => true,

            _ => false,
        }
    }

    pub fn can_start(&self) -> bool {
        matches!(self, ExperimentStatus::Draft)
    }

    pub fn can_resume(&self) -> bool {
        matches!(self, ExperimentStatus::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExperimentStatus::Completed | ExperimentStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Draft => "DRAFT",
            ExperimentStatus::Running => "RUNNING",
            ExperimentStatus::Paused => "PAUSED",
            ExperimentStatus::Completed => "COMPLETED",
            ExperimentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(ExperimentStatus::Draft),
            "RUNNING" => Some(ExperimentStatus::Running),
            "PAUSED" => Some(ExperimentStatus::Paused),
            "COMPLETED" => Some(ExperimentStatus::Completed),
            "FAILED" => Some(ExperimentStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Experiment Domain Model =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: ExperimentId,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    pub description: Option<String>,

    pub task_template_id: Option<TaskTemplateId>,

    pub status: ExperimentStatus,

    /// Serialized [`ExperimentConfig`] blob.
    pub config: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Experiment {
    pub fn new(name: String, task_template_id: Option<TaskTemplateId>) -> Self {
        let now = Utc::now();
        Self {
            id: ExperimentId::new(),
            name,
            description: None,
            task_template_id,
            status: ExperimentStatus::Draft,
            config: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    /// Attach a configuration at construction time, validating it the way
    /// the creation path does.
    pub fn with_config(mut self, config: &ExperimentConfig) -> Result<Self> {
        config.validate()?;
        self.config = Some(config.to_json()?);
        Ok(self)
    }

    pub fn parse_config(&self) -> Result<ExperimentConfig> {
        ExperimentConfig::parse(self.config.as_deref())
    }

    /// Replace the configuration. Only drafts may be edited.
    pub fn update_config(&mut self, config: &ExperimentConfig) -> Result<()> {
        if self.status != ExperimentStatus::Draft {
            return Err(CoreError::InvalidState(format!(
                "Experiment {} configuration can only change while DRAFT, but is {}",
                self.id, self.status
            )));
        }
        config.validate()?;
        self.config = Some(config.to_json()?);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn transition_to(&mut self, target: ExperimentStatus) -> Result<()> {
        if !self.status.can_transition_to(&target) {
            return Err(CoreError::InvalidState(format!(
                "Cannot transition experiment {} from {} to {}",
                self.id, self.status, target
            )));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn ensure_startable(&self) -> Result<()> {
        if !self.status.can_start() {
            return Err(CoreError::InvalidState(format!(
                "Experiment {} must be {} to start, but is {}",
                self.id,
                ExperimentStatus::Draft,
                self.status
            )));
        }
        Ok(())
    }

    pub fn ensure_resumable(&self) -> Result<()> {
        if !self.status.can_resume() {
            return Err(CoreError::InvalidState(format!(
                "Experiment {} must be {} to resume, but is {}",
                self.id,
                ExperimentStatus::Paused,
                self.status
            )));
        }
        Ok(())
    }
}
