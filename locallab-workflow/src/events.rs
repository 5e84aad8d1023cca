use chrono::{DateTime, Utc};
use locallab_core::{ExperimentId, ExperimentStatus, RunId, RunStatistics, RunStatus};
use serde::{Deserialize, Serialize};

use crate::tracker::ExecutionProgress;

/// A progress notification for one experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub experiment_id: ExperimentId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl ProgressEvent {
    pub fn new(experiment_id: ExperimentId, payload: EventPayload) -> Self {
        Self {
            experiment_id,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    /// Whether no further events follow for this execution.
    pub fn is_final(&self) -> bool {
        matches!(
            self.payload,
            EventPayload::ExperimentCompleted { .. } | EventPayload::ExperimentPaused { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    Progress(ExecutionProgress),

    #[serde(rename_all = "camelCase")]
    RunStarted {
        run_id: RunId,
        model: String,
        embedding_model: Option<String>,
        iteration: u32,
    },

    #[serde(rename_all = "camelCase")]
    RunCompleted {
        run_id: RunId,
        model: String,
        embedding_model: Option<String>,
        iteration: u32,
        status: RunStatus,
        duration_ms: Option<u64>,
        tokens_per_second: Option<f64>,
        error_message: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    ExperimentCompleted {
        status: ExperimentStatus,
        total_runs: usize,
        successful_runs: usize,
        failed_runs: usize,
        total_duration_ms: u64,
        statistics: RunStatistics,
    },

    #[serde(rename_all = "camelCase")]
    ExperimentPaused {
        completed_runs: usize,
        remaining_runs: usize,
        total_runs: usize,
    },

    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Progress(_) => "PROGRESS",
            EventPayload::RunStarted { .. } => "RUN_STARTED",
            EventPayload::RunCompleted { .. } => "RUN_COMPLETED",
            EventPayload::ExperimentCompleted { .. } => "EXPERIMENT_COMPLETED",
            EventPayload::ExperimentPaused { .. } => "EXPERIMENT_PAUSED",
            EventPayload::Error { .. } => "ERROR",
        }
    }

    /// Completion payload built from the persisted runs of an experiment.
    pub fn experiment_completed(
        status: ExperimentStatus,
        statistics: RunStatistics,
        total_duration_ms: u64,
    ) -> Self {
        EventPayload::ExperimentCompleted {
            status,
            total_runs: statistics.total_runs,
            successful_runs: statistics.successful_runs,
            failed_runs: statistics.failed_runs,
            total_duration_ms,
            statistics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_event_wire_format() {
        let id = ExperimentId::new();
        let event = ProgressEvent::new(id, EventPayload::Progress(ExecutionProgress::new(1, 4)));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "PROGRESS");
        assert_eq!(value["experimentId"], id.to_string());
        assert_eq!(
            value["payload"],
            json!({"completed": 1, "total": 4, "percent": 25.0})
        );
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_paused_event_wire_format() {
        let event = ProgressEvent::new(
            ExperimentId::new(),
            EventPayload::ExperimentPaused {
                completed_runs: 2,
                remaining_runs: 3,
                total_runs: 5,
            },
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "EXPERIMENT_PAUSED");
        assert_eq!(
            value["payload"],
            json!({"completedRuns": 2, "remainingRuns": 3, "totalRuns": 5})
        );
        assert!(event.is_final());
    }

    #[test]
    fn test_event_round_trip() {
        let event = ProgressEvent::new(
            ExperimentId::new(),
            EventPayload::experiment_completed(
                ExperimentStatus::Completed,
                RunStatistics {
                    total_runs: 3,
                    successful_runs: 2,
                    failed_runs: 1,
                    ..Default::default()
                },
                1_500,
            ),
        );

        let json = serde_json::to_string(&event).unwrap();
        let back: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.kind(), "EXPERIMENT_COMPLETED");
    }
}
