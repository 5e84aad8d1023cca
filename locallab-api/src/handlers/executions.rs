use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use locallab_core::ExperimentId;
use locallab_workflow::ExecutionProgress;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub run_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeResponse {
    pub remaining_runs: usize,
}

pub async fn start(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StartResponse>> {
    let run_count = state.executor.start(ExperimentId::from(id)).await?;
    Ok(Json(StartResponse { run_count }))
}

pub async fn resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ResumeResponse>> {
    let remaining_runs = state.executor.resume(ExperimentId::from(id)).await?;
    Ok(Json(ResumeResponse { remaining_runs }))
}

/// Pause and cancel are requests: the loop honours them at the next run
/// boundary, and an experiment that is not executing ignores them.
pub async fn pause(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    let experiment_id = ExperimentId::from(id);
    if !state.executor.pause(&experiment_id) {
        tracing::debug!(%experiment_id, "Pause requested for idle experiment");
    }
    StatusCode::ACCEPTED
}

pub async fn cancel(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    let experiment_id = ExperimentId::from(id);
    if !state.executor.cancel(&experiment_id) {
        tracing::debug!(%experiment_id, "Cancel requested for idle experiment");
    }
    StatusCode::ACCEPTED
}

pub async fn progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExecutionProgress>> {
    let experiment_id = ExperimentId::from(id);
    state
        .executor
        .progress(&experiment_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Experiment {} is not executing", experiment_id)))
}
