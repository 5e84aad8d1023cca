//! HTTP control surface for the LocalLab experiment executor.
//!
//! Routes are relative; the binary nests them under `/api/v1`.

use axum::{
    routing::{get, post},
    Router,
};
use locallab_workflow::ExperimentExecutor;

pub mod error;
pub mod handlers;
pub mod observability;

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub executor: ExperimentExecutor,
}

impl AppState {
    pub fn new(executor: ExperimentExecutor) -> Self {
        Self { executor }
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/experiments/:id/start", post(handlers::executions::start))
        .route("/experiments/:id/resume", post(handlers::executions::resume))
        .route("/experiments/:id/pause", post(handlers::executions::pause))
        .route("/experiments/:id/cancel", post(handlers::executions::cancel))
        .route("/experiments/:id/progress", get(handlers::executions::progress))
        .route("/experiments/:id/events", get(handlers::events::stream))
        .with_state(state)
}
