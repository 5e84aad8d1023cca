//! Prometheus export for the metrics the executor records.
//!
//! The executor only talks to the `metrics` facade; this module installs the
//! recorder once per process and renders it for `GET /metrics`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use locallab_workflow::{EXPERIMENTS_FINISHED_TOTAL, RUNS_TOTAL, RUN_DURATION_SECONDS};
use std::sync::OnceLock;
use thiserror::Error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to install metrics exporter: {0}")]
    Installation(String),
}

/// Install the Prometheus recorder. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), MetricsError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    // A generation takes anywhere from a few hundred milliseconds to minutes.
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(RUN_DURATION_SECONDS.to_string()),
            &[0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0],
        )
        .map_err(|e| MetricsError::Installation(e.to_string()))?
        .install_recorder()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Installation("Handle already set".to_string()))?;

    describe_metrics();
    tracing::info!("Prometheus metrics recorder installed");
    Ok(())
}

fn describe_metrics() {
    describe_counter!(RUNS_TOTAL, Unit::Count, "Experiment runs finished, by status");
    describe_histogram!(
        RUN_DURATION_SECONDS,
        Unit::Seconds,
        "Wall-clock duration of a single experiment run"
    );
    describe_counter!(
        EXPERIMENTS_FINISHED_TOTAL,
        Unit::Count,
        "Experiment executions that stopped, by final status"
    );
}

pub async fn metrics_handler() -> Response {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => {
            tracing::error!("Metrics handler called but metrics not initialized");
            (StatusCode::INTERNAL_SERVER_ERROR, "Metrics not initialized").into_response()
        }
    }
}
