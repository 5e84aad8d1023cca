use anyhow::Result;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use locallab_api::observability::{init_logging, init_metrics, metrics_handler};
use locallab_api::AppState;
use locallab_ollama::OllamaClient;
use locallab_storage::{
    ExperimentRepository, InMemoryExperimentRepository, InMemoryRunRepository,
    InMemorySystemPromptRepository, InMemoryTaskTemplateRepository, RunRepository,
    SystemPromptRepository, TaskTemplateRepository,
};
use locallab_workflow::{
    DisabledContextProvider, ExecutorConfig, ExecutorDependencies, ExperimentExecutor,
};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::load()?;
    init_logging(&config.logging()).map_err(anyhow::Error::from_boxed)?;
    init_metrics()?;

    tracing::info!("Starting LocalLab server");

    let db_pool = match &config.database_url {
        Some(url) => {
            let pool = locallab_storage::postgres::create_pool(url).await?;
            tracing::info!("Database pool initialized");
            Some(pool)
        }
        None => {
            tracing::warn!("No database configured, experiments are kept in memory");
            None
        }
    };

    let ollama = OllamaClient::new(config.ollama())?;
    probe_ollama(&ollama).await;

    let deps = dependencies(db_pool.clone(), Arc::new(ollama));
    let executor = ExperimentExecutor::with_config(
        deps,
        ExecutorConfig {
            event_buffer: config.event_buffer,
            ..Default::default()
        },
    );

    let app = Router::new()
        .route("/health", get(health_check))
        .with_state(db_pool)
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", locallab_api::routes(AppState::new(executor)))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("LocalLab server stopped");
    Ok(())
}

fn dependencies(db_pool: Option<PgPool>, ollama: Arc<OllamaClient>) -> ExecutorDependencies {
    let context = Arc::new(DisabledContextProvider);

    match db_pool {
        Some(pool) => ExecutorDependencies {
            experiments: Arc::new(ExperimentRepository::new(pool.clone())),
            runs: Arc::new(RunRepository::new(pool.clone())),
            task_templates: Arc::new(TaskTemplateRepository::new(pool.clone())),
            system_prompts: Arc::new(SystemPromptRepository::new(pool)),
            inference: ollama,
            context,
        },
        None => ExecutorDependencies {
            experiments: Arc::new(InMemoryExperimentRepository::new()),
            runs: Arc::new(InMemoryRunRepository::new()),
            task_templates: Arc::new(InMemoryTaskTemplateRepository::new()),
            system_prompts: Arc::new(InMemorySystemPromptRepository::new()),
            inference: ollama,
            context,
        },
    }
}

/// Ollama being down is not fatal: runs fail individually until it is back.
async fn probe_ollama(client: &OllamaClient) {
    match client.list_models().await {
        Ok(models) => tracing::info!(
            base_url = %client.config().base_url,
            models = models.len(),
            "Ollama reachable"
        ),
        Err(e) => tracing::warn!(
            base_url = %client.config().base_url,
            "Ollama not reachable: {}",
            e
        ),
    }
}

async fn health_check(State(db_pool): State<Option<PgPool>>) -> (StatusCode, &'static str) {
    match db_pool {
        Some(pool) => match locallab_storage::postgres::health_check(&pool).await {
            Ok(()) => (StatusCode::OK, "OK"),
            Err(e) => {
                tracing::warn!("Health check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable")
            }
        },
        None => (StatusCode::OK, "OK"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
