#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use locallab_api::{routes, AppState};
use locallab_core::{
    Experiment, ExperimentConfig, GenerationRequest, GenerationResponse, InferenceClient,
    Repository, Result, TaskTemplate,
};
use locallab_storage::{
    InMemoryExperimentRepository, InMemoryRunRepository, InMemorySystemPromptRepository,
    InMemoryTaskTemplateRepository,
};
use locallab_workflow::{DisabledContextProvider, ExecutorDependencies, ExperimentExecutor};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower::ServiceExt;

/// Inference client whose calls block until permits are released, so tests
/// can observe an experiment mid-flight.
pub struct GatedInference {
    gate: Semaphore,
}

impl GatedInference {
    pub fn closed() -> Self {
        Self {
            gate: Semaphore::new(0),
        }
    }

    pub fn open() -> Self {
        Self {
            gate: Semaphore::new(Semaphore::MAX_PERMITS),
        }
    }

    pub fn release(&self, calls: usize) {
        self.gate.add_permits(calls);
    }
}

#[async_trait]
impl InferenceClient for GatedInference {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let permit = self.gate.acquire().await.unwrap();
        permit.forget();
        Ok(GenerationResponse {
            text: format!("{} says hi", request.model),
            duration_ms: 5,
            tokens_per_second: Some(40.0),
            time_to_first_token_ms: Some(1),
            prompt_tokens: Some(8),
            completion_tokens: Some(16),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub executor: ExperimentExecutor,
    pub experiments: Arc<InMemoryExperimentRepository>,
    pub templates: Arc<InMemoryTaskTemplateRepository>,
    pub inference: Arc<GatedInference>,
}

impl TestApp {
    pub fn new(inference: GatedInference) -> Self {
        let experiments = Arc::new(InMemoryExperimentRepository::new());
        let templates = Arc::new(InMemoryTaskTemplateRepository::new());
        let inference = Arc::new(inference);

        let executor = ExperimentExecutor::new(ExecutorDependencies {
            experiments: experiments.clone(),
            runs: Arc::new(InMemoryRunRepository::new()),
            task_templates: templates.clone(),
            system_prompts: Arc::new(InMemorySystemPromptRepository::new()),
            inference: inference.clone(),
            context: Arc::new(DisabledContextProvider),
        });

        Self {
            router: routes(AppState::new(executor.clone())),
            executor,
            experiments,
            templates,
            inference,
        }
    }

    /// Save a DRAFT experiment comparing `models` over `iterations`.
    pub async fn seed_experiment(&self, models: &[&str], iterations: u32) -> Experiment {
        let template = TaskTemplate::new("greet".to_string(), "Say hi to {{name}}.".to_string());
        self.templates.save(&template).await.unwrap();

        let config = ExperimentConfig::new(models.iter().map(|m| m.to_string()).collect())
            .with_iterations(iterations)
            .with_variables(HashMap::from([("name".to_string(), "Ada".to_string())]));

        let experiment = Experiment::new("Greeting".to_string(), Some(template.id))
            .with_config(&config)
            .unwrap();
        self.experiments.save(&experiment).await.unwrap()
    }

    pub async fn send(&self, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}
