#![allow(dead_code)]

use async_trait::async_trait;
use locallab_core::{
    ContextProvider, CoreError, Experiment, ExperimentConfig, GenerationRequest,
    GenerationResponse, InferenceClient, InferenceError, Repository, Result, RetrievedChunk,
    SystemPrompt, TaskTemplate,
};
use locallab_storage::{
    InMemoryExperimentRepository, InMemoryRunRepository, InMemorySystemPromptRepository,
    InMemoryTaskTemplateRepository,
};
use locallab_workflow::{ExecutorDependencies, ExperimentExecutor, ProgressEvent};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub const TEMPLATE: &str = "Explain {{topic}} in one paragraph.";

type CallHook = Box<dyn Fn(usize) + Send + Sync>;

/// Inference client that answers instantly, fails on chosen call numbers and
/// can run a hook on every call.
#[derive(Default)]
pub struct ScriptedInference {
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
    failing_calls: Mutex<HashSet<usize>>,
    hook: Mutex<Option<CallHook>>,
}

impl ScriptedInference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the given 1-based call numbers fail.
    pub fn fail_on(&self, calls: &[usize]) {
        self.failing_calls.lock().unwrap().extend(calls.iter().copied());
    }

    pub fn on_call(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());

        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(call);
        }

        if self.failing_calls.lock().unwrap().contains(&call) {
            return Err(CoreError::Inference(InferenceError::ServiceUnavailable(
                "connection refused".to_string(),
            )));
        }

        Ok(GenerationResponse {
            text: format!("{} answer #{}", request.model, call),
            duration_ms: 10 * call as u64,
            tokens_per_second: Some(20.0),
            time_to_first_token_ms: Some(5),
            prompt_tokens: Some(12),
            completion_tokens: Some(48),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveCall {
    pub collection_name: String,
    pub query: String,
    pub embedding_model: String,
    pub top_k: usize,
}

/// Context provider returning the same chunks for every query.
#[derive(Default)]
pub struct StaticContextProvider {
    chunks: Vec<RetrievedChunk>,
    calls: Mutex<Vec<RetrieveCall>>,
}

impl StaticContextProvider {
    pub fn new(contents: &[&str]) -> Self {
        Self {
            chunks: contents
                .iter()
                .enumerate()
                .map(|(index, content)| RetrievedChunk {
                    content: content.to_string(),
                    distance: index as f64 * 0.1,
                    index,
                })
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RetrieveCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContextProvider for StaticContextProvider {
    async fn retrieve(
        &self,
        collection_name: &str,
        query: &str,
        embedding_model: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        self.calls.lock().unwrap().push(RetrieveCall {
            collection_name: collection_name.to_string(),
            query: query.to_string(),
            embedding_model: embedding_model.to_string(),
            top_k,
        });
        Ok(self.chunks.iter().take(top_k).cloned().collect())
    }
}

pub struct Harness {
    pub executor: ExperimentExecutor,
    pub experiments: Arc<InMemoryExperimentRepository>,
    pub runs: Arc<InMemoryRunRepository>,
    pub templates: Arc<InMemoryTaskTemplateRepository>,
    pub system_prompts: Arc<InMemorySystemPromptRepository>,
    pub inference: Arc<ScriptedInference>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_context(Arc::new(StaticContextProvider::new(&["Rust has no GC."])))
    }

    pub fn with_context(context: Arc<dyn ContextProvider>) -> Self {
        let experiments = Arc::new(InMemoryExperimentRepository::new());
        let runs = Arc::new(InMemoryRunRepository::new());
        let templates = Arc::new(InMemoryTaskTemplateRepository::new());
        let system_prompts = Arc::new(InMemorySystemPromptRepository::new());
        let inference = Arc::new(ScriptedInference::new());

        let executor = ExperimentExecutor::new(ExecutorDependencies {
            experiments: experiments.clone(),
            runs: runs.clone(),
            task_templates: templates.clone(),
            system_prompts: system_prompts.clone(),
            inference: inference.clone(),
            context,
        });

        Self {
            executor,
            experiments,
            runs,
            templates,
            system_prompts,
            inference,
        }
    }

    /// Save a template and a DRAFT experiment using it.
    pub async fn seed_experiment(&self, config: &ExperimentConfig) -> Experiment {
        let template = TaskTemplate::new("explain".to_string(), TEMPLATE.to_string());
        self.templates.save(&template).await.unwrap();

        let experiment = Experiment::new("Model comparison".to_string(), Some(template.id))
            .with_config(config)
            .unwrap();
        self.experiments.save(&experiment).await.unwrap()
    }

    pub async fn seed_system_prompt(&self, content: &str) -> SystemPrompt {
        let prompt = SystemPrompt::new("terse".to_string(), content.to_string());
        self.system_prompts.save(&prompt).await.unwrap()
    }
}

pub fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Collect events until the loop's final event (completed or paused).
pub async fn collect_until_final(
    rx: &mut broadcast::Receiver<ProgressEvent>,
) -> (Vec<ProgressEvent>, ProgressEvent) {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for experiment events")
            .expect("event channel closed");
        if event.is_final() {
            return (seen, event);
        }
        seen.push(event);
    }
}
