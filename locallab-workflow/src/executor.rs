//! Experiment execution: expands an experiment into runs and drives them
//! one at a time against the inference service on a background task.

use locallab_core::{
    ContextProvider, CoreError, Experiment, ExperimentConfig, ExperimentId, ExperimentRun,
    ExperimentStatus, ExperimentStore, GenerationRequest, GenerationResponse, InferenceClient,
    Repository, Result, RunStatistics, RunStore, SystemPrompt, SystemPromptId, TaskTemplate,
    TaskTemplateId,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn, Instrument};

use crate::events::{EventPayload, ProgressEvent};
use crate::expander::{expand_runs, RunConfiguration};
use crate::publisher::{ProgressPublisher, Subscription, DEFAULT_EVENT_BUFFER};
use crate::tracker::{ExecutionProgress, ExecutionRegistry, ExecutionState};

/// Number of chunks retrieved per RAG run.
pub const DEFAULT_CONTEXT_TOP_K: usize = 5;

pub const RUNS_TOTAL: &str = "locallab_runs_total";
pub const RUN_DURATION_SECONDS: &str = "locallab_run_duration_seconds";
pub const EXPERIMENTS_FINISHED_TOTAL: &str = "locallab_experiments_finished_total";

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub context_top_k: usize,
    /// Capacity of each experiment's event topic.
    pub event_buffer: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            context_top_k: DEFAULT_CONTEXT_TOP_K,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Collaborators the executor reads from and writes to.
#[derive(Clone)]
pub struct ExecutorDependencies {
    pub experiments: Arc<dyn ExperimentStore>,
    pub runs: Arc<dyn RunStore>,
    pub task_templates: Arc<dyn Repository<TaskTemplate, TaskTemplateId>>,
    pub system_prompts: Arc<dyn Repository<SystemPrompt, SystemPromptId>>,
    pub inference: Arc<dyn InferenceClient>,
    pub context: Arc<dyn ContextProvider>,
}

/// Everything a background loop needs, fixed when it is launched.
struct ExecutionPlan {
    experiment_id: ExperimentId,
    config: ExperimentConfig,
    prompt: String,
    runs: Vec<RunConfiguration>,
    /// PENDING records left by an interrupted loop, reused instead of
    /// inserting a second record for the same run.
    pending: HashMap<RunConfiguration, ExperimentRun>,
    state: Arc<ExecutionState>,
}

/// Cheap to clone; clones share the registry and the publisher.
#[derive(Clone)]
pub struct ExperimentExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    deps: ExecutorDependencies,
    config: ExecutorConfig,
    registry: ExecutionRegistry,
    publisher: Arc<ProgressPublisher>,
}

impl ExperimentExecutor {
    pub fn new(deps: ExecutorDependencies) -> Self {
        Self::with_config(deps, ExecutorConfig::default())
    }

    pub fn with_config(deps: ExecutorDependencies, config: ExecutorConfig) -> Self {
        let publisher = Arc::new(ProgressPublisher::new(config.event_buffer));
        Self {
            inner: Arc::new(ExecutorInner {
                deps,
                config,
                registry: ExecutionRegistry::new(),
                publisher,
            }),
        }
    }

    /// Start a DRAFT experiment. Returns the number of queued runs as soon as
    /// the loop is launched.
    pub async fn start(&self, experiment_id: ExperimentId) -> Result<usize> {
        let mut experiment = self.load_experiment(&experiment_id).await?;
        experiment.ensure_startable()?;

        let config = experiment.parse_config()?;
        let runs = expand_runs(&config)?;
        if runs.is_empty() {
            return Err(CoreError::Configuration(format!(
                "Experiment {} has no models configured",
                experiment_id
            )));
        }
        let template = self.load_task_template(&experiment).await?;

        experiment.transition_to(ExperimentStatus::Running)?;
        let state = self
            .inner
            .registry
            .try_register(experiment_id, runs.len(), 0)?;
        self.persist_running(&experiment_id).await?;

        let run_count = runs.len();
        info!(%experiment_id, run_count, "Starting experiment");

        self.launch(ExecutionPlan {
            experiment_id,
            prompt: template.render(&config.variables()),
            config,
            runs,
            pending: HashMap::new(),
            state,
        });

        Ok(run_count)
    }

    /// Resume a PAUSED experiment with the runs that have no terminal record
    /// yet. Returns the number of runs left; zero means the experiment was
    /// completed on the spot.
    pub async fn resume(&self, experiment_id: ExperimentId) -> Result<usize> {
        let mut experiment = self.load_experiment(&experiment_id).await?;
        experiment.ensure_resumable()?;

        let config = experiment.parse_config()?;
        let all_runs = expand_runs(&config)?;
        let persisted = self.inner.deps.runs.find_by_experiment_id(&experiment_id).await?;

        let mut finished = HashSet::new();
        let mut pending = HashMap::new();
        for run in &persisted {
            let key = RunConfiguration::new(
                run.model_name.clone(),
                run.embedding_model.clone(),
                run.iteration,
            );
            if run.is_terminal() {
                finished.insert(key);
            } else {
                pending.entry(key).or_insert_with(|| run.clone());
            }
        }

        let remaining: Vec<RunConfiguration> = all_runs
            .iter()
            .filter(|run| !finished.contains(*run))
            .cloned()
            .collect();
        let completed = all_runs.len() - remaining.len();

        if remaining.is_empty() {
            experiment.transition_to(ExperimentStatus::Completed)?;
            self.inner
                .deps
                .experiments
                .update_status(&experiment_id, ExperimentStatus::Completed)
                .await?;

            info!(%experiment_id, "Nothing left to run, experiment completed");
            self.publish_completion(
                experiment_id,
                ExperimentStatus::Completed,
                RunStatistics::from_runs(&persisted),
                0,
            );
            return Ok(0);
        }

        let template = self.load_task_template(&experiment).await?;

        experiment.transition_to(ExperimentStatus::Running)?;
        let state = self
            .inner
            .registry
            .try_register(experiment_id, all_runs.len(), completed)?;
        self.persist_running(&experiment_id).await?;

        let remaining_count = remaining.len();
        info!(
            %experiment_id,
            completed,
            remaining = remaining_count,
            "Resuming experiment"
        );

        self.launch(ExecutionPlan {
            experiment_id,
            prompt: template.render(&config.variables()),
            config,
            runs: remaining,
            pending,
            state,
        });

        Ok(remaining_count)
    }

    /// Ask the loop to pause at the next run boundary. Returns false when the
    /// experiment is not executing.
    pub fn pause(&self, experiment_id: &ExperimentId) -> bool {
        let requested = self.inner.registry.request_pause(experiment_id);
        if requested {
            info!(%experiment_id, "Pause requested");
        } else {
            debug!(%experiment_id, "Pause ignored, experiment is not executing");
        }
        requested
    }

    /// Ask the loop to stop at the next run boundary and fail the experiment.
    pub fn cancel(&self, experiment_id: &ExperimentId) -> bool {
        let requested = self.inner.registry.request_cancel(experiment_id);
        if requested {
            info!(%experiment_id, "Cancel requested");
        } else {
            debug!(%experiment_id, "Cancel ignored, experiment is not executing");
        }
        requested
    }

    pub fn progress(&self, experiment_id: &ExperimentId) -> Option<ExecutionProgress> {
        self.inner.registry.progress(experiment_id)
    }

    pub fn is_executing(&self, experiment_id: &ExperimentId) -> bool {
        self.inner.registry.is_active(experiment_id)
    }

    pub fn subscribe(&self, experiment_id: ExperimentId) -> broadcast::Receiver<ProgressEvent> {
        self.inner.publisher.subscribe(experiment_id)
    }

    /// Subscription that cleans up the experiment's topic when dropped.
    pub fn watch(&self, experiment_id: ExperimentId) -> Subscription {
        self.inner.publisher.watch(experiment_id)
    }

    pub fn registry(&self) -> &ExecutionRegistry {
        &self.inner.registry
    }

    pub fn publisher(&self) -> &ProgressPublisher {
        &self.inner.publisher
    }

    async fn load_experiment(&self, experiment_id: &ExperimentId) -> Result<Experiment> {
        self.inner
            .deps
            .experiments
            .find_by_id(experiment_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Experiment {} not found", experiment_id)))
    }

    async fn load_task_template(&self, experiment: &Experiment) -> Result<TaskTemplate> {
        let template_id = experiment.task_template_id.ok_or_else(|| {
            CoreError::Configuration(format!(
                "Experiment {} has no task template",
                experiment.id
            ))
        })?;

        self.inner
            .deps
            .task_templates
            .find_by_id(&template_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task template {} not found", template_id)))
    }

    async fn persist_running(&self, experiment_id: &ExperimentId) -> Result<()> {
        let result = self
            .inner
            .deps
            .experiments
            .update_status(experiment_id, ExperimentStatus::Running)
            .await;

        if result.is_err() {
            self.inner.registry.remove(experiment_id);
        }
        result
    }

    fn launch(&self, plan: ExecutionPlan) {
        let executor = self.clone();
        let span = tracing::info_span!("experiment", experiment_id = %plan.experiment_id);
        tokio::spawn(async move { executor.run_loop(plan).await }.instrument(span));
    }

    async fn run_loop(self, plan: ExecutionPlan) {
        let experiment_id = plan.experiment_id;
        let started = Instant::now();
        let system_prompt = self.resolve_system_prompt(&plan.config).await;

        for run_config in &plan.runs {
            if plan.state.cancel_requested() {
                info!(completed = plan.state.completed(), "Experiment cancelled");
                self.finish(experiment_id, ExperimentStatus::Failed, started).await;
                return;
            }
            if plan.state.pause_requested() {
                self.pause_loop(&plan).await;
                return;
            }

            if let Err(e) = self
                .execute_single_run(&plan, run_config, system_prompt.as_deref())
                .await
            {
                error!(
                    model = %run_config.model,
                    iteration = run_config.iteration,
                    "Could not record run: {}",
                    e
                );
                self.publish(
                    experiment_id,
                    EventPayload::Error {
                        message: e.to_string(),
                    },
                );
            }

            plan.state.record_completion();
            self.publish(
                experiment_id,
                EventPayload::Progress(plan.state.progress()),
            );
        }

        let status = if plan.state.cancel_requested() {
            info!("Experiment cancelled during its last run");
            ExperimentStatus::Failed
        } else {
            ExperimentStatus::Completed
        };
        self.finish(experiment_id, status, started).await;
    }

    /// Persist a PENDING run (or reuse the one left over from an interrupted
    /// loop), call the model, then persist the outcome. Inference failures
    /// are recorded on the run; only storage failures surface as errors.
    async fn execute_single_run(
        &self,
        plan: &ExecutionPlan,
        run_config: &RunConfiguration,
        system_prompt: Option<&str>,
    ) -> Result<ExperimentRun> {
        let deps = &self.inner.deps;
        let mut run = match plan.pending.get(run_config) {
            Some(existing) => existing.clone(),
            None => ExperimentRun::new(
                plan.experiment_id,
                run_config.model.clone(),
                run_config.embedding_model.clone(),
                run_config.iteration,
            ),
        };
        deps.runs.save(&run).await?;

        self.publish(
            plan.experiment_id,
            EventPayload::RunStarted {
                run_id: run.id,
                model: run.model_name.clone(),
                embedding_model: run.embedding_model.clone(),
                iteration: run.iteration,
            },
        );

        let started = Instant::now();
        match self.generate(plan, run_config, system_prompt).await {
            Ok(response) => {
                debug!(
                    run_id = %run.id,
                    model = %run.model_name,
                    iteration = run.iteration,
                    duration_ms = response.duration_ms,
                    "Run succeeded"
                );
                run.succeed(&response)?;
            }
            Err(e) => {
                warn!(
                    run_id = %run.id,
                    model = %run.model_name,
                    iteration = run.iteration,
                    "Run failed: {}",
                    e
                );
                run.fail(e.to_string(), Some(started.elapsed().as_millis() as u64))?;
            }
        }
        deps.runs.save(&run).await?;

        metrics::counter!(RUNS_TOTAL, "status" => run.status.as_str()).increment(1);
        if let Some(duration_ms) = run.duration_ms {
            metrics::histogram!(RUN_DURATION_SECONDS).record(duration_ms as f64 / 1000.0);
        }

        self.publish(
            plan.experiment_id,
            EventPayload::RunCompleted {
                run_id: run.id,
                model: run.model_name.clone(),
                embedding_model: run.embedding_model.clone(),
                iteration: run.iteration,
                status: run.status,
                duration_ms: run.duration_ms,
                tokens_per_second: run.tokens_per_second,
                error_message: run.error_message.clone(),
            },
        );

        Ok(run)
    }

    async fn generate(
        &self,
        plan: &ExecutionPlan,
        run_config: &RunConfiguration,
        system_prompt: Option<&str>,
    ) -> Result<GenerationResponse> {
        let deps = &self.inner.deps;
        let mut prompt = plan.prompt.clone();

        if let (true, Some(embedding_model)) = (
            plan.config.context_mode.is_rag(),
            run_config.embedding_model.as_deref(),
        ) {
            let document_id = plan.config.document_id.ok_or_else(|| {
                CoreError::Configuration("RAG context mode requires a document".to_string())
            })?;
            let collection = deps.context.collection_name(&document_id, embedding_model);
            let chunks = deps
                .context
                .retrieve(
                    &collection,
                    &plan.prompt,
                    embedding_model,
                    self.inner.config.context_top_k,
                )
                .await?;

            let block = deps.context.assemble_context(&chunks);
            if !block.is_empty() {
                prompt = format!("{}\n\n{}", block, prompt);
            }
        }

        let request = GenerationRequest::new(run_config.model.clone(), prompt)
            .with_system_prompt(system_prompt.map(str::to_string))
            .with_hyperparameters(plan.config.hyperparameters());

        deps.inference.generate(request).await
    }

    async fn resolve_system_prompt(&self, config: &ExperimentConfig) -> Option<String> {
        let prompt_id = config.system_prompt_id?;
        match self.inner.deps.system_prompts.find_by_id(&prompt_id).await {
            Ok(Some(prompt)) => Some(prompt.content),
            Ok(None) => {
                warn!(%prompt_id, "System prompt not found, running without one");
                None
            }
            Err(e) => {
                warn!(%prompt_id, "System prompt lookup failed, running without one: {}", e);
                None
            }
        }
    }

    async fn pause_loop(&self, plan: &ExecutionPlan) {
        let experiment_id = plan.experiment_id;
        let progress = plan.state.progress();
        self.inner.registry.remove(&experiment_id);

        if let Err(e) = self
            .inner
            .deps
            .experiments
            .update_status(&experiment_id, ExperimentStatus::Paused)
            .await
        {
            error!("Could not persist PAUSED status: {}", e);
            self.publish(
                experiment_id,
                EventPayload::Error {
                    message: e.to_string(),
                },
            );
        }

        info!(
            completed = progress.completed,
            remaining = progress.remaining(),
            "Experiment paused"
        );
        self.publish(
            experiment_id,
            EventPayload::ExperimentPaused {
                completed_runs: progress.completed,
                remaining_runs: progress.remaining(),
                total_runs: progress.total,
            },
        );
        self.inner.publisher.prune(&experiment_id);
    }

    async fn finish(&self, experiment_id: ExperimentId, status: ExperimentStatus, started: Instant) {
        self.inner.registry.remove(&experiment_id);

        if let Err(e) = self
            .inner
            .deps
            .experiments
            .update_status(&experiment_id, status)
            .await
        {
            error!("Could not persist {} status: {}", status, e);
            self.publish(
                experiment_id,
                EventPayload::Error {
                    message: e.to_string(),
                },
            );
        }

        let statistics = match self.inner.deps.runs.find_by_experiment_id(&experiment_id).await {
            Ok(runs) => RunStatistics::from_runs(&runs),
            Err(e) => {
                error!("Could not load runs for statistics: {}", e);
                RunStatistics::default()
            }
        };

        info!(
            %status,
            successful = statistics.successful_runs,
            failed = statistics.failed_runs,
            "Experiment finished"
        );
        self.publish_completion(
            experiment_id,
            status,
            statistics,
            started.elapsed().as_millis() as u64,
        );
    }

    fn publish_completion(
        &self,
        experiment_id: ExperimentId,
        status: ExperimentStatus,
        statistics: RunStatistics,
        total_duration_ms: u64,
    ) {
        metrics::counter!(EXPERIMENTS_FINISHED_TOTAL, "status" => status.as_str())
            .increment(1);
        self.publish(
            experiment_id,
            EventPayload::experiment_completed(status, statistics, total_duration_ms),
        );
        self.inner.publisher.prune(&experiment_id);
    }

    fn publish(&self, experiment_id: ExperimentId, payload: EventPayload) {
        self.inner
            .publisher
            .publish(ProgressEvent::new(experiment_id, payload));
    }
}
