#![allow(dead_code)]

use fake::faker::lorem::en::{Sentence, Word};
use fake::Fake;
use locallab_core::domain::{
    Experiment, ExperimentConfig, ExperimentId, ExperimentRun, ExperimentStatus,
    GenerationResponse, SystemPrompt, TaskTemplate,
};

/// Generate a random draft experiment bound to `template`.
pub fn create_test_experiment(template: &TaskTemplate) -> Experiment {
    let name: String = Sentence(2..5).fake();
    Experiment::new(name, Some(template.id))
        .with_description(Sentence(4..10).fake())
        .with_config(&ExperimentConfig::new(vec![Word().fake()]))
        .expect("generated config is valid")
}

pub fn create_test_experiment_with_status(
    template: &TaskTemplate,
    status: ExperimentStatus,
) -> Experiment {
    let mut experiment = create_test_experiment(template);
    experiment.status = status;
    experiment
}

pub fn create_test_template() -> TaskTemplate {
    TaskTemplate::new(Word().fake(), "Explain {{topic}} briefly.".to_string())
}

pub fn create_test_system_prompt() -> SystemPrompt {
    SystemPrompt::new(Word().fake(), Sentence(3..8).fake())
}

pub fn create_test_run(experiment_id: ExperimentId, iteration: u32) -> ExperimentRun {
    ExperimentRun::new(experiment_id, Word().fake(), None, iteration)
}

pub fn create_successful_run(experiment_id: ExperimentId, iteration: u32) -> ExperimentRun {
    let mut run = create_test_run(experiment_id, iteration);
    run.succeed(&GenerationResponse {
        text: Sentence(5..12).fake(),
        duration_ms: (50..2_000).fake(),
        tokens_per_second: Some((5.0..80.0).fake()),
        time_to_first_token_ms: Some((5..200).fake()),
        prompt_tokens: Some((10..200).fake()),
        completion_tokens: Some((10..400).fake()),
    })
    .expect("fresh run accepts an outcome");
    run
}
