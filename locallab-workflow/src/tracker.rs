//! Process-wide registry of executing experiments.
//!
//! An entry exists from the moment an experiment is started or resumed until
//! its loop stops (paused, completed or failed). The loop polls the flags at
//! run boundaries; control calls only ever set them.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use locallab_core::{CoreError, ExperimentId, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct ExecutionState {
    total: usize,
    completed: AtomicUsize,
    pause_requested: AtomicBool,
    cancel_requested: AtomicBool,
}

impl ExecutionState {
    pub fn new(total: usize, completed: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(completed),
            pause_requested: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Record one finished run and return the new completed count.
    pub fn record_completion(&self) -> usize {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn pause_requested(&self) -> bool {
        self.pause_requested.load(Ordering::SeqCst)
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn request_pause(&self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn progress(&self) -> ExecutionProgress {
        ExecutionProgress::new(self.completed(), self.total)
    }
}

/// Snapshot of how far an execution has got.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: f64,
}

impl ExecutionProgress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        Self {
            completed,
            total,
            percent,
        }
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }
}

#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    states: DashMap<ExperimentId, Arc<ExecutionState>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new execution. Fails if the experiment already has one, so
    /// at most one loop runs per experiment.
    pub fn try_register(
        &self,
        experiment_id: ExperimentId,
        total: usize,
        completed: usize,
    ) -> Result<Arc<ExecutionState>> {
        match self.states.entry(experiment_id) {
            Entry::Occupied(_) => Err(CoreError::InvalidState(format!(
                "Experiment {} is already executing",
                experiment_id
            ))),
            Entry::Vacant(slot) => {
                let state = Arc::new(ExecutionState::new(total, completed));
                slot.insert(Arc::clone(&state));
                Ok(state)
            }
        }
    }

    pub fn get(&self, experiment_id: &ExperimentId) -> Option<Arc<ExecutionState>> {
        self.states
            .get(experiment_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns whether a flag was set. Unknown ids are a no-op.
    pub fn request_pause(&self, experiment_id: &ExperimentId) -> bool {
        match self.states.get(experiment_id) {
            Some(state) => {
                state.request_pause();
                true
            }
            None => false,
        }
    }

    /// Returns whether a flag was set. Unknown ids are a no-op.
    pub fn request_cancel(&self, experiment_id: &ExperimentId) -> bool {
        match self.states.get(experiment_id) {
            Some(state) => {
                state.request_cancel();
                true
            }
            None => false,
        }
    }

    pub fn progress(&self, experiment_id: &ExperimentId) -> Option<ExecutionProgress> {
        self.states.get(experiment_id).map(|state| state.progress())
    }

    pub fn is_active(&self, experiment_id: &ExperimentId) -> bool {
        self.states.contains_key(experiment_id)
    }

    pub fn remove(&self, experiment_id: &ExperimentId) {
        self.states.remove(experiment_id);
    }

    pub fn active_count(&self) -> usize {
        self.states.len()
    }
}
