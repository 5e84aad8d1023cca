//! DashMap-backed repositories used when no database is configured, and by
//! tests across the workspace.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use locallab_core::domain::{
    Experiment, ExperimentId, ExperimentRun, ExperimentStatus, RunId, SystemPrompt,
    SystemPromptId, TaskTemplate, TaskTemplateId,
};
use locallab_core::{CoreError, ExperimentStore, Repository, Result, RunStore};
use std::hash::Hash;

trait Keyed {
    type Key: Eq + Hash + Clone + Send + Sync;
    fn key(&self) -> Self::Key;
}

impl Keyed for Experiment {
    type Key = ExperimentId;
    fn key(&self) -> ExperimentId {
        self.id
    }
}

impl Keyed for ExperimentRun {
    type Key = RunId;
    fn key(&self) -> RunId {
        self.id
    }
}

impl Keyed for TaskTemplate {
    type Key = TaskTemplateId;
    fn key(&self) -> TaskTemplateId {
        self.id
    }
}

impl Keyed for SystemPrompt {
    type Key = SystemPromptId;
    fn key(&self) -> SystemPromptId {
        self.id
    }
}

struct MemoryTable<T: Keyed> {
    rows: DashMap<T::Key, T>,
}

impl<T: Keyed + Clone> MemoryTable<T> {
    fn new() -> Self {
        Self { rows: DashMap::new() }
    }

    fn get(&self, id: &T::Key) -> Option<T> {
        self.rows.get(id).map(|entry| entry.value().clone())
    }

    fn put(&self, entity: &T) -> T {
        self.rows.insert(entity.key(), entity.clone());
        entity.clone()
    }

    fn remove(&self, id: &T::Key) {
        self.rows.remove(id);
    }

    fn values(&self) -> Vec<T> {
        self.rows.iter().map(|entry| entry.value().clone()).collect()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

macro_rules! memory_repository {
    ($(#[$meta:meta])* $name:ident, $entity:ty, $id:ty) => {
        $(#[$meta])*
        pub struct $name {
            table: MemoryTable<$entity>,
        }

        impl $name {
            pub fn new() -> Self {
                Self { table: MemoryTable::new() }
            }

            pub fn len(&self) -> usize {
                self.table.len()
            }

            pub fn is_empty(&self) -> bool {
                self.table.len() == 0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        #[async_trait]
        impl Repository<$entity, $id> for $name {
            async fn find_by_id(&self, id: &$id) -> Result<Option<$entity>> {
                Ok(self.table.get(id))
            }

            async fn save(&self, entity: &$entity) -> Result<$entity> {
                Ok(self.table.put(entity))
            }

            async fn delete(&self, id: &$id) -> Result<()> {
                self.table.remove(id);
                Ok(())
            }
        }
    };
}

memory_repository!(InMemoryExperimentRepository, Experiment, ExperimentId);
memory_repository!(InMemoryRunRepository, ExperimentRun, RunId);
memory_repository!(InMemoryTaskTemplateRepository, TaskTemplate, TaskTemplateId);
memory_repository!(InMemorySystemPromptRepository, SystemPrompt, SystemPromptId);

#[async_trait]
impl ExperimentStore for InMemoryExperimentRepository {
    async fn list(&self) -> Result<Vec<Experiment>> {
        let mut experiments = self.table.values();
        experiments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(experiments)
    }

    async fn update_status(&self, id: &ExperimentId, status: ExperimentStatus) -> Result<()> {
        let mut entry = self
            .table
            .rows
            .get_mut(id)
            .ok_or_else(|| CoreError::NotFound(format!("Experiment {} not found", id)))?;
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl RunStore for InMemoryRunRepository {
    async fn find_by_experiment_id(&self, experiment_id: &ExperimentId) -> Result<Vec<ExperimentRun>> {
        let mut runs: Vec<_> = self
            .table
            .values()
            .into_iter()
            .filter(|run| run.experiment_id == *experiment_id)
            .collect();
        runs.sort_by(|a, b| {
            a.iteration
                .cmp(&b.iteration)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(runs)
    }
}
