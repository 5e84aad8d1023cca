use async_trait::async_trait;
use chrono::{DateTime, Utc};
use locallab_core::domain::{Experiment, ExperimentId, ExperimentStatus, TaskTemplateId};
use locallab_core::{CoreError, ExperimentStore, Repository, Result};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

const EXPERIMENT_COLUMNS: &str =
    "id, name, description, task_template_id, status, config, created_at, updated_at";

pub struct ExperimentRepository {
    pool: PgPool,
}

impl ExperimentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the experiment, or overwrite every mutable column if it exists.
    pub async fn upsert(&self, experiment: &Experiment) -> Result<Experiment> {
        let query = format!(
            r#"
            INSERT INTO experiments (
                id, name, description, task_template_id, status, config, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                task_template_id = EXCLUDED.task_template_id,
                status = EXCLUDED.status,
                config = EXCLUDED.config,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            EXPERIMENT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(experiment.id.0)
            .bind(&experiment.name)
            .bind(&experiment.description)
            .bind(experiment.task_template_id.map(|id| id.0))
            .bind(experiment.status.as_str())
            .bind(&experiment.config)
            .bind(experiment.created_at)
            .bind(experiment.updated_at)
            .fetch_one(&self.pool)
            .await?;

        row_to_experiment(row)
    }

    pub async fn get_by_id(&self, id: &ExperimentId) -> Result<Option<Experiment>> {
        let query = format!("SELECT {} FROM experiments WHERE id = $1", EXPERIMENT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_experiment).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<Experiment>> {
        let query = format!(
            "SELECT {} FROM experiments ORDER BY created_at DESC",
            EXPERIMENT_COLUMNS
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.into_iter().map(row_to_experiment).collect()
    }

    pub async fn filter_by_status(&self, status: ExperimentStatus) -> Result<Vec<Experiment>> {
        let query = format!(
            "SELECT {} FROM experiments WHERE status = $1 ORDER BY created_at DESC",
            EXPERIMENT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_experiment).collect()
    }

    pub async fn set_status(&self, id: &ExperimentId, status: ExperimentStatus) -> Result<()> {
        let result = sqlx::query("UPDATE experiments SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id.0)
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Experiment {} not found", id)));
        }
        Ok(())
    }

    pub async fn remove(&self, id: &ExperimentId) -> Result<()> {
        sqlx::query("DELETE FROM experiments WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Repository<Experiment, ExperimentId> for ExperimentRepository {
    async fn find_by_id(&self, id: &ExperimentId) -> Result<Option<Experiment>> {
        self.get_by_id(id).await
    }

    async fn save(&self, entity: &Experiment) -> Result<Experiment> {
        self.upsert(entity).await
    }

    async fn delete(&self, id: &ExperimentId) -> Result<()> {
        self.remove(id).await
    }
}

#[async_trait]
impl ExperimentStore for ExperimentRepository {
    async fn list(&self) -> Result<Vec<Experiment>> {
        self.list_all().await
    }

    async fn update_status(&self, id: &ExperimentId, status: ExperimentStatus) -> Result<()> {
        self.set_status(id, status).await
    }
}

fn row_to_experiment(row: PgRow) -> Result<Experiment> {
    let id: Uuid = row.try_get("id")?;
    let task_template_id: Option<Uuid> = row.try_get("task_template_id")?;
    let status_str: String = row.try_get("status")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    let status = ExperimentStatus::parse(&status_str).ok_or_else(|| {
        CoreError::Database(format!("Unknown experiment status '{}' for {}", status_str, id))
    })?;

    Ok(Experiment {
        id: ExperimentId(id),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        task_template_id: task_template_id.map(TaskTemplateId),
        status,
        config: row.try_get("config")?,
        created_at,
        updated_at,
    })
}
