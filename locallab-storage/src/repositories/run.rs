use async_trait::async_trait;
use chrono::{DateTime, Utc};
use locallab_core::domain::{ExperimentId, ExperimentRun, RunId, RunStatus};
use locallab_core::{CoreError, Repository, Result, RunStore};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

const RUN_COLUMNS: &str = "id, experiment_id, model_name, embedding_model, iteration, status, \
     output, error_message, duration_ms, tokens_per_second, time_to_first_token_ms, \
     prompt_tokens, completion_tokens, created_at";

pub struct RunRepository {
    pool: PgPool,
}

impl RunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, run: &ExperimentRun) -> Result<ExperimentRun> {
        let query = format!(
            r#"
            INSERT INTO experiment_runs (
                id, experiment_id, model_name, embedding_model, iteration, status,
                output, error_message, duration_ms, tokens_per_second, time_to_first_token_ms,
                prompt_tokens, completion_tokens, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status,
                output = EXCLUDED.output,
                error_message = EXCLUDED.error_message,
                duration_ms = EXCLUDED.duration_ms,
                tokens_per_second = EXCLUDED.tokens_per_second,
                time_to_first_token_ms = EXCLUDED.time_to_first_token_ms,
                prompt_tokens = EXCLUDED.prompt_tokens,
                completion_tokens = EXCLUDED.completion_tokens
            RETURNING {}
            "#,
            RUN_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(run.id.0)
            .bind(run.experiment_id.0)
            .bind(&run.model_name)
            .bind(&run.embedding_model)
            .bind(run.iteration as i32)
            .bind(run.status.as_str())
            .bind(&run.output)
            .bind(&run.error_message)
            .bind(run.duration_ms.map(|d| d as i64))
            .bind(run.tokens_per_second)
            .bind(run.time_to_first_token_ms.map(|t| t as i64))
            .bind(run.prompt_tokens.map(|t| t as i32))
            .bind(run.completion_tokens.map(|t| t as i32))
            .bind(run.created_at)
            .fetch_one(&self.pool)
            .await?;

        row_to_run(row)
    }

    pub async fn get_by_id(&self, id: &RunId) -> Result<Option<ExperimentRun>> {
        let query = format!("SELECT {} FROM experiment_runs WHERE id = $1", RUN_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_run).transpose()
    }

    /// All runs of an experiment in expansion order.
    pub async fn list_by_experiment(&self, experiment_id: &ExperimentId) -> Result<Vec<ExperimentRun>> {
        let query = format!(
            "SELECT {} FROM experiment_runs WHERE experiment_id = $1 \
             ORDER BY iteration ASC, created_at ASC",
            RUN_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(experiment_id.0)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_run).collect()
    }

    pub async fn count_by_status(&self, experiment_id: &ExperimentId, status: RunStatus) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM experiment_runs WHERE experiment_id = $1 AND status = $2",
        )
        .bind(experiment_id.0)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("count")?)
    }

    pub async fn remove(&self, id: &RunId) -> Result<()> {
        sqlx::query("DELETE FROM experiment_runs WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Repository<ExperimentRun, RunId> for RunRepository {
    async fn find_by_id(&self, id: &RunId) -> Result<Option<ExperimentRun>> {
        self.get_by_id(id).await
    }

    async fn save(&self, entity: &ExperimentRun) -> Result<ExperimentRun> {
        self.upsert(entity).await
    }

    async fn delete(&self, id: &RunId) -> Result<()> {
        self.remove(id).await
    }
}

#[async_trait]
impl RunStore for RunRepository {
    async fn find_by_experiment_id(&self, experiment_id: &ExperimentId) -> Result<Vec<ExperimentRun>> {
        self.list_by_experiment(experiment_id).await
    }
}

fn row_to_run(row: PgRow) -> Result<ExperimentRun> {
    let id: Uuid = row.try_get("id")?;
    let experiment_id: Uuid = row.try_get("experiment_id")?;
    let iteration: i32 = row.try_get("iteration")?;
    let status_str: String = row.try_get("status")?;
    let duration_ms: Option<i64> = row.try_get("duration_ms")?;
    let ttft: Option<i64> = row.try_get("time_to_first_token_ms")?;
    let prompt_tokens: Option<i32> = row.try_get("prompt_tokens")?;
    let completion_tokens: Option<i32> = row.try_get("completion_tokens")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    let status = RunStatus::parse(&status_str)
        .ok_or_else(|| CoreError::Database(format!("Unknown run status '{}' for {}", status_str, id)))?;

    Ok(ExperimentRun {
        id: RunId(id),
        experiment_id: ExperimentId(experiment_id),
        model_name: row.try_get("model_name")?,
        embedding_model: row.try_get("embedding_model")?,
        iteration: iteration.max(0) as u32,
        status,
        output: row.try_get("output")?,
        error_message: row.try_get("error_message")?,
        duration_ms: duration_ms.map(|d| d.max(0) as u64),
        tokens_per_second: row.try_get("tokens_per_second")?,
        time_to_first_token_ms: ttft.map(|t| t.max(0) as u64),
        prompt_tokens: prompt_tokens.map(|t| t.max(0) as u32),
        completion_tokens: completion_tokens.map(|t| t.max(0) as u32),
        created_at,
    })
}
