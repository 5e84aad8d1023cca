use async_trait::async_trait;
use locallab_core::domain::{SystemPrompt, SystemPromptId, TaskTemplate, TaskTemplateId};
use locallab_core::{Repository, Result};
use sqlx::{postgres::PgRow, PgPool, Row};

pub struct TaskTemplateRepository {
    pool: PgPool,
}

impl TaskTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<TaskTemplate, TaskTemplateId> for TaskTemplateRepository {
    async fn find_by_id(&self, id: &TaskTemplateId) -> Result<Option<TaskTemplate>> {
        let row = sqlx::query(
            "SELECT id, name, prompt_template, created_at FROM task_templates WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_task_template).transpose()
    }

    async fn save(&self, entity: &TaskTemplate) -> Result<TaskTemplate> {
        let row = sqlx::query(
            r#"
            INSERT INTO task_templates (id, name, prompt_template, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                prompt_template = EXCLUDED.prompt_template
            RETURNING id, name, prompt_template, created_at
            "#,
        )
        .bind(entity.id.0)
        .bind(&entity.name)
        .bind(&entity.prompt_template)
        .bind(entity.created_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_task_template(row)
    }

    async fn delete(&self, id: &TaskTemplateId) -> Result<()> {
        sqlx::query("DELETE FROM task_templates WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_task_template(row: PgRow) -> Result<TaskTemplate> {
    Ok(TaskTemplate {
        id: TaskTemplateId(row.try_get("id")?),
        name: row.try_get("name")?,
        prompt_template: row.try_get("prompt_template")?,
        created_at: row.try_get("created_at")?,
    })
}

pub struct SystemPromptRepository {
    pool: PgPool,
}

impl SystemPromptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<SystemPrompt, SystemPromptId> for SystemPromptRepository {
    async fn find_by_id(&self, id: &SystemPromptId) -> Result<Option<SystemPrompt>> {
        let row = sqlx::query("SELECT id, name, content, created_at FROM system_prompts WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_system_prompt).transpose()
    }

    async fn save(&self, entity: &SystemPrompt) -> Result<SystemPrompt> {
        let row = sqlx::query(
            r#"
            INSERT INTO system_prompts (id, name, content, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                content = EXCLUDED.content
            RETURNING id, name, content, created_at
            "#,
        )
        .bind(entity.id.0)
        .bind(&entity.name)
        .bind(&entity.content)
        .bind(entity.created_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_system_prompt(row)
    }

    async fn delete(&self, id: &SystemPromptId) -> Result<()> {
        sqlx::query("DELETE FROM system_prompts WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_system_prompt(row: PgRow) -> Result<SystemPrompt> {
    Ok(SystemPrompt {
        id: SystemPromptId(row.try_get("id")?),
        name: row.try_get("name")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}
