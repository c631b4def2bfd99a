//! Text-generation jobs. Enqueueing inserts a PENDING row and spawns a
//! background task; the task calls the configured provider and records the
//! outcome on the row for the client to poll.

use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::{
    config::GenerationConfig,
    error::AppError,
    models::generations::{Generation, GenerationStatus},
    tree::{new_id, now_ms},
};

#[derive(sqlx::FromRow)]
struct GenerationRow {
    id: String,
    owner_id: String,
    project_id: Option<String>,
    prompt: String,
    status: String,
    output: Option<String>,
    error: Option<String>,
    updated_at: i64,
}

fn to_generation(row: GenerationRow) -> Generation {
    Generation {
        id: row.id,
        project_id: row.project_id,
        prompt: row.prompt,
        status: GenerationStatus::from_db_value(&row.status),
        output: row.output,
        error: row.error,
        updated_at: row.updated_at,
    }
}

pub async fn enqueue(
    pool: &SqlitePool,
    subject: &str,
    project_id: Option<&str>,
    prompt: &str,
) -> Result<Generation, AppError> {
    let generation = Generation {
        id: new_id(),
        project_id: project_id.map(str::to_owned),
        prompt: prompt.to_string(),
        status: GenerationStatus::Pending,
        output: None,
        error: None,
        updated_at: now_ms(),
    };

    sqlx::query(
        r#"
        INSERT INTO generations (id, owner_id, project_id, prompt, status, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&generation.id)
    .bind(subject)
    .bind(generation.project_id.as_deref())
    .bind(&generation.prompt)
    .bind(generation.status.as_db_value())
    .bind(generation.updated_at)
    .execute(pool)
    .await
    .map_err(AppError::Database)?;

    Ok(generation)
}

/// Fetch one job, visible to its owner only. Missing and foreign jobs are
/// indistinguishable to the caller.
pub async fn get(
    pool: &SqlitePool,
    subject: &str,
    generation_id: &str,
) -> Result<Generation, AppError> {
    let row = sqlx::query_as::<_, GenerationRow>(
        r#"
        SELECT id, owner_id, project_id, prompt, status, output, error, updated_at
        FROM generations WHERE id = ?1 LIMIT 1
        "#,
    )
    .bind(generation_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Database)?;

    match row {
        Some(row) if row.owner_id == subject => Ok(to_generation(row)),
        _ => Err(AppError::NotFound("generation not found".into())),
    }
}

async fn set_status(
    pool: &SqlitePool,
    generation_id: &str,
    status: GenerationStatus,
    output: Option<&str>,
    error: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE generations SET status = ?1, output = ?2, error = ?3, updated_at = ?4 WHERE id = ?5",
    )
    .bind(status.as_db_value())
    .bind(output)
    .bind(error)
    .bind(now_ms())
    .bind(generation_id)
    .execute(pool)
    .await
    .map_err(AppError::Database)?;
    Ok(())
}

#[derive(Deserialize)]
struct ProviderResponse {
    text: String,
}

async fn call_provider(
    http: &reqwest::Client,
    config: &GenerationConfig,
    prompt: &str,
) -> Result<String, String> {
    let api_url = config
        .api_url
        .as_deref()
        .ok_or_else(|| "generation provider is not configured".to_string())?;

    let mut request = http.post(api_url).json(&json!({ "prompt": prompt }));
    if let Some(key) = config.api_key.as_deref() {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .map_err(|err| format!("provider request failed: {err}"))?
        .error_for_status()
        .map_err(|err| format!("provider returned an error: {err}"))?;

    let body: ProviderResponse = response
        .json()
        .await
        .map_err(|err| format!("provider response was not understood: {err}"))?;

    Ok(body.text)
}

/// Background task body for one job. Failures are recorded on the row, never
/// propagated; there is no caller left to receive them.
pub async fn run(
    pool: SqlitePool,
    http: reqwest::Client,
    config: GenerationConfig,
    generation_id: String,
    prompt: String,
) {
    if let Err(err) = set_status(&pool, &generation_id, GenerationStatus::Running, None, None).await
    {
        warn!(generation_id, error = %err, "failed to mark generation running");
        return;
    }

    let result = call_provider(&http, &config, &prompt).await;

    let update = match &result {
        Ok(text) => {
            info!(generation_id, "generation completed");
            set_status(&pool, &generation_id, GenerationStatus::Ready, Some(text), None).await
        }
        Err(message) => {
            warn!(generation_id, error = %message, "generation failed");
            set_status(
                &pool,
                &generation_id,
                GenerationStatus::Failed,
                None,
                Some(message),
            )
            .await
        }
    };

    if let Err(err) = update {
        warn!(generation_id, error = %err, "failed to record generation outcome");
    }
}
