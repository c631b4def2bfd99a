use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

use crate::error::AppError;

pub fn init_pool(database_url: &str) -> Result<SqlitePool, AppError> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_lazy(database_url)
        .map_err(AppError::Database)
}

pub async fn prepare_schema(pool: &SqlitePool, reset: bool) -> Result<(), AppError> {
    if reset {
        reset_schema(pool).await?;
    }
    create_schema(pool).await
}

async fn reset_schema(pool: &SqlitePool) -> Result<(), AppError> {
    let drop_statements = [
        "DROP TABLE IF EXISTS generations",
        "DROP TABLE IF EXISTS files",
        "DROP TABLE IF EXISTS projects",
    ];

    for statement in drop_statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
    }

    Ok(())
}

async fn create_schema(pool: &SqlitePool) -> Result<(), AppError> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            parent_id TEXT REFERENCES files(id),
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            content TEXT,
            storage_id TEXT,
            updated_at INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS generations (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            project_id TEXT REFERENCES projects(id),
            prompt TEXT NOT NULL,
            status TEXT NOT NULL,
            output TEXT,
            error TEXT,
            updated_at INTEGER NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects (owner_id, updated_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_files_project ON files (project_id)",
        "CREATE INDEX IF NOT EXISTS idx_files_project_parent ON files (project_id, parent_id)",
        "CREATE INDEX IF NOT EXISTS idx_generations_owner ON generations (owner_id)",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
    }

    Ok(())
}
