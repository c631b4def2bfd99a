pub mod auth;
pub mod blobs;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod models;
pub mod routes;
pub mod tree;

use std::path::PathBuf;

use sqlx::SqlitePool;

use config::GenerationConfig;

/// Shared per-process state handed to every handler.
pub struct AppState {
    pub pool: SqlitePool,
    pub data_root: PathBuf,
    pub http: reqwest::Client,
    pub generation: GenerationConfig,
}
