use std::{env, path::PathBuf};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub data_root: PathBuf,
    pub log_dir: PathBuf,
    pub reset_db: bool,
    pub generation: GenerationConfig,
}

/// Settings for the external text-generation provider. Both values optional;
/// with no URL configured, generation jobs fail with a descriptive message.
#[derive(Debug, Clone, Default)]
pub struct GenerationConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid SERVER_PORT: {err}")))?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://nimbus.db?mode=rwc".into());

        let data_root =
            PathBuf::from(env::var("NIMBUS_DATA_ROOT").unwrap_or_else(|_| "./data/blobs".into()));

        let log_dir = PathBuf::from(env::var("NIMBUS_LOG_DIR").unwrap_or_else(|_| "./log".into()));

        let reset_db = env::var("RESET_DB")
            .unwrap_or_else(|_| "false".into())
            .parse::<bool>()
            .map_err(|err| AppError::Config(format!("invalid RESET_DB: {err}")))?;

        let generation = GenerationConfig {
            api_url: env::var("GENERATION_API_URL").ok().filter(|v| !v.is_empty()),
            api_key: env::var("GENERATION_API_KEY").ok().filter(|v| !v.is_empty()),
        };

        Ok(Self {
            host,
            port,
            database_url,
            data_root,
            log_dir,
            reset_db,
            generation,
        })
    }
}
