use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    Pending,
    Running,
    Ready,
    Failed,
}

impl GenerationStatus {
    pub fn from_db_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("READY") {
            GenerationStatus::Ready
        } else if value.eq_ignore_ascii_case("RUNNING") {
            GenerationStatus::Running
        } else if value.eq_ignore_ascii_case("FAILED") {
            GenerationStatus::Failed
        } else {
            GenerationStatus::Pending
        }
    }

    pub fn as_db_value(self) -> &'static str {
        match self {
            GenerationStatus::Pending => "PENDING",
            GenerationStatus::Running => "RUNNING",
            GenerationStatus::Ready => "READY",
            GenerationStatus::Failed => "FAILED",
        }
    }
}

/// A text-generation job. Jobs are enqueued synchronously and executed by a
/// background task; clients poll for the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub id: String,
    pub project_id: Option<String>,
    pub prompt: String,
    pub status: GenerationStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub updated_at: i64,
}
