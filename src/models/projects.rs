use serde::{Deserialize, Serialize};

/// Top-level owned container for a file tree. `updated_at` is touched by every
/// mutation of the project's files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub updated_at: i64,
}
