use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

impl NodeKind {
    pub fn from_db_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("folder") {
            NodeKind::Folder
        } else {
            NodeKind::File
        }
    }

    pub fn as_db_value(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Folder => "folder",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_value())
    }
}

/// One entry in a project's file tree. `parent_id` absent means the node sits
/// at the project root. `content` is only meaningful for files; `storage_id`
/// references a blob in the on-disk store when the node was created from an
/// uploaded asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    pub id: String,
    pub project_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub kind: NodeKind,
    pub content: Option<String>,
    pub storage_id: Option<String>,
    pub updated_at: i64,
}

/// One hop of a root-to-leaf path, used for breadcrumb navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSegment {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_db_values() {
        assert_eq!(NodeKind::from_db_value("folder"), NodeKind::Folder);
        assert_eq!(NodeKind::from_db_value("FOLDER"), NodeKind::Folder);
        assert_eq!(NodeKind::from_db_value("file"), NodeKind::File);
        assert_eq!(NodeKind::from_db_value("anything"), NodeKind::File);
        assert_eq!(NodeKind::Folder.as_db_value(), "folder");
    }
}
