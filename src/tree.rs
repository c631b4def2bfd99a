//! Project and file-tree data layer.
//!
//! Every entry point runs behind [`authorize_project`] / [`authorize_file`]:
//! resolve the owning project, compare its owner against the caller subject,
//! and collapse "missing" and "not yours" into one error. Multi-step
//! mutations (uniqueness check + insert, subtree delete, rename, content
//! update) each run inside a single transaction.

use std::path::Path;

use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::{
    blobs,
    error::AppError,
    models::{
        files::{FileNode, NodeKind, PathSegment},
        projects::Project,
    },
};

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    owner_id: String,
    name: String,
    updated_at: i64,
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: String,
    project_id: String,
    parent_id: Option<String>,
    name: String,
    kind: String,
    content: Option<String>,
    storage_id: Option<String>,
    updated_at: i64,
}

fn to_project(row: ProjectRow) -> Project {
    Project {
        id: row.id,
        owner_id: row.owner_id,
        name: row.name,
        updated_at: row.updated_at,
    }
}

fn to_file_node(row: FileRow) -> FileNode {
    FileNode {
        id: row.id,
        project_id: row.project_id,
        parent_id: row.parent_id,
        name: row.name,
        kind: NodeKind::from_db_value(&row.kind),
        content: row.content,
        storage_id: row.storage_id,
        updated_at: row.updated_at,
    }
}

const FILE_COLUMNS: &str =
    "id, project_id, parent_id, name, kind, content, storage_id, updated_at";

/// Ownership guard: loads the project and checks the caller owns it. A project
/// that does not exist and a project owned by someone else produce the same
/// error.
pub async fn authorize_project(
    pool: &SqlitePool,
    project_id: &str,
    subject: &str,
) -> Result<Project, AppError> {
    let row = sqlx::query_as::<_, ProjectRow>(
        "SELECT id, owner_id, name, updated_at FROM projects WHERE id = ?1 LIMIT 1",
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Database)?;

    match row {
        Some(row) if row.owner_id == subject => Ok(to_project(row)),
        _ => Err(AppError::project_access()),
    }
}

/// Ownership guard for a node: resolves the node, then authorizes through its
/// owning project.
pub async fn authorize_file(
    pool: &SqlitePool,
    file_id: &str,
    subject: &str,
) -> Result<FileNode, AppError> {
    let row = sqlx::query_as::<_, FileRow>(&format!(
        "SELECT {FILE_COLUMNS} FROM files WHERE id = ?1 LIMIT 1"
    ))
    .bind(file_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Database)?
    .ok_or_else(|| AppError::NotFound("file not found".into()))?;

    authorize_project(pool, &row.project_id, subject).await?;
    Ok(to_file_node(row))
}

pub async fn create_project(
    pool: &SqlitePool,
    subject: &str,
    name: &str,
) -> Result<Project, AppError> {
    let project = Project {
        id: new_id(),
        owner_id: subject.to_string(),
        name: name.to_string(),
        updated_at: now_ms(),
    };

    sqlx::query("INSERT INTO projects (id, owner_id, name, updated_at) VALUES (?1, ?2, ?3, ?4)")
        .bind(&project.id)
        .bind(&project.owner_id)
        .bind(&project.name)
        .bind(project.updated_at)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

    Ok(project)
}

pub async fn list_projects(pool: &SqlitePool, subject: &str) -> Result<Vec<Project>, AppError> {
    let rows = sqlx::query_as::<_, ProjectRow>(
        "SELECT id, owner_id, name, updated_at FROM projects WHERE owner_id = ?1 ORDER BY updated_at DESC",
    )
    .bind(subject)
    .fetch_all(pool)
    .await
    .map_err(AppError::Database)?;

    Ok(rows.into_iter().map(to_project).collect())
}

/// Flat, unordered listing of every node in a project.
pub async fn list_files(pool: &SqlitePool, project_id: &str) -> Result<Vec<FileNode>, AppError> {
    let rows = sqlx::query_as::<_, FileRow>(&format!(
        "SELECT {FILE_COLUMNS} FROM files WHERE project_id = ?1"
    ))
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::Database)?;

    Ok(rows.into_iter().map(to_file_node).collect())
}

/// Direct children of one directory, folders before files, case-insensitive
/// alphabetical within each group. A `None` parent means the project root.
pub async fn folder_contents(
    pool: &SqlitePool,
    project_id: &str,
    parent_id: Option<&str>,
) -> Result<Vec<FileNode>, AppError> {
    let order = "ORDER BY CASE kind WHEN 'folder' THEN 0 ELSE 1 END, name COLLATE NOCASE ASC";

    let rows = if let Some(parent) = parent_id {
        sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE project_id = ?1 AND parent_id = ?2 {order}"
        ))
        .bind(project_id)
        .bind(parent)
        .fetch_all(pool)
        .await
    } else {
        sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE project_id = ?1 AND parent_id IS NULL {order}"
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }
    .map_err(AppError::Database)?;

    Ok(rows.into_iter().map(to_file_node).collect())
}

/// Walks `parent_id` links from the given node up to a root and returns the
/// chain in root-to-leaf order. A dangling parent reference stops the walk
/// and truncates the path rather than failing; the row is logged since it
/// indicates an orphaned reference.
pub async fn file_path(pool: &SqlitePool, file_id: &str) -> Result<Vec<PathSegment>, AppError> {
    let mut path: Vec<PathSegment> = Vec::new();
    let mut current = Some(file_id.to_string());

    while let Some(id) = current {
        let row: Option<(String, String, Option<String>)> =
            sqlx::query_as("SELECT id, name, parent_id FROM files WHERE id = ?1 LIMIT 1")
                .bind(&id)
                .fetch_optional(pool)
                .await
                .map_err(AppError::Database)?;

        match row {
            Some((id, name, parent_id)) => {
                path.push(PathSegment { id, name });
                current = parent_id;
            }
            None => {
                tracing::warn!(file_id = %id, "path walk hit a dangling parent reference, truncating");
                break;
            }
        }
    }

    path.reverse();
    Ok(path)
}

async fn sibling_exists(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: &str,
    parent_id: Option<&str>,
    name: &str,
    kind: NodeKind,
    exclude_id: Option<&str>,
) -> Result<bool, AppError> {
    let count: i64 = if let Some(parent) = parent_id {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM files
            WHERE project_id = ?1 AND parent_id = ?2 AND name = ?3 AND kind = ?4
              AND (?5 IS NULL OR id <> ?5)
            "#,
        )
        .bind(project_id)
        .bind(parent)
        .bind(name)
        .bind(kind.as_db_value())
        .bind(exclude_id)
        .fetch_one(&mut **tx)
        .await
    } else {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM files
            WHERE project_id = ?1 AND parent_id IS NULL AND name = ?2 AND kind = ?3
              AND (?4 IS NULL OR id <> ?4)
            "#,
        )
        .bind(project_id)
        .bind(name)
        .bind(kind.as_db_value())
        .bind(exclude_id)
        .fetch_one(&mut **tx)
        .await
    }
    .map_err(AppError::Database)?;

    Ok(count > 0)
}

async fn touch_project(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: &str,
    timestamp: i64,
) -> Result<(), AppError> {
    sqlx::query("UPDATE projects SET updated_at = ?1 WHERE id = ?2")
        .bind(timestamp)
        .bind(project_id)
        .execute(&mut **tx)
        .await
        .map_err(AppError::Database)?;
    Ok(())
}

pub struct CreateNodeParams<'a> {
    pub project_id: &'a str,
    pub parent_id: Option<String>,
    pub name: &'a str,
    pub kind: NodeKind,
    pub content: Option<String>,
    pub storage_id: Option<String>,
}

/// Inserts one node after validating the parent and the per-directory,
/// per-kind name uniqueness rule. A file and a folder may share a name in the
/// same directory; two nodes of the same kind may not. Returns the new id.
pub async fn create_node(
    pool: &SqlitePool,
    params: CreateNodeParams<'_>,
) -> Result<String, AppError> {
    let mut tx = pool.begin().await.map_err(AppError::Database)?;

    if let Some(parent) = params.parent_id.as_deref() {
        let parent_kind: Option<String> = sqlx::query_scalar(
            "SELECT kind FROM files WHERE id = ?1 AND project_id = ?2 LIMIT 1",
        )
        .bind(parent)
        .bind(params.project_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        match parent_kind.as_deref() {
            None => {
                return Err(AppError::NotFound(
                    "parent folder not found in this project".into(),
                ));
            }
            Some(kind) if NodeKind::from_db_value(kind) != NodeKind::Folder => {
                return Err(AppError::BadRequest("parent is not a folder".into()));
            }
            Some(_) => {}
        }
    }

    if sibling_exists(
        &mut tx,
        params.project_id,
        params.parent_id.as_deref(),
        params.name,
        params.kind,
        None,
    )
    .await?
    {
        return Err(AppError::AlreadyExists(format!(
            "a {} with this name already exists in this location",
            params.kind
        )));
    }

    let id = new_id();
    sqlx::query(
        r#"
        INSERT INTO files (id, project_id, parent_id, name, kind, content, storage_id, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&id)
    .bind(params.project_id)
    .bind(params.parent_id.as_deref())
    .bind(params.name)
    .bind(params.kind.as_db_value())
    .bind(params.content.as_deref())
    .bind(params.storage_id.as_deref())
    .bind(now_ms())
    .execute(&mut *tx)
    .await
    .map_err(AppError::Database)?;

    touch_project(&mut tx, params.project_id, now_ms()).await?;
    tx.commit().await.map_err(AppError::Database)?;

    Ok(id)
}

/// Renames a node. The clash check matches the node's own kind only, so a
/// file may take the name of a sibling folder and vice versa.
pub async fn rename_node(
    pool: &SqlitePool,
    node: &FileNode,
    new_name: &str,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await.map_err(AppError::Database)?;

    if sibling_exists(
        &mut tx,
        &node.project_id,
        node.parent_id.as_deref(),
        new_name,
        node.kind,
        Some(&node.id),
    )
    .await?
    {
        return Err(AppError::AlreadyExists(format!(
            "a {} with this name already exists in this location",
            node.kind
        )));
    }

    sqlx::query("UPDATE files SET name = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(new_name)
        .bind(now_ms())
        .bind(&node.id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

    touch_project(&mut tx, &node.project_id, now_ms()).await?;
    tx.commit().await.map_err(AppError::Database)
}

/// Replaces a file's content. The node and its project are stamped with the
/// same captured timestamp so one edit yields one logical instant.
pub async fn update_content(
    pool: &SqlitePool,
    node: &FileNode,
    content: &str,
) -> Result<(), AppError> {
    let now = now_ms();
    let mut tx = pool.begin().await.map_err(AppError::Database)?;

    sqlx::query("UPDATE files SET content = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(content)
        .bind(now)
        .bind(&node.id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

    touch_project(&mut tx, &node.project_id, now).await?;
    tx.commit().await.map_err(AppError::Database)
}

/// Removes a node and, for folders, its whole subtree. The walk is iterative
/// (explicit stack, no call-stack recursion) and collects the subtree in
/// depth-first order; rows are then deleted in reverse so children always go
/// before their parents, with any referenced blob removed ahead of its row.
/// All row deletions and the single project touch commit in one transaction;
/// blob removal is a filesystem operation and cannot be rolled back with
/// them. Returns the number of nodes removed.
pub async fn delete_subtree(
    pool: &SqlitePool,
    data_root: &Path,
    node: &FileNode,
) -> Result<usize, AppError> {
    let mut tx = pool.begin().await.map_err(AppError::Database)?;

    let mut stack: Vec<(String, Option<String>)> =
        vec![(node.id.clone(), node.storage_id.clone())];
    let mut ordered: Vec<(String, Option<String>)> = Vec::new();

    while let Some((id, storage_id)) = stack.pop() {
        let children: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT id, storage_id FROM files WHERE project_id = ?1 AND parent_id = ?2")
                .bind(&node.project_id)
                .bind(&id)
                .fetch_all(&mut *tx)
                .await
                .map_err(AppError::Database)?;

        ordered.push((id, storage_id));
        stack.extend(children);
    }

    for (id, storage_id) in ordered.iter().rev() {
        if let Some(storage_id) = storage_id {
            blobs::delete_blob(data_root, storage_id).await?;
        }
        sqlx::query("DELETE FROM files WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
    }

    touch_project(&mut tx, &node.project_id, now_ms()).await?;
    tx.commit().await.map_err(AppError::Database)?;

    Ok(ordered.len())
}
