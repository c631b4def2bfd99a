use actix_multipart::{Field, Multipart};
use actix_web::{HttpResponse, delete, get, post, put, web};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState, auth::Identity, blobs, error::AppError, generation,
    models::files::NodeKind, tree,
};

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(create_project)
        .service(list_projects)
        .service(get_project)
        .service(get_files)
        .service(get_folder_contents)
        .service(upload_asset)
        .service(create_file)
        .service(create_folder)
        .service(get_file)
        .service(get_file_path)
        .service(rename_file)
        .service(update_file)
        .service(delete_file)
        .service(create_generation)
        .service(get_generation);
}

#[get("/healthz")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "nimbus-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn require_field<'a>(value: &'a str, what: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{what} is required")));
    }
    Ok(trimmed)
}

#[derive(Deserialize)]
struct CreateProjectRequest {
    name: String,
}

#[post("/api/projects")]
async fn create_project(
    identity: Identity,
    body: web::Json<CreateProjectRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let name = require_field(&body.name, "project name")?;
    let project = tree::create_project(&state.pool, &identity.subject, name).await?;
    Ok(HttpResponse::Ok().json(project))
}

#[get("/api/projects")]
async fn list_projects(
    identity: Identity,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let projects = tree::list_projects(&state.pool, &identity.subject).await?;
    Ok(HttpResponse::Ok().json(projects))
}

#[get("/api/projects/{project_id}")]
async fn get_project(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let project_id = path.into_inner();
    let project = tree::authorize_project(&state.pool, &project_id, &identity.subject).await?;
    Ok(HttpResponse::Ok().json(project))
}

#[get("/api/projects/{project_id}/files")]
async fn get_files(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let project_id = path.into_inner();
    let project = tree::authorize_project(&state.pool, &project_id, &identity.subject).await?;
    let files = tree::list_files(&state.pool, &project.id).await?;
    Ok(HttpResponse::Ok().json(files))
}

#[derive(Deserialize)]
struct ContentsQuery {
    parent_id: Option<String>,
}

#[get("/api/projects/{project_id}/contents")]
async fn get_folder_contents(
    identity: Identity,
    path: web::Path<String>,
    query: web::Query<ContentsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let project_id = path.into_inner();
    let project = tree::authorize_project(&state.pool, &project_id, &identity.subject).await?;
    let contents =
        tree::folder_contents(&state.pool, &project.id, query.parent_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(contents))
}

#[derive(Deserialize)]
struct CreateFileRequest {
    project_id: String,
    parent_id: Option<String>,
    name: String,
    content: String,
}

#[post("/api/files")]
async fn create_file(
    identity: Identity,
    body: web::Json<CreateFileRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let name = require_field(&body.name, "file name")?;
    let project = tree::authorize_project(&state.pool, &body.project_id, &identity.subject).await?;

    let id = tree::create_node(
        &state.pool,
        tree::CreateNodeParams {
            project_id: &project.id,
            parent_id: body.parent_id,
            name,
            kind: NodeKind::File,
            content: Some(body.content),
            storage_id: None,
        },
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "id": id })))
}

#[derive(Deserialize)]
struct CreateFolderRequest {
    project_id: String,
    parent_id: Option<String>,
    name: String,
}

#[post("/api/folders")]
async fn create_folder(
    identity: Identity,
    body: web::Json<CreateFolderRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let name = require_field(&body.name, "folder name")?;
    let project = tree::authorize_project(&state.pool, &body.project_id, &identity.subject).await?;

    let id = tree::create_node(
        &state.pool,
        tree::CreateNodeParams {
            project_id: &project.id,
            parent_id: body.parent_id,
            name,
            kind: NodeKind::Folder,
            content: None,
            storage_id: None,
        },
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "id": id })))
}

#[get("/api/files/{file_id}")]
async fn get_file(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let file_id = path.into_inner();
    let node = tree::authorize_file(&state.pool, &file_id, &identity.subject).await?;
    Ok(HttpResponse::Ok().json(node))
}

#[get("/api/files/{file_id}/path")]
async fn get_file_path(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let file_id = path.into_inner();
    let node = tree::authorize_file(&state.pool, &file_id, &identity.subject).await?;
    let segments = tree::file_path(&state.pool, &node.id).await?;
    Ok(HttpResponse::Ok().json(segments))
}

#[derive(Deserialize)]
struct RenameRequest {
    new_name: String,
}

#[post("/api/files/{file_id}/rename")]
async fn rename_file(
    identity: Identity,
    path: web::Path<String>,
    body: web::Json<RenameRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let file_id = path.into_inner();
    let new_name = require_field(&body.new_name, "new name")?;
    let node = tree::authorize_file(&state.pool, &file_id, &identity.subject).await?;
    tree::rename_node(&state.pool, &node, new_name).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Deserialize)]
struct UpdateFileRequest {
    content: String,
}

#[put("/api/files/{file_id}")]
async fn update_file(
    identity: Identity,
    path: web::Path<String>,
    body: web::Json<UpdateFileRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let file_id = path.into_inner();
    let node = tree::authorize_file(&state.pool, &file_id, &identity.subject).await?;
    tree::update_content(&state.pool, &node, &body.content).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[delete("/api/files/{file_id}")]
async fn delete_file(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let file_id = path.into_inner();
    let node = tree::authorize_file(&state.pool, &file_id, &identity.subject).await?;
    tree::delete_subtree(&state.pool, &state.data_root, &node).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/api/projects/{project_id}/assets")]
async fn upload_asset(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let project_id = path.into_inner();
    let project = tree::authorize_project(&state.pool, &project_id, &identity.subject).await?;

    let mut parent_id_field: Option<String> = None;
    let mut asset: Option<(String, Vec<u8>)> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|err| AppError::BadRequest(format!("multipart error: {err}")))?
    {
        let content_disposition = field.content_disposition().clone();
        let field_name = content_disposition.get_name().unwrap_or("").to_string();

        match field_name.as_str() {
            "parent_id" => {
                let value = collect_text_field(&mut field).await?;
                if !value.is_empty() {
                    parent_id_field = Some(value);
                }
            }
            "file" => {
                let filename = content_disposition
                    .get_filename()
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| "asset.bin".into());
                let bytes = collect_binary_field(&mut field).await?;
                if !bytes.is_empty() {
                    asset = Some((filename, bytes));
                }
            }
            _ => {
                // Ignore unknown fields
                collect_binary_field(&mut field).await?;
            }
        }
    }

    let (filename, bytes) =
        asset.ok_or_else(|| AppError::BadRequest("no file provided".into()))?;
    let name = blobs::sanitize_asset_name(&filename);

    let storage_id = format!("{}/{}_{}", project.id, tree::new_id(), name);
    blobs::store_blob(&state.data_root, &storage_id, &bytes).await?;

    let created = tree::create_node(
        &state.pool,
        tree::CreateNodeParams {
            project_id: &project.id,
            parent_id: parent_id_field,
            name: &name,
            kind: NodeKind::File,
            content: None,
            storage_id: Some(storage_id.clone()),
        },
    )
    .await;

    // Keep the blob store consistent when the node insert is rejected
    // (name clash, bad parent).
    let id = match created {
        Ok(id) => id,
        Err(err) => {
            blobs::delete_blob(&state.data_root, &storage_id).await?;
            return Err(err);
        }
    };

    Ok(HttpResponse::Ok().json(json!({
        "id": id,
        "name": name,
        "storage_id": storage_id,
        "size_bytes": bytes.len() as u64
    })))
}

#[derive(Deserialize)]
struct CreateGenerationRequest {
    prompt: String,
    project_id: Option<String>,
}

#[post("/api/generations")]
async fn create_generation(
    identity: Identity,
    body: web::Json<CreateGenerationRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let prompt = require_field(&body.prompt, "prompt")?;

    if let Some(project_id) = body.project_id.as_deref() {
        tree::authorize_project(&state.pool, project_id, &identity.subject).await?;
    }

    let job = generation::enqueue(
        &state.pool,
        &identity.subject,
        body.project_id.as_deref(),
        prompt,
    )
    .await?;

    tokio::spawn(generation::run(
        state.pool.clone(),
        state.http.clone(),
        state.generation.clone(),
        job.id.clone(),
        job.prompt.clone(),
    ));

    Ok(HttpResponse::Ok().json(job))
}

#[get("/api/generations/{generation_id}")]
async fn get_generation(
    identity: Identity,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let generation_id = path.into_inner();
    let job = generation::get(&state.pool, &identity.subject, &generation_id).await?;
    Ok(HttpResponse::Ok().json(job))
}

async fn collect_text_field(field: &mut Field) -> Result<String, AppError> {
    let bytes = collect_binary_field(field).await?;
    let value = String::from_utf8(bytes)
        .map_err(|_| AppError::BadRequest("field is not valid UTF-8".into()))?;
    Ok(value.trim().to_string())
}

async fn collect_binary_field(field: &mut Field) -> Result<Vec<u8>, AppError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|err| AppError::BadRequest(format!("failed to read field: {err}")))?
    {
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}
