#![allow(dead_code)]

use actix_http::Request;
use actix_web::{
    Error,
    dev::{Service, ServiceResponse},
    test, web,
};
use nimbus_backend::{
    AppState,
    auth::SUBJECT_HEADER,
    config::GenerationConfig,
    db::{init_pool, prepare_schema},
};
use serde_json::Value;
use tempfile::TempDir;

/// Fresh state over a throwaway sqlite file and blob root. The TempDir must
/// stay alive for the duration of the test.
pub async fn test_state() -> (web::Data<AppState>, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nimbus-test.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    let pool = init_pool(&url).expect("pool");
    prepare_schema(&pool, false).await.expect("schema");

    let state = web::Data::new(AppState {
        pool,
        data_root: dir.path().join("blobs"),
        http: reqwest::Client::new(),
        generation: GenerationConfig::default(),
    });

    (state, dir)
}

pub async fn get_as<S>(app: &S, user: &str, uri: &str) -> ServiceResponse
where
    S: Service<Request, Response = ServiceResponse, Error = Error>,
{
    let req = test::TestRequest::get()
        .uri(uri)
        .insert_header((SUBJECT_HEADER, user))
        .to_request();
    test::call_service(app, req).await
}

pub async fn post_json<S>(app: &S, user: &str, uri: &str, body: Value) -> ServiceResponse
where
    S: Service<Request, Response = ServiceResponse, Error = Error>,
{
    let req = test::TestRequest::post()
        .uri(uri)
        .insert_header((SUBJECT_HEADER, user))
        .set_json(body)
        .to_request();
    test::call_service(app, req).await
}

pub async fn put_json<S>(app: &S, user: &str, uri: &str, body: Value) -> ServiceResponse
where
    S: Service<Request, Response = ServiceResponse, Error = Error>,
{
    let req = test::TestRequest::put()
        .uri(uri)
        .insert_header((SUBJECT_HEADER, user))
        .set_json(body)
        .to_request();
    test::call_service(app, req).await
}

pub async fn delete_as<S>(app: &S, user: &str, uri: &str) -> ServiceResponse
where
    S: Service<Request, Response = ServiceResponse, Error = Error>,
{
    let req = test::TestRequest::delete()
        .uri(uri)
        .insert_header((SUBJECT_HEADER, user))
        .to_request();
    test::call_service(app, req).await
}

pub async fn json_body(response: ServiceResponse) -> Value {
    test::read_body_json(response).await
}

/// Creates a project for `user` and returns its id.
pub async fn create_project<S>(app: &S, user: &str, name: &str) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = Error>,
{
    let response = post_json(
        app,
        user,
        "/api/projects",
        serde_json::json!({ "name": name }),
    )
    .await;
    assert!(response.status().is_success(), "create_project failed");
    let body = json_body(response).await;
    body["id"].as_str().expect("project id").to_string()
}

/// Creates a file node and returns its id.
pub async fn create_file<S>(
    app: &S,
    user: &str,
    project_id: &str,
    parent_id: Option<&str>,
    name: &str,
    content: &str,
) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = Error>,
{
    let response = post_json(
        app,
        user,
        "/api/files",
        serde_json::json!({
            "project_id": project_id,
            "parent_id": parent_id,
            "name": name,
            "content": content,
        }),
    )
    .await;
    assert!(response.status().is_success(), "create_file failed");
    let body = json_body(response).await;
    body["id"].as_str().expect("file id").to_string()
}

/// Creates a folder node and returns its id.
pub async fn create_folder<S>(
    app: &S,
    user: &str,
    project_id: &str,
    parent_id: Option<&str>,
    name: &str,
) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = Error>,
{
    let response = post_json(
        app,
        user,
        "/api/folders",
        serde_json::json!({
            "project_id": project_id,
            "parent_id": parent_id,
            "name": name,
        }),
    )
    .await;
    assert!(response.status().is_success(), "create_folder failed");
    let body = json_body(response).await;
    body["id"].as_str().expect("folder id").to_string()
}

/// Multipart form with an optional parent_id text field and one file field.
pub fn multipart_payload(
    boundary: &str,
    parent_id: Option<&str>,
    filename: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(parent) = parent_id {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"parent_id\"\r\n\r\n{parent}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
