use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::client::CivicDesk;
use crate::config::Config;
use crate::error::{CivicDeskError, Result};
use crate::services::ingest::UploadInput;

#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<CivicDesk>,
    pub token: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct UploadRequest {
    title: String,
    content: String,
    folder: Option<String>,
    source_name: Option<String>,
}

#[derive(Deserialize)]
struct ListDocumentsQuery {
    folder: Option<String>,
}

#[derive(Deserialize)]
struct MoveRequest {
    folder: Option<String>,
}

#[derive(Deserialize)]
struct CreateChatRequest {
    title: Option<String>,
}

#[derive(Deserialize)]
struct MessagesQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct PostMessageRequest {
    text: String,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    document_id: Option<i32>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct AskRequest {
    document_id: i32,
    question: String,
}

#[derive(Deserialize)]
struct CompareRequest {
    left: i32,
    right: i32,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/documents", get(list_documents).post(upload_document))
        .route("/documents/upload", post(upload_document_multipart))
        .route("/documents/:id", get(get_document).delete(delete_document))
        .route("/documents/:id/move", post(move_document))
        .route("/documents/:id/analysis", get(document_analysis))
        .route("/documents/:id/chats", get(list_chats).post(create_chat))
        .route("/analysis/compare", post(compare_documents))
        .route("/chats/:id", axum::routing::delete(delete_chat))
        .route("/chats/:id/messages", get(chat_messages).post(post_message))
        .route("/search", post(search))
        .route("/query", post(query))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn upload_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UploadRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    let input = UploadInput {
        title: payload.title,
        content: payload.content,
        folder: payload.folder,
        source_name: payload.source_name,
    };
    match state.desk.upload_document(input).await {
        Ok(document) => (StatusCode::CREATED, Json(document)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn upload_document_multipart(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }

    let mut input = UploadInput::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return error_response(CivicDeskError::Serialization(err.to_string()));
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(|value| value.to_string());
                let data = match field.bytes().await {
                    Ok(data) => data,
                    Err(err) => {
                        return error_response(CivicDeskError::Serialization(err.to_string()));
                    }
                };
                let content = match String::from_utf8(data.to_vec()) {
                    Ok(content) => content,
                    Err(err) => {
                        return error_response(CivicDeskError::Serialization(err.to_string()));
                    }
                };
                input.content = content;
                if input.title.is_empty() {
                    if let Some(file_name) = &file_name {
                        input.title = file_name
                            .rsplit_once('.')
                            .map(|(stem, _)| stem.to_string())
                            .unwrap_or_else(|| file_name.clone());
                    }
                }
                input.source_name = file_name;
            }
            "title" => match field.text().await {
                Ok(text) => input.title = text,
                Err(err) => {
                    return error_response(CivicDeskError::Serialization(err.to_string()));
                }
            },
            "content" => match field.text().await {
                Ok(text) => input.content = text,
                Err(err) => {
                    return error_response(CivicDeskError::Serialization(err.to_string()));
                }
            },
            "folder" => match field.text().await {
                Ok(text) => input.folder = Some(text),
                Err(err) => {
                    return error_response(CivicDeskError::Serialization(err.to_string()));
                }
            },
            _ => {}
        }
    }

    match state.desk.upload_document(input).await {
        Ok(document) => (StatusCode::CREATED, Json(document)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn list_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListDocumentsQuery>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.desk.list_documents(params.folder.as_deref()).await {
        Ok(documents) => (StatusCode::OK, Json(documents)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.desk.get_document(id).await {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.desk.delete_document(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "deleted"})),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn move_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(payload): Json<MoveRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.desk.move_document(id, payload.folder.as_deref()).await {
        Ok(document) => (StatusCode::OK, Json(document)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn document_analysis(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.desk.analyze_document(id).await {
        Ok(analysis) => (StatusCode::OK, Json(analysis)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn compare_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CompareRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state
        .desk
        .compare_documents(payload.left, payload.right)
        .await
    {
        Ok(comparison) => (StatusCode::OK, Json(comparison)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn list_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.desk.list_chats(id).await {
        Ok(chats) => (StatusCode::OK, Json(chats)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn create_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(payload): Json<CreateChatRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    let title = payload.title.unwrap_or_else(|| "New chat".to_string());
    match state.desk.create_chat(id, &title).await {
        Ok(chat) => (StatusCode::CREATED, Json(chat)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.desk.delete_chat(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "deleted"})),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn chat_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Query(params): Query<MessagesQuery>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state
        .desk
        .chat_messages(id, params.limit.unwrap_or(0))
        .await
    {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(payload): Json<PostMessageRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.desk.post_message(id, &payload.text).await {
        Ok(message) => (StatusCode::OK, Json(message)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SearchRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    let limit = payload.limit.unwrap_or(5);
    match state
        .desk
        .search(&payload.query, payload.document_id, limit)
        .await
    {
        Ok(results) => (
            StatusCode::OK,
            Json(serde_json::json!({ "results": results })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AskRequest>,
) -> impl IntoResponse {
    if let Err(err) = authorize(&headers, &state.token) {
        return err.into_response();
    }
    match state.desk.ask(payload.document_id, &payload.question).await {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: CivicDeskError) -> Response {
    let status = match &err {
        CivicDeskError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!(error = %err, "request failed");
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn authorize(
    headers: &HeaderMap,
    token: &str,
) -> std::result::Result<(), (StatusCode, Json<ErrorResponse>)> {
    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let bearer = header.strip_prefix("Bearer ").unwrap_or("");

    if bearer == token || api_key == token {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized".to_string(),
            }),
        ))
    }
}

pub async fn run(host: &str, port: u16, config: Config, token: &str) -> Result<()> {
    run_with_shutdown(host, port, config, token, futures::future::pending::<()>()).await
}

pub async fn run_with_shutdown<F>(
    host: &str,
    port: u16,
    config: Config,
    token: &str,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let desk = Arc::new(CivicDesk::from_config(config).await?);
    let state = AppState {
        desk,
        token: token.to_string(),
    };
    let app = build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;
    tracing::info!(addr = %addr, "civicdesk daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CivicDeskError::Runtime(e.to_string()))?;

    Ok(())
}
