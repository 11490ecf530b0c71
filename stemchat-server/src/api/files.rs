//! Upload, listing, search and download handlers
//!
//! POST /upload/, GET /files/, GET /search/, GET /download/,
//! GET /download/all, GET /download/{filename}

use std::path::Path as FsPath;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::error::{ApiError, ApiResult};
use crate::services::{file_store, BUNDLE_NAME};
use crate::AppState;

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// GET /search/ query string
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

/// POST /upload/ response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub info: String,
}

/// Build file routes
pub fn file_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/upload/",
            post(upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/files/", get(list_files))
        .route("/search/", get(search_files))
        .route("/download/", get(list_outputs))
        .route("/download/all", get(download_all))
        .route("/download/:filename", get(download_file))
}

/// POST /upload/
///
/// Multipart form with a `file` field. Only wav/mp3 are accepted; the type
/// is checked before the body is read.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("Missing file name".to_string()))?;

        file_store::check_file_type(&filename)?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let location = state.store.put(&filename, &bytes).await?;

        return Ok(Json(UploadResponse {
            info: format!("File '{}' saved at '{}'", filename, location.display()),
        }));
    }

    Err(ApiError::BadRequest("Missing 'file' field".to_string()))
}

/// GET /files/
pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.store.list().await?))
}

/// GET /search/?query=
pub async fn search_files(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<String>>> {
    let matches = state.store.search(&params.query).await?;
    if matches.is_empty() {
        return Err(ApiError::NotFound("No matching files found".to_string()));
    }
    Ok(Json(matches))
}

/// GET /download/
pub async fn list_outputs(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let outputs = state.store.list_outputs().await?;
    if outputs.is_empty() {
        return Err(ApiError::NotFound("No files found".to_string()));
    }
    tracing::debug!(count = outputs.len(), "Listing processed files");
    Ok(Json(outputs))
}

/// GET /download/all
pub async fn download_all(State(state): State<AppState>) -> ApiResult<Response> {
    let bundle = state.store.bundle_outputs().await?;
    attachment(&bundle, BUNDLE_NAME).await
}

/// GET /download/{filename}
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let path = state
        .store
        .output_path(&filename)
        .await
        .map_err(|_| ApiError::NotFound("File not found".to_string()))?;
    attachment(&path, &filename).await
}

async fn attachment(path: &FsPath, filename: &str) -> ApiResult<Response> {
    let file = tokio::fs::File::open(path).await?;
    let body = Body::from_stream(ReaderStream::new(file));
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
