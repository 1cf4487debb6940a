use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use bytes::Bytes;
use serde::Serialize;
use tracing::warn;

use filedrop_common::{naming, Identity, StoreError};

use crate::error::ApiError;
use crate::state::AppState;

const FILE_FIELD: &str = "file";
const NAME_FIELD: &str = "fileName";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(rename = "fileName")]
    pub file_name: String,
}

/// POST /upload — store a single multipart `file`, optionally renamed by
/// the `fileName` text field.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut file: Option<(Option<String>, Bytes)> = None;
    let mut desired: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e, state.max_upload_bytes)),
        };
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            FILE_FIELD => {
                if file.is_some() {
                    return Err(ApiError::BadRequest("Only one file may be uploaded at a time".into()));
                }
                let original = field.file_name().map(String::from);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, state.max_upload_bytes))?;
                file = Some((original, data));
            }
            NAME_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, state.max_upload_bytes))?;
                desired = Some(text);
            }
            _ => {}
        }
    }

    let (original, data) = file.ok_or_else(|| ApiError::BadRequest("No file provided".into()))?;
    let name = naming::stored_name(desired.as_deref(), original.as_deref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    match state.store.put(&identity, &name, data).await {
        Ok(()) => Ok(Json(UploadResponse { file_name: name })),
        Err(StoreError::InvalidName(n)) => Err(ApiError::BadRequest(format!("invalid filename: {:?}", n))),
        Err(e) => {
            warn!(identity = %identity, file = %name, error = %e, "Upload failed");
            Err(ApiError::Storage(e))
        }
    }
}

/// GET /uploads — names stored for the caller.
pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<String>>, ApiError> {
    match state.store.list(&identity).await {
        Ok(names) => Ok(Json(names)),
        Err(StoreError::NotFound(_)) => Err(ApiError::DirectoryNotFound),
        Err(e) => {
            warn!(identity = %identity, error = %e, "Listing failed");
            Err(ApiError::Storage(e))
        }
    }
}

/// GET /uploads/{file} — file content with Range support.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let data = match state.store.get(&identity, &file).await {
        Ok(data) => data,
        Err(StoreError::NotFound(_) | StoreError::InvalidName(_)) => return Err(ApiError::FileNotFound),
        Err(e) => {
            warn!(identity = %identity, file = %file, error = %e, "Download failed");
            return Err(ApiError::Storage(e));
        }
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);

    Ok(file_response(&file, data, range))
}

fn multipart_error(e: MultipartError, max: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::TooLarge { max }
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

fn file_response(name: &str, data: Bytes, range: Option<(u64, Option<u64>)>) -> Response {
    let total_size = data.len() as u64;
    let mime_type = mime_guess::from_path(name).first_or_octet_stream();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime_type.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    let disposition = format!("inline; filename=\"{}\"", name.replace('"', "\\\""));
    // Non-ASCII names simply go without a disposition header
    if let Ok(v) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }

    let Some((start, end)) = range else {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(data.len()));
        return (StatusCode::OK, headers, Body::from(data)).into_response();
    };

    if total_size == 0 || start >= total_size {
        return range_not_satisfiable(total_size);
    }
    let end = end.unwrap_or(total_size - 1).min(total_size - 1);
    if start > end {
        return range_not_satisfiable(total_size);
    }

    let body = data.slice(start as usize..=end as usize);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    if let Ok(v) = HeaderValue::try_from(format!("bytes {}-{}/{}", start, end, total_size)) {
        headers.insert(header::CONTENT_RANGE, v);
    }
    (StatusCode::PARTIAL_CONTENT, headers, Body::from(body)).into_response()
}

fn range_not_satisfiable(total_size: u64) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [(header::CONTENT_RANGE, format!("bytes */{}", total_size))],
        "Invalid range",
    )
        .into_response()
}

/// Parse a single-range header value like "bytes=0-499" or "bytes=500-".
/// Multi-range and suffix forms are ignored so the full file is served.
fn parse_range(range_str: &str) -> Option<(u64, Option<u64>)> {
    let range_str = range_str.strip_prefix("bytes=")?;
    if range_str.contains(',') {
        return None;
    }
    let (start, end) = range_str.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        s => Some(s.parse().ok()?),
    };
    Some((start, end))
}
