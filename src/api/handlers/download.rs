use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use crate::api::response::ApiError;
use crate::AppState;

/// Serve a stored file by relative path.
/// Route: GET /download/*path
pub async fn serve_download(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let served = state.file_server.open(&path).await?;
    tracing::debug!(
        path = %path,
        root = served.root.as_str(),
        len = served.len,
        "Streaming file"
    );

    let body = Body::from_stream(ReaderStream::new(served.file));
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(served.content_type),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(served.len));
    if let Ok(value) = format!("inline; filename=\"{}\"", served.file_name).parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

    Ok(response)
}
