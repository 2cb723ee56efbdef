mod admins;
mod divisions;
mod documents;
mod download;
mod health;
mod historiques;
mod superadmins;
mod tasks;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use crate::api::response::ApiError;
use crate::credentials;
use crate::lifecycle::{validate_upload, Delivery, Download, DownloadContent, Upload};
use crate::storage::Entity;
use crate::validation::FieldReader;
use crate::AppState;

pub use admins::{create_admin, delete_admin, get_admin, list_admins, update_admin};
pub use divisions::{create_division, delete_division, get_division, list_divisions, update_division};
pub use documents::{
    create_document, delete_document, download_document, get_document, list_documents,
    update_document,
};
pub use download::serve_download;
pub use health::health;
pub use historiques::{
    create_historique, delete_historique, download_historique, get_historique, list_historiques,
    update_historique,
};
pub use superadmins::{
    create_superadmin, delete_superadmin, get_superadmin, list_superadmins, update_superadmin,
};
pub use tasks::{create_task, delete_task, get_task, list_tasks, update_task};

/// Record an error on `field` unless `id` names an existing `E` row.
fn check_reference<E: Entity>(
    state: &AppState,
    reader: &mut FieldReader<'_>,
    field: &str,
    id: Option<u64>,
) -> Result<(), ApiError> {
    if let Some(id) = id {
        if !state.db.exists::<E>(id)? {
            reader.reject(field, format!("The selected {field} is invalid."));
        }
    }
    Ok(())
}

/// Boundary check for an upload field. `sent_as_text` is set when the client
/// filled the field with a plain value instead of a file.
fn check_upload(
    state: &AppState,
    reader: &mut FieldReader<'_>,
    field: &str,
    upload: Option<&Upload>,
    sent_as_text: bool,
    required: bool,
) {
    match upload {
        Some(upload) => {
            if let Err(errors) = validate_upload(field, upload, state.config.max_upload_size) {
                reader.merge(errors);
            }
        }
        None if sent_as_text => reader.reject(field, format!("The {field} field must be a file.")),
        None if required => reader.reject(field, format!("The {field} field is required.")),
        None => {}
    }
}

/// Runs the hash on the blocking pool.
async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || credentials::hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Password hashing task failed");
            ApiError::internal("Internal server error")
        })?
        .map_err(|e| {
            tracing::error!(error = %e, "Password hashing failed");
            ApiError::internal("Internal server error")
        })
}

/// Record downloads hand back raw bytes in test mode.
fn delivery(state: &AppState) -> Delivery {
    if state.config.test_mode {
        Delivery::Inline
    } else {
        Delivery::Stream
    }
}

/// Turn a lifecycle download into a response. Streamed files are sent as an
/// attachment; inline bytes carry no disposition.
async fn download_response(download: Download) -> Result<Response, ApiError> {
    let (body, len, attachment) = match download.content {
        DownloadContent::Bytes(bytes) => {
            let len = bytes.len() as u64;
            (Body::from(bytes), len, false)
        }
        DownloadContent::File(path) => {
            let file = tokio::fs::File::open(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    tracing::warn!(key = %download.key, "Stored file vanished before streaming");
                    ApiError::not_found("File not found")
                } else {
                    tracing::error!(key = %download.key, error = %e, "Failed to open stored file");
                    ApiError::storage("File storage operation failed")
                }
            })?;
            let len = file
                .metadata()
                .await
                .map_err(|e| {
                    tracing::error!(key = %download.key, error = %e, "Failed to stat stored file");
                    ApiError::storage("File storage operation failed")
                })?
                .len();
            (Body::from_stream(ReaderStream::new(file)), len, true)
        }
    };

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(download.content_type),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    if attachment {
        if let Ok(value) = format!("attachment; filename=\"{}\"", download.file_name).parse() {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    Ok(response)
}
