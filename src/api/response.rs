use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::file_server::ServeError;
use crate::lifecycle::LifecycleError;
use crate::object_store::ObjectStoreError;
use crate::storage::DatabaseError;
use crate::validation::ValidationErrors;

// ============================================================================
// Error codes
// ============================================================================

pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
pub const BAD_REQUEST: &str = "BAD_REQUEST";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const FORBIDDEN: &str = "FORBIDDEN";
pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

// ============================================================================
// JSend status enum
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JSendStatus {
    Error,
    Fail,
    Success,
}

// ============================================================================
// JSend success envelope
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSend<T: Serialize> {
    pub data: T,
    pub status: JSendStatus,
}

impl<T: Serialize> JSend<T> {
    pub fn success(data: T) -> Json<JSend<T>> {
        Json(JSend {
            data,
            status: JSendStatus::Success,
        })
    }

    /// 201 response for a newly created resource.
    pub fn created(data: T) -> (StatusCode, Json<JSend<T>>) {
        (StatusCode::CREATED, Self::success(data))
    }
}

/// Body of a successful delete.
#[derive(Debug, Serialize, Deserialize)]
pub struct Confirmation {
    pub message: String,
}

impl Confirmation {
    pub fn new(message: impl Into<String>) -> Json<JSend<Confirmation>> {
        JSend::success(Confirmation {
            message: message.into(),
        })
    }
}

// ============================================================================
// JSend fail envelope (client errors, 4xx)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendFail {
    pub data: FailData,
    pub status: JSendStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailData {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

// ============================================================================
// JSend error envelope (server errors, 5xx)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendError {
    pub code: String,
    pub message: String,
    pub status: JSendStatus,
}

// ============================================================================
// Unified error type for handlers
// ============================================================================

/// A JSend-compatible error that can be either a fail (4xx) or error (5xx).
/// Messages are fixed per failure; details go to the log, not the client.
#[derive(Debug)]
pub enum ApiError {
    Fail {
        status: StatusCode,
        code: &'static str,
        message: String,
        errors: Option<ValidationErrors>,
    },
    Error {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Fail {
                status,
                code,
                message,
                errors,
            } => (
                status,
                Json(JSendFail {
                    data: FailData {
                        code: code.to_string(),
                        message,
                        errors,
                    },
                    status: JSendStatus::Fail,
                }),
            )
                .into_response(),
            ApiError::Error {
                status,
                code,
                message,
            } => (
                status,
                Json(JSendError {
                    code: code.to_string(),
                    message,
                    status: JSendStatus::Error,
                }),
            )
                .into_response(),
        }
    }
}

impl ApiError {
    fn fail(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Fail {
            status,
            code,
            message: message.into(),
            errors: None,
        }
    }

    pub fn validation(errors: ValidationErrors) -> Self {
        ApiError::Fail {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code: VALIDATION_FAILED,
            message: "Validation failed".to_string(),
            errors: Some(errors),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::fail(StatusCode::BAD_REQUEST, BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::fail(StatusCode::NOT_FOUND, NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::fail(StatusCode::FORBIDDEN, FORBIDDEN, message)
    }

    pub fn payload_too_large() -> Self {
        Self::fail(
            StatusCode::PAYLOAD_TOO_LARGE,
            PAYLOAD_TOO_LARGE,
            "Request body is too large",
        )
    }

    pub fn storage(message: impl Into<String>) -> Self {
        ApiError::Error {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: STORAGE_ERROR,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Error {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: INTERNAL_ERROR,
            message: message.into(),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::validation(errors)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        tracing::error!(error = %e, "Database operation failed");
        ApiError::internal("Internal server error")
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::InvalidUpload(errors) => ApiError::validation(errors),
            LifecycleError::NotFound { kind, id } => {
                tracing::debug!(kind, id, "Record not found");
                ApiError::not_found("Record not found")
            }
            LifecycleError::BlobMissing { kind, id } => {
                tracing::warn!(kind, id, "Stored file missing");
                ApiError::not_found("File not found")
            }
            LifecycleError::Storage(ObjectStoreError::NotFound(key)) => {
                tracing::warn!(key = %key, "Stored file vanished during request");
                ApiError::not_found("File not found")
            }
            LifecycleError::Storage(e) => {
                tracing::error!(error = %e, "Blob storage operation failed");
                ApiError::storage("File storage operation failed")
            }
            LifecycleError::Database(e) => e.into(),
        }
    }
}

impl From<ServeError> for ApiError {
    fn from(e: ServeError) -> Self {
        match e {
            ServeError::Forbidden(_) => ApiError::forbidden("Access denied"),
            ServeError::NotFound => ApiError::not_found("File not found"),
            ServeError::Io(e) => {
                tracing::error!(error = %e, "Failed to serve file");
                ApiError::internal("Internal server error")
            }
        }
    }
}

// ============================================================================
// Custom extractors (reject with JSend-formatted ApiError)
// ============================================================================

/// Drop-in replacement for `axum::Json` that rejects with JSend errors.
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    tracing::warn!(error = %rejection.body_text(), "Rejected oversized JSON body");
                    return Err(ApiError::payload_too_large());
                }
                let message = match rejection {
                    JsonRejection::JsonDataError(_) => "Request body must be a JSON object",
                    JsonRejection::JsonSyntaxError(_) => "Malformed JSON in request body",
                    JsonRejection::MissingJsonContentType(_) => {
                        "Missing Content-Type: application/json header"
                    }
                    _ => "Failed to read request body",
                };
                Err(ApiError::bad_request(message))
            }
        }
    }
}

/// Drop-in replacement for `axum::extract::Query` that rejects with JSend errors.
pub struct AppQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, ApiError> {
        let query = parts.uri.query().unwrap_or_default();
        serde_qs::from_str(query)
            .map(AppQuery)
            .map_err(|e| ApiError::bad_request(friendly_query_error(&e.to_string())))
    }
}

/// Translate serde/serde_qs error messages into human-friendly descriptions.
fn friendly_query_error(raw: &str) -> String {
    let cleaned = raw
        .replace("u32", "non-negative integer")
        .replace("u64", "non-negative integer")
        .replace("i32", "integer")
        .replace("i64", "integer");

    format!("Invalid query parameter: {cleaned}")
}

/// Parse a path id, treating anything that is not a positive integer as absent.
pub fn parse_id(raw: &str) -> Result<u64, ApiError> {
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::not_found("Record not found")),
    }
}
