use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, StatusCode};

use super::response::{ApiError, AppJson};
use crate::lifecycle::Upload;

/// A submitted create/update body, read from `multipart/form-data` or a JSON object.
/// Scalar values are kept as text so each endpoint can validate them into its own schema.
#[derive(Debug, Default)]
pub struct FormInput {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, Upload>,
}

impl FormInput {
    /// Take the file submitted under `name`, if any.
    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }

    /// Whether `name` arrived as a plain value rather than a file.
    pub fn has_text(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

#[axum::async_trait]
impl<S> FromRequest<S> for FormInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| multipart_error(e.status(), &e.body_text(), None))?;
            read_multipart(multipart).await
        } else {
            let AppJson(object) =
                AppJson::<serde_json::Map<String, serde_json::Value>>::from_request(req, state)
                    .await?;
            Ok(from_json(object))
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<FormInput, ApiError> {
    let mut form = FormInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e.status(), &e.body_text(), None))?
    {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };

        match field.file_name().map(|s| s.to_string()) {
            Some(file_name) => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e.status(), &e.body_text(), Some(&name)))?;
                // Browsers send an empty, unnamed part for an untouched file input.
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                form.files.insert(name, Upload { file_name, data });
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e.status(), &e.body_text(), Some(&name)))?;
                form.fields.insert(name, text);
            }
        }
    }

    Ok(form)
}

/// Parser detail goes to the log; the client gets a fixed message.
fn multipart_error(status: StatusCode, detail: &str, field: Option<&str>) -> ApiError {
    tracing::warn!(status = %status, field = ?field, error = %detail, "Rejected multipart body");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large()
    } else {
        ApiError::bad_request("Invalid multipart data")
    }
}

fn from_json(object: serde_json::Map<String, serde_json::Value>) -> FormInput {
    let fields = object
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, text))
        })
        .collect();

    FormInput {
        fields,
        files: HashMap::new(),
    }
}
