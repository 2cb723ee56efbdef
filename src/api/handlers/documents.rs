use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use super::tasks::TaskResponse;
use super::{check_reference, check_upload, delivery, download_response};
use crate::api::form::FormInput;
use crate::api::response::{parse_id, ApiError, Confirmation, JSend};
use crate::lifecycle::Upload;
use crate::storage::models::{DocumentRecord, HistoryEntry, Task};
use crate::storage::Attachment;
use crate::validation::{FieldReader, ValidationErrors};
use crate::AppState;

const FILE_FIELD: &str = DocumentRecord::FILE_FIELD;

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: u64,
    pub task_id: u64,
    pub document_path: String,
    pub hist_id: Option<u64>,
    pub task: Option<TaskResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl DocumentResponse {
    fn new(document: DocumentRecord, task: Option<Task>) -> Self {
        Self {
            id: document.id,
            task_id: document.task_id,
            document_path: document.document_path,
            hist_id: document.hist_id,
            task: task.map(Into::into),
            created_at: document.created_at.to_rfc3339(),
            updated_at: document.updated_at.to_rfc3339(),
        }
    }

    fn load(state: &AppState, document: DocumentRecord) -> Result<Self, ApiError> {
        let task = state.db.get::<Task>(document.task_id)?;
        Ok(Self::new(document, task))
    }
}

struct DocumentInput {
    task_id: u64,
    hist_id: Option<u64>,
    upload: Option<Upload>,
}

fn read_input(
    state: &AppState,
    form: &FormInput,
    upload: Option<Upload>,
    file_required: bool,
) -> Result<DocumentInput, ApiError> {
    let mut reader = FieldReader::new(&form.fields);
    check_upload(
        state,
        &mut reader,
        FILE_FIELD,
        upload.as_ref(),
        form.has_text(FILE_FIELD),
        file_required,
    );
    let task_id = reader.id("task_id");
    check_reference::<Task>(state, &mut reader, "task_id", task_id)?;
    let hist_id = reader.optional_id("hist_id");
    check_reference::<HistoryEntry>(state, &mut reader, "hist_id", hist_id.flatten())?;

    match (task_id, hist_id, reader.finish()) {
        (Some(task_id), Some(hist_id), errors) if errors.is_empty() => Ok(DocumentInput {
            task_id,
            hist_id,
            upload,
        }),
        (.., errors) => Err(ApiError::validation(errors)),
    }
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<DocumentResponse>>>, ApiError> {
    let documents = state.db.list::<DocumentRecord>()?;
    let tasks: HashMap<u64, Task> = state
        .db
        .list::<Task>()?
        .into_iter()
        .map(|task| (task.id, task))
        .collect();

    let response = documents
        .into_iter()
        .map(|document| {
            let task = tasks.get(&document.task_id).cloned();
            DocumentResponse::new(document, task)
        })
        .collect();
    Ok(JSend::success(response))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<DocumentResponse>>, ApiError> {
    let id = parse_id(&id)?;
    let document = state
        .db
        .get::<DocumentRecord>(id)?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;
    Ok(JSend::success(DocumentResponse::load(&state, document)?))
}

pub async fn create_document(
    State(state): State<Arc<AppState>>,
    mut form: FormInput,
) -> Result<(StatusCode, Json<JSend<DocumentResponse>>), ApiError> {
    let upload = form.take_file(FILE_FIELD);
    let input = read_input(&state, &form, upload, true)?;
    let Some(upload) = input.upload else {
        return Err(ApiError::validation(ValidationErrors::single(
            FILE_FIELD,
            format!("The {FILE_FIELD} field is required."),
        )));
    };

    let now = Utc::now();
    let document = state
        .lifecycle
        .create(
            upload,
            DocumentRecord {
                id: 0,
                task_id: input.task_id,
                document_path: String::new(),
                hist_id: input.hist_id,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

    tracing::info!(document_id = document.id, task_id = document.task_id, key = %document.document_path, "Document uploaded");
    Ok(JSend::created(DocumentResponse::load(&state, document)?))
}

pub async fn update_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut form: FormInput,
) -> Result<Json<JSend<DocumentResponse>>, ApiError> {
    let id = parse_id(&id)?;
    if !state.db.exists::<DocumentRecord>(id)? {
        return Err(ApiError::not_found("Document not found"));
    }

    let upload = form.take_file(FILE_FIELD);
    let input = read_input(&state, &form, upload, false)?;
    let (task_id, hist_id) = (input.task_id, input.hist_id);
    let document = state
        .lifecycle
        .replace(id, input.upload, move |document: &mut DocumentRecord| {
            document.task_id = task_id;
            document.hist_id = hist_id;
        })
        .await?;

    tracing::info!(document_id = id, key = %document.document_path, "Document updated");
    Ok(JSend::success(DocumentResponse::load(&state, document)?))
}

pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<Confirmation>>, ApiError> {
    let id = parse_id(&id)?;
    state.lifecycle.delete::<DocumentRecord>(id).await?;
    Ok(Confirmation::new("Document deleted successfully"))
}

pub async fn download_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let download = state
        .lifecycle
        .fetch_for_download::<DocumentRecord>(id, delivery(&state))
        .await?;
    tracing::debug!(document_id = id, key = %download.key, "Serving document download");
    download_response(download).await
}
