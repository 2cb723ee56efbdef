use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::tasks::TaskResponse;
use super::{check_reference, check_upload, delivery, download_response};
use crate::api::form::FormInput;
use crate::api::response::{parse_id, ApiError, Confirmation, JSend};
use crate::lifecycle::Upload;
use crate::storage::models::{HistoryEntry, Task};
use crate::storage::Attachment;
use crate::validation::{FieldReader, ValidationErrors};
use crate::AppState;

const FILE_FIELD: &str = HistoryEntry::FILE_FIELD;

#[derive(Debug, Serialize)]
pub struct HistoriqueResponse {
    pub id: u64,
    pub task_id: u64,
    pub description: String,
    pub change_date: String,
    pub dochistorique_path: String,
    pub task: Option<TaskResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl HistoriqueResponse {
    fn new(entry: HistoryEntry, task: Option<Task>) -> Self {
        Self {
            id: entry.id,
            task_id: entry.task_id,
            description: entry.description,
            change_date: entry.change_date.to_rfc3339(),
            dochistorique_path: entry.dochistorique_path,
            task: task.map(Into::into),
            created_at: entry.created_at.to_rfc3339(),
            updated_at: entry.updated_at.to_rfc3339(),
        }
    }

    fn load(state: &AppState, entry: HistoryEntry) -> Result<Self, ApiError> {
        let task = state.db.get::<Task>(entry.task_id)?;
        Ok(Self::new(entry, task))
    }
}

struct HistoriqueInput {
    task_id: u64,
    description: String,
    change_date: DateTime<Utc>,
    upload: Option<Upload>,
}

fn read_input(
    state: &AppState,
    form: &FormInput,
    upload: Option<Upload>,
    file_required: bool,
) -> Result<HistoriqueInput, ApiError> {
    let mut reader = FieldReader::new(&form.fields);
    check_upload(
        state,
        &mut reader,
        FILE_FIELD,
        upload.as_ref(),
        form.has_text(FILE_FIELD),
        file_required,
    );
    let description = reader.string("description", 500);
    let task_id = reader.id("task_id");
    check_reference::<Task>(state, &mut reader, "task_id", task_id)?;
    let change_date = reader.date("change_date");

    match (task_id, description, change_date, reader.finish()) {
        (Some(task_id), Some(description), Some(change_date), errors) if errors.is_empty() => {
            Ok(HistoriqueInput {
                task_id,
                description,
                change_date,
                upload,
            })
        }
        (.., errors) => Err(ApiError::validation(errors)),
    }
}

pub async fn list_historiques(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<HistoriqueResponse>>>, ApiError> {
    let entries = state.db.list::<HistoryEntry>()?;
    let tasks: HashMap<u64, Task> = state
        .db
        .list::<Task>()?
        .into_iter()
        .map(|task| (task.id, task))
        .collect();

    let response = entries
        .into_iter()
        .map(|entry| {
            let task = tasks.get(&entry.task_id).cloned();
            HistoriqueResponse::new(entry, task)
        })
        .collect();
    Ok(JSend::success(response))
}

pub async fn get_historique(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<HistoriqueResponse>>, ApiError> {
    let id = parse_id(&id)?;
    let entry = state
        .db
        .get::<HistoryEntry>(id)?
        .ok_or_else(|| ApiError::not_found("History entry not found"))?;
    Ok(JSend::success(HistoriqueResponse::load(&state, entry)?))
}

pub async fn create_historique(
    State(state): State<Arc<AppState>>,
    mut form: FormInput,
) -> Result<(StatusCode, Json<JSend<HistoriqueResponse>>), ApiError> {
    let upload = form.take_file(FILE_FIELD);
    let input = read_input(&state, &form, upload, true)?;
    let Some(upload) = input.upload else {
        return Err(ApiError::validation(ValidationErrors::single(
            FILE_FIELD,
            format!("The {FILE_FIELD} field is required."),
        )));
    };

    let now = Utc::now();
    let entry = state
        .lifecycle
        .create(
            upload,
            HistoryEntry {
                id: 0,
                task_id: input.task_id,
                description: input.description,
                change_date: input.change_date,
                dochistorique_path: String::new(),
                created_at: now,
                updated_at: now,
            },
        )
        .await?;

    tracing::info!(hist_id = entry.id, task_id = entry.task_id, key = %entry.dochistorique_path, "History entry created");
    Ok(JSend::created(HistoriqueResponse::load(&state, entry)?))
}

pub async fn update_historique(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut form: FormInput,
) -> Result<Json<JSend<HistoriqueResponse>>, ApiError> {
    let id = parse_id(&id)?;
    if !state.db.exists::<HistoryEntry>(id)? {
        return Err(ApiError::not_found("History entry not found"));
    }

    let upload = form.take_file(FILE_FIELD);
    let HistoriqueInput {
        task_id,
        description,
        change_date,
        upload,
    } = read_input(&state, &form, upload, false)?;
    let entry = state
        .lifecycle
        .replace(id, upload, move |entry: &mut HistoryEntry| {
            entry.task_id = task_id;
            entry.description = description;
            entry.change_date = change_date;
        })
        .await?;

    tracing::info!(hist_id = id, key = %entry.dochistorique_path, "History entry updated");
    Ok(JSend::success(HistoriqueResponse::load(&state, entry)?))
}

pub async fn delete_historique(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<Confirmation>>, ApiError> {
    let id = parse_id(&id)?;
    state.lifecycle.delete::<HistoryEntry>(id).await?;
    Ok(Confirmation::new("Historique deleted successfully"))
}

pub async fn download_historique(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let download = state
        .lifecycle
        .fetch_for_download::<HistoryEntry>(id, delivery(&state))
        .await?;
    tracing::debug!(hist_id = id, key = %download.key, "Serving history download");
    download_response(download).await
}
