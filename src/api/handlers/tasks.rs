use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use super::check_reference;
use crate::api::form::FormInput;
use crate::api::response::{parse_id, ApiError, Confirmation, JSend};
use crate::storage::models::{Division, Task};
use crate::validation::FieldReader;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub division_id: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            division_id: task.division_id,
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
        }
    }
}

struct TaskInput {
    title: String,
    description: Option<String>,
    division_id: u64,
}

fn read_input(state: &AppState, form: &FormInput) -> Result<TaskInput, ApiError> {
    let mut reader = FieldReader::new(&form.fields);
    let title = reader.string("title", 255);
    let description = reader.optional_string("description", 2000);
    let division_id = reader.id("division_id");
    check_reference::<Division>(state, &mut reader, "division_id", division_id)?;

    match (title, description, division_id, reader.finish()) {
        (Some(title), Some(description), Some(division_id), errors) if errors.is_empty() => {
            Ok(TaskInput {
                title,
                description,
                division_id,
            })
        }
        (.., errors) => Err(ApiError::validation(errors)),
    }
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<TaskResponse>>>, ApiError> {
    let tasks = state.db.list::<Task>()?;
    Ok(JSend::success(tasks.into_iter().map(Into::into).collect()))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<TaskResponse>>, ApiError> {
    let id = parse_id(&id)?;
    let task = state
        .db
        .get::<Task>(id)?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    Ok(JSend::success(task.into()))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    form: FormInput,
) -> Result<(StatusCode, Json<JSend<TaskResponse>>), ApiError> {
    let input = read_input(&state, &form)?;
    let now = Utc::now();
    let task = state.db.insert(Task {
        id: 0,
        title: input.title,
        description: input.description,
        division_id: input.division_id,
        created_at: now,
        updated_at: now,
    })?;

    tracing::info!(task_id = task.id, division_id = task.division_id, "Created task");
    Ok(JSend::created(task.into()))
}

pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    form: FormInput,
) -> Result<Json<JSend<TaskResponse>>, ApiError> {
    let id = parse_id(&id)?;
    if !state.db.exists::<Task>(id)? {
        return Err(ApiError::not_found("Task not found"));
    }

    let input = read_input(&state, &form)?;
    let task = state
        .db
        .update(id, |task: &mut Task| {
            task.title = input.title;
            task.description = input.description;
            task.division_id = input.division_id;
        })?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    tracing::info!(task_id = id, "Updated task");
    Ok(JSend::success(task.into()))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<Confirmation>>, ApiError> {
    let id = parse_id(&id)?;
    if !state.db.delete::<Task>(id)? {
        return Err(ApiError::not_found("Task not found"));
    }

    tracing::info!(task_id = id, "Deleted task");
    Ok(Confirmation::new("Task deleted successfully"))
}
