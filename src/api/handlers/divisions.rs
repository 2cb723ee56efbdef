use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::hash_password;
use super::tasks::TaskResponse;
use crate::api::form::FormInput;
use crate::api::response::{parse_id, ApiError, AppQuery, Confirmation, JSend};
use crate::storage::models::{Division, Task};
use crate::validation::FieldReader;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DivisionResponse {
    pub id: u64,
    pub division_nom: String,
    pub division_responsable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskResponse>>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Division> for DivisionResponse {
    fn from(division: Division) -> Self {
        Self {
            id: division.id,
            division_nom: division.division_nom,
            division_responsable: division.division_responsable,
            tasks: None,
            created_at: division.created_at.to_rfc3339(),
            updated_at: division.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DivisionParams {
    #[serde(default)]
    pub with_tasks: bool,
}

struct DivisionInput {
    division_nom: String,
    division_responsable: String,
    password: String,
}

fn read_input(form: &FormInput) -> Result<DivisionInput, ApiError> {
    let mut reader = FieldReader::new(&form.fields);
    let division_nom = reader.string("division_nom", 255);
    let division_responsable = reader.string("division_responsable", 255);
    let password = reader.string("password", 255);

    match (division_nom, division_responsable, password, reader.finish()) {
        (Some(division_nom), Some(division_responsable), Some(password), errors)
            if errors.is_empty() =>
        {
            Ok(DivisionInput {
                division_nom,
                division_responsable,
                password,
            })
        }
        (.., errors) => Err(ApiError::validation(errors)),
    }
}

fn tasks_of(tasks: &[Task], division_id: u64) -> Vec<TaskResponse> {
    tasks
        .iter()
        .filter(|task| task.division_id == division_id)
        .cloned()
        .map(Into::into)
        .collect()
}

pub async fn list_divisions(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<DivisionParams>,
) -> Result<Json<JSend<Vec<DivisionResponse>>>, ApiError> {
    let divisions = state.db.list::<Division>()?;
    let tasks = if params.with_tasks {
        state.db.list::<Task>()?
    } else {
        Vec::new()
    };

    let response = divisions
        .into_iter()
        .map(|division| {
            let mut response = DivisionResponse::from(division);
            if params.with_tasks {
                response.tasks = Some(tasks_of(&tasks, response.id));
            }
            response
        })
        .collect();

    Ok(JSend::success(response))
}

pub async fn get_division(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppQuery(params): AppQuery<DivisionParams>,
) -> Result<Json<JSend<DivisionResponse>>, ApiError> {
    let id = parse_id(&id)?;
    let division = state
        .db
        .get::<Division>(id)?
        .ok_or_else(|| ApiError::not_found("Division not found"))?;

    let mut response = DivisionResponse::from(division);
    if params.with_tasks {
        let tasks = state.db.list::<Task>()?;
        response.tasks = Some(tasks_of(&tasks, id));
    }

    Ok(JSend::success(response))
}

pub async fn create_division(
    State(state): State<Arc<AppState>>,
    form: FormInput,
) -> Result<(StatusCode, Json<JSend<DivisionResponse>>), ApiError> {
    let input = read_input(&form)?;
    let password_hash = hash_password(input.password).await?;
    let now = Utc::now();
    let division = state.db.insert(Division {
        id: 0,
        division_nom: input.division_nom,
        division_responsable: input.division_responsable,
        password_hash,
        created_at: now,
        updated_at: now,
    })?;

    tracing::info!(division_id = division.id, "Created division");
    Ok(JSend::created(division.into()))
}

pub async fn update_division(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    form: FormInput,
) -> Result<Json<JSend<DivisionResponse>>, ApiError> {
    let id = parse_id(&id)?;
    if !state.db.exists::<Division>(id)? {
        return Err(ApiError::not_found("Division not found"));
    }

    let input = read_input(&form)?;
    let password_hash = hash_password(input.password).await?;
    let division = state
        .db
        .update(id, |division: &mut Division| {
            division.division_nom = input.division_nom;
            division.division_responsable = input.division_responsable;
            division.password_hash = password_hash;
        })?
        .ok_or_else(|| ApiError::not_found("Division not found"))?;

    tracing::info!(division_id = id, "Updated division");
    Ok(JSend::success(division.into()))
}

pub async fn delete_division(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<Confirmation>>, ApiError> {
    let id = parse_id(&id)?;
    if !state.db.delete::<Division>(id)? {
        return Err(ApiError::not_found("Division not found"));
    }

    tracing::info!(division_id = id, "Deleted division");
    Ok(Confirmation::new("Division deleted successfully"))
}
