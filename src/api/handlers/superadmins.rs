use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use super::hash_password;
use crate::api::form::FormInput;
use crate::api::response::{parse_id, ApiError, Confirmation, JSend};
use crate::storage::models::{Superadmin, SuperadminRole};
use crate::validation::FieldReader;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SuperadminResponse {
    pub id: u64,
    pub username: String,
    pub role: SuperadminRole,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Superadmin> for SuperadminResponse {
    fn from(superadmin: Superadmin) -> Self {
        Self {
            id: superadmin.id,
            username: superadmin.username,
            role: superadmin.role,
            created_at: superadmin.created_at.to_rfc3339(),
            updated_at: superadmin.updated_at.to_rfc3339(),
        }
    }
}

struct SuperadminInput {
    username: String,
    password: String,
    role: SuperadminRole,
}

fn read_input(form: &FormInput) -> Result<SuperadminInput, ApiError> {
    let mut reader = FieldReader::new(&form.fields);
    let username = reader.string("username", 255);
    let password = reader.string("password", 255);
    let role = reader
        .string("role", 255)
        .and_then(|role| match SuperadminRole::parse(&role) {
            Some(role) => Some(role),
            None => {
                reader.reject("role", "The selected role is invalid.");
                None
            }
        });

    match (username, password, role, reader.finish()) {
        (Some(username), Some(password), Some(role), errors) if errors.is_empty() => {
            Ok(SuperadminInput {
                username,
                password,
                role,
            })
        }
        (.., errors) => Err(ApiError::validation(errors)),
    }
}

pub async fn list_superadmins(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<SuperadminResponse>>>, ApiError> {
    let superadmins = state.db.list::<Superadmin>()?;
    Ok(JSend::success(superadmins.into_iter().map(Into::into).collect()))
}

pub async fn get_superadmin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<SuperadminResponse>>, ApiError> {
    let id = parse_id(&id)?;
    let superadmin = state
        .db
        .get::<Superadmin>(id)?
        .ok_or_else(|| ApiError::not_found("Superadmin not found"))?;
    Ok(JSend::success(superadmin.into()))
}

pub async fn create_superadmin(
    State(state): State<Arc<AppState>>,
    form: FormInput,
) -> Result<(StatusCode, Json<JSend<SuperadminResponse>>), ApiError> {
    let input = read_input(&form)?;
    let password_hash = hash_password(input.password).await?;
    let now = Utc::now();
    let superadmin = state.db.insert(Superadmin {
        id: 0,
        username: input.username,
        password_hash,
        role: input.role,
        created_at: now,
        updated_at: now,
    })?;

    tracing::info!(superadmin_id = superadmin.id, role = ?superadmin.role, "Created superadmin");
    Ok(JSend::created(superadmin.into()))
}

pub async fn update_superadmin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    form: FormInput,
) -> Result<Json<JSend<SuperadminResponse>>, ApiError> {
    let id = parse_id(&id)?;
    if !state.db.exists::<Superadmin>(id)? {
        return Err(ApiError::not_found("Superadmin not found"));
    }

    let input = read_input(&form)?;
    let password_hash = hash_password(input.password).await?;
    let superadmin = state
        .db
        .update(id, |superadmin: &mut Superadmin| {
            superadmin.username = input.username;
            superadmin.password_hash = password_hash;
            superadmin.role = input.role;
        })?
        .ok_or_else(|| ApiError::not_found("Superadmin not found"))?;

    tracing::info!(superadmin_id = id, "Updated superadmin");
    Ok(JSend::success(superadmin.into()))
}

pub async fn delete_superadmin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<Confirmation>>, ApiError> {
    let id = parse_id(&id)?;
    if !state.db.delete::<Superadmin>(id)? {
        return Err(ApiError::not_found("Superadmin not found"));
    }

    tracing::info!(superadmin_id = id, "Deleted superadmin");
    Ok(Confirmation::new("Superadmin deleted successfully"))
}
