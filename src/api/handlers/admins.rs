use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use super::{check_reference, hash_password};
use crate::api::form::FormInput;
use crate::api::response::{parse_id, ApiError, Confirmation, JSend};
use crate::storage::models::{Admin, Superadmin};
use crate::validation::FieldReader;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub id: u64,
    pub username: String,
    pub role: String,
    pub superadmin_id: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Admin> for AdminResponse {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id,
            username: admin.username,
            role: admin.role,
            superadmin_id: admin.superadmin_id,
            created_at: admin.created_at.to_rfc3339(),
            updated_at: admin.updated_at.to_rfc3339(),
        }
    }
}

struct AdminInput {
    username: String,
    password: String,
    role: String,
    superadmin_id: u64,
}

fn read_input(state: &AppState, form: &FormInput) -> Result<AdminInput, ApiError> {
    let mut reader = FieldReader::new(&form.fields);
    let username = reader.string("username", 255);
    let password = reader.string("password", 255);
    let role = reader.string("role", 255);
    let superadmin_id = reader.id("superadmin_id");
    check_reference::<Superadmin>(state, &mut reader, "superadmin_id", superadmin_id)?;

    match (username, password, role, superadmin_id, reader.finish()) {
        (Some(username), Some(password), Some(role), Some(superadmin_id), errors)
            if errors.is_empty() =>
        {
            Ok(AdminInput {
                username,
                password,
                role,
                superadmin_id,
            })
        }
        (.., errors) => Err(ApiError::validation(errors)),
    }
}

pub async fn list_admins(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<AdminResponse>>>, ApiError> {
    let admins = state.db.list::<Admin>()?;
    Ok(JSend::success(admins.into_iter().map(Into::into).collect()))
}

pub async fn get_admin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<AdminResponse>>, ApiError> {
    let id = parse_id(&id)?;
    let admin = state
        .db
        .get::<Admin>(id)?
        .ok_or_else(|| ApiError::not_found("Admin not found"))?;
    Ok(JSend::success(admin.into()))
}

pub async fn create_admin(
    State(state): State<Arc<AppState>>,
    form: FormInput,
) -> Result<(StatusCode, Json<JSend<AdminResponse>>), ApiError> {
    let input = read_input(&state, &form)?;
    let password_hash = hash_password(input.password).await?;
    let now = Utc::now();
    let admin = state.db.insert(Admin {
        id: 0,
        username: input.username,
        password_hash,
        role: input.role,
        superadmin_id: input.superadmin_id,
        created_at: now,
        updated_at: now,
    })?;

    tracing::info!(admin_id = admin.id, superadmin_id = admin.superadmin_id, "Created admin");
    Ok(JSend::created(admin.into()))
}

pub async fn update_admin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    form: FormInput,
) -> Result<Json<JSend<AdminResponse>>, ApiError> {
    let id = parse_id(&id)?;
    if !state.db.exists::<Admin>(id)? {
        return Err(ApiError::not_found("Admin not found"));
    }

    let input = read_input(&state, &form)?;
    let password_hash = hash_password(input.password).await?;
    let admin = state
        .db
        .update(id, |admin: &mut Admin| {
            admin.username = input.username;
            admin.password_hash = password_hash;
            admin.role = input.role;
            admin.superadmin_id = input.superadmin_id;
        })?
        .ok_or_else(|| ApiError::not_found("Admin not found"))?;

    tracing::info!(admin_id = id, "Updated admin");
    Ok(JSend::success(admin.into()))
}

pub async fn delete_admin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<Confirmation>>, ApiError> {
    let id = parse_id(&id)?;
    if !state.db.delete::<Admin>(id)? {
        return Err(ApiError::not_found("Admin not found"));
    }

    tracing::info!(admin_id = id, "Deleted admin");
    Ok(Confirmation::new("Admin deleted successfully"))
}
