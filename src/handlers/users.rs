//! Student and professor directories

use super::AppState;
use crate::types::{User, UserType};
use crate::{Error, Result};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
}

impl UserSummary {
    fn from_user(user: User, with_type: bool) -> Self {
        Self {
            user_type: with_type.then_some(user.user_type),
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

fn label(user_type: UserType) -> &'static str {
    match user_type {
        UserType::Student => "Student",
        UserType::Professor => "Professor",
    }
}

fn not_found(user_type: UserType) -> Error {
    Error::NotFound(format!("{} not found", label(user_type)))
}

fn find(state: &AppState, id: &str, user_type: UserType) -> Result<User> {
    state
        .db
        .users
        .get(id)?
        .filter(|user| user.user_type == user_type)
        .ok_or_else(|| not_found(user_type))
}

fn list(state: &AppState, user_type: UserType) -> Result<Json<Vec<UserSummary>>> {
    let users = state.db.users.list_by_type(user_type)?;
    Ok(Json(
        users
            .into_iter()
            .map(|user| UserSummary::from_user(user, false))
            .collect(),
    ))
}

fn update(
    state: &AppState,
    id: &str,
    user_type: UserType,
    request: UpdateUserRequest,
) -> Result<Json<Value>> {
    let mut user = find(state, id, user_type)?;

    if let Some(first_name) = request.first_name {
        user.first_name = first_name;
    }
    if let Some(last_name) = request.last_name {
        user.last_name = last_name;
    }
    if let Some(email) = request.email {
        if email.trim().is_empty() {
            return Err(Error::Validation("Email cannot be empty".to_string()));
        }
        user.email = email;
    }
    state.db.users.update(&user)?;

    info!("[USERS] Updated {} '{}'", user_type.as_str(), user.username);
    Ok(Json(json!({
        "message": format!("{} updated successfully", label(user_type))
    })))
}

fn remove(state: &AppState, id: &str, user_type: UserType) -> Result<Json<Value>> {
    let user = find(state, id, user_type)?;
    state.db.users.delete(&user.id)?;
    state.sessions.remove_user(&user.id);

    info!("[USERS] Deleted {} '{}'", user_type.as_str(), user.username);
    Ok(Json(json!({
        "message": format!("{} deleted successfully", label(user_type))
    })))
}

pub async fn list_students(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>> {
    list(&state, UserType::Student)
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserSummary>> {
    let user = find(&state, &id, UserType::Student)?;
    Ok(Json(UserSummary::from_user(user, false)))
}

pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>> {
    update(&state, &id, UserType::Student, request)
}

pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    remove(&state, &id, UserType::Student)
}

pub async fn list_professors(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>> {
    list(&state, UserType::Professor)
}

/// Looks the id up across every account type and reports which one it is
pub async fn get_professor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserSummary>> {
    let user = state
        .db
        .users
        .get(&id)?
        .ok_or_else(|| not_found(UserType::Professor))?;
    Ok(Json(UserSummary::from_user(user, true)))
}

pub async fn update_professor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>> {
    update(&state, &id, UserType::Professor, request)
}

pub async fn delete_professor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    remove(&state, &id, UserType::Professor)
}
