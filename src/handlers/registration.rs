//! Approval queue for accounts that registered as professors

use super::AppState;
use crate::types::{User, UserStatus, UserType};
use crate::{Error, Result};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct RegistrationRequest {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_type: UserType,
}

impl From<User> for RegistrationRequest {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            user_type: user.user_type,
        }
    }
}

fn pending_user(state: &AppState, id: &str) -> Result<User> {
    state
        .db
        .users
        .get(id)?
        .filter(|user| user.status == UserStatus::Pending)
        .ok_or_else(|| Error::NotFound("Request not found".to_string()))
}

pub async fn list_requests(State(state): State<AppState>) -> Result<Json<Vec<RegistrationRequest>>> {
    let pending = state.db.users.list_by_status(UserStatus::Pending)?;
    Ok(Json(pending.into_iter().map(RegistrationRequest::from).collect()))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let mut user = pending_user(&state, &id)?;
    user.status = UserStatus::Approved;
    state.db.users.update(&user)?;

    info!("[REGISTRATION] Approved '{}'", user.username);
    Ok(Json(json!({ "message": "Request accepted" })))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let user = pending_user(&state, &id)?;
    state.db.users.delete(&user.id)?;

    info!("[REGISTRATION] Rejected '{}'", user.username);
    Ok(Json(json!({ "message": "Request rejected" })))
}
