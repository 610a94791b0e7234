use super::AppState;
use crate::auth::{self, session, CurrentUser, LoginRequest, RegisterRequest};
use crate::types::UserStatus;
use crate::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let user = auth::register(&state.db.users, &request)?;

    let response = match user.status {
        UserStatus::Pending => (
            StatusCode::ACCEPTED,
            Json(json!({
                "message": "Your request for registration is pending. Please wait for approval."
            })),
        ),
        UserStatus::Approved => (
            StatusCode::CREATED,
            Json(json!({ "message": "User registered successfully!" })),
        ),
    };
    Ok(response)
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let user = auth::authenticate(&state.db.users, &request)?;

    let session_id = state.sessions.create(&user);
    let cookie = session::session_cookie(&session_id, state.sessions.ttl_secs());
    info!("[AUTH] '{}' logged in", user.username);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "message": "Login successful!",
            "user_type": user.user_type,
            "username": user.username,
        })),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
) -> impl IntoResponse {
    state.sessions.remove(&user.session_id);
    info!("[AUTH] '{}' logged out", user.username());

    (
        [(header::SET_COOKIE, session::expired_cookie())],
        Json(json!({ "message": "Logout successful!" })),
    )
}
