//! Registration, login and the session-backed `CurrentUser` extractor

pub mod password;
pub mod session;

pub use password::{hash_password, verify_password};
pub use session::{Session, SessionStore, SESSION_COOKIE};

use crate::store::UserStore;
use crate::types::{new_id, User, UserStatus, UserType};
use crate::{Error, Result};
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::info;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+").expect("email pattern is valid"));

/// Login identifiers that look like an email are matched against emails
pub fn looks_like_email(identifier: &str) -> bool {
    EMAIL_PATTERN.is_match(identifier)
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Create an account. Students are approved at once, professors wait in the
/// registration queue.
pub fn register(users: &UserStore, request: &RegisterRequest) -> Result<User> {
    let (
        Some(first_name),
        Some(last_name),
        Some(email),
        Some(password),
        Some(confirm_password),
        Some(user_type),
    ) = (
        required(&request.first_name),
        required(&request.last_name),
        required(&request.email),
        request.password.as_deref().filter(|p| !p.is_empty()),
        request.confirm_password.as_deref().filter(|p| !p.is_empty()),
        required(&request.user_type),
    )
    else {
        return Err(Error::Validation("All fields are required".to_string()));
    };

    let user_type: UserType = user_type.parse().map_err(Error::Validation)?;

    if password != confirm_password {
        return Err(Error::Validation("Passwords do not match".to_string()));
    }

    let username = email.split('@').next().unwrap_or(email).to_string();
    if username.is_empty() {
        return Err(Error::Validation("Invalid email address".to_string()));
    }

    if users.find_by_email(email)?.is_some() {
        return Err(Error::Conflict("User with this email already exists".to_string()));
    }

    let user = User {
        id: new_id(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        username,
        password_hash: hash_password(password)?,
        user_type,
        email: email.to_lowercase(),
        status: user_type.initial_status(),
        created_at: Utc::now(),
    };
    users.insert(&user)?;

    info!(
        "[AUTH] Registered {} '{}' ({:?})",
        user.user_type.as_str(),
        user.username,
        user.status
    );
    Ok(user)
}

/// Check credentials. A pending account is only reported as such once its
/// password has been verified.
pub fn authenticate(users: &UserStore, request: &LoginRequest) -> Result<User> {
    let identifier = request.username.as_deref().map(str::trim).unwrap_or_default();
    let password = request.password.as_deref().unwrap_or_default();

    let user = if looks_like_email(identifier) {
        users.find_by_email(identifier)?
    } else {
        users.find_by_username(identifier)?
    };

    let user = user
        .filter(|u| verify_password(password, &u.password_hash))
        .ok_or(Error::InvalidCredentials)?;

    if user.status == UserStatus::Pending {
        return Err(Error::Forbidden(
            "Your registration is pending approval.".to_string(),
        ));
    }

    Ok(user)
}

/// The logged-in caller, resolved from the `session_id` cookie or an
/// `Authorization: Bearer` header carrying the same id
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session_id: String,
    pub session: Session,
}

impl CurrentUser {
    pub fn username(&self) -> &str {
        &self.session.username
    }
}

pub fn session_id_from_parts(parts: &Parts) -> Option<String> {
    let from_cookie = parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| session::cookie_value(value, SESSION_COOKIE))
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    from_cookie.or_else(|| {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
    })
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let sessions = SessionStore::from_ref(state);
        let session_id = session_id_from_parts(parts).ok_or(Error::Unauthorized)?;
        let session = sessions.get(&session_id).ok_or(Error::Unauthorized)?;

        Ok(CurrentUser {
            session_id,
            session,
        })
    }
}
