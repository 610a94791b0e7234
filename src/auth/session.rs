//! In-memory login sessions

use crate::types::{new_id, User, UserType};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "session_id";

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub username: String,
    pub user_type: UserType,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl: Duration::seconds(ttl_secs.min(i64::MAX as u64) as i64),
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Start a session for `user` and return its id
    pub fn create(&self, user: &User) -> String {
        let id = format!("{}{}", new_id(), new_id());
        self.sessions.insert(
            id.clone(),
            Session {
                user_id: user.id.clone(),
                username: user.username.clone(),
                user_type: user.user_type,
                expires_at: Utc::now() + self.ttl,
            },
        );
        id
    }

    /// Live session for `id`; an expired one is evicted on the way out
    pub fn get(&self, id: &str) -> Option<Session> {
        let now = Utc::now();
        let session = self.sessions.get(id)?.clone();
        if session.is_expired(now) {
            self.sessions.remove(id);
            return None;
        }
        Some(session)
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    /// Drop every session whose user was deleted
    pub fn remove_user(&self, user_id: &str) {
        self.sessions.retain(|_, session| session.user_id != user_id);
    }

    pub fn purge(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// `Set-Cookie` value carrying a session id
pub fn session_cookie(id: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={id}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}")
}

/// `Set-Cookie` value that makes the browser forget the session
pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// Find `name` in a `Cookie` request header
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserStatus;

    fn user() -> User {
        User {
            id: new_id(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            username: "ada".to_string(),
            password_hash: String::new(),
            user_type: UserType::Professor,
            email: "ada@uni.edu".to_string(),
            status: UserStatus::Approved,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = SessionStore::new(60);
        let user = user();
        let id = store.create(&user);

        let session = store.get(&id).unwrap();
        assert_eq!(session.username, "ada");
        assert_eq!(session.user_type, UserType::Professor);
        assert!(store.get("unknown").is_none());
    }

    #[test]
    fn test_expired_sessions_are_evicted() {
        let store = SessionStore::new(0);
        let id = store.create(&user());
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());

        store.create(&user());
        store.create(&user());
        assert_eq!(store.purge(), 2);
    }

    #[test]
    fn test_remove_user() {
        let store = SessionStore::new(60);
        let user = user();
        store.create(&user);
        store.create(&user);
        store.remove_user(&user.id);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_cookie_parsing() {
        let header = "theme=dark; session_id=abc123; other=1";
        assert_eq!(cookie_value(header, SESSION_COOKIE), Some("abc123"));
        assert_eq!(cookie_value(header, "missing"), None);
        assert!(session_cookie("abc", 86400).contains("Max-Age=86400"));
        assert!(expired_cookie().contains("Max-Age=0"));
    }
}
