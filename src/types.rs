use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    /// Argon2 PHC string, never the raw password
    pub password_hash: String,
    pub user_type: UserType,
    pub email: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Student,
    Professor,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Approved,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Student => "student",
            UserType::Professor => "professor",
        }
    }

    /// Professors wait for approval, students are let in immediately
    pub fn initial_status(&self) -> UserStatus {
        match self {
            UserType::Student => UserStatus::Approved,
            UserType::Professor => UserStatus::Pending,
        }
    }
}

impl std::str::FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(UserType::Student),
            "professor" => Ok(UserType::Professor),
            other => Err(format!("Invalid user type '{other}'")),
        }
    }
}

/// Course syllabus record; `syllabus_pdf` is the id of the stored PDF blob
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Syllabus {
    pub id: String,
    pub course_id: String,
    pub course_name: String,
    pub department_id: String,
    pub department_name: String,
    pub syllabus_description: String,
    pub syllabus_pdf: String,
    pub uploaded_by: String,
}

/// A piece of syllabus text sized for embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: String,
    pub pdf_id: String,
    pub content: String,
    pub chunk_index: usize,
    pub hash: String,
}

/// Retrieval hit returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub content: String,
    pub score: f32,
}

/// Outcome of embedding one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub elapsed_secs: f64,
}

/// Returns true when `id` has the shape of an id this service hands out
pub fn is_valid_id(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_type_parsing() {
        assert_eq!("Student".parse::<UserType>(), Ok(UserType::Student));
        assert_eq!("professor".parse::<UserType>(), Ok(UserType::Professor));
        assert!("admin".parse::<UserType>().is_err());
    }

    #[test]
    fn professors_start_pending() {
        assert_eq!(UserType::Professor.initial_status(), UserStatus::Pending);
        assert_eq!(UserType::Student.initial_status(), UserStatus::Approved);
    }

    #[test]
    fn generated_ids_validate() {
        let id = new_id();
        assert_eq!(id.len(), 32);
        assert!(is_valid_id(&id));
        assert!(!is_valid_id("6727db474114faf5e4ab5993"));
        assert!(!is_valid_id("not-an-id"));
    }
}
