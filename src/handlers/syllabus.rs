//! Syllabus records and their PDF files

use super::AppState;
use crate::auth::CurrentUser;
use crate::pdf;
use crate::store::Database;
use crate::types::{is_valid_id, new_id, Syllabus};
use crate::{Error, Result};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{error, info, warn};

const PDF_CONTENT_TYPE: &str = "application/pdf";

const TEXT_FIELDS: [&str; 5] = [
    "course_id",
    "course_name",
    "department_id",
    "department_name",
    "syllabus_description",
];

/// Syllabus as shown in listings
#[derive(Debug, Serialize)]
pub struct SyllabusSummary {
    pub course_id: String,
    pub course_name: String,
    pub department_id: String,
    pub department_name: String,
    pub professor: String,
    pub syllabus_description: String,
    pub syllabus_pdf: String,
}

impl From<Syllabus> for SyllabusSummary {
    fn from(s: Syllabus) -> Self {
        Self {
            course_id: s.course_id,
            course_name: s.course_name,
            department_id: s.department_id,
            department_name: s.department_name,
            professor: s.uploaded_by,
            syllabus_description: s.syllabus_description,
            syllabus_pdf: s.syllabus_pdf,
        }
    }
}

struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct SyllabusForm {
    fields: HashMap<String, String>,
    file: Option<UploadedFile>,
}

impl SyllabusForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = SyllabusForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| Error::Validation(format!("Invalid form data: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == "syllabus_pdf" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::Validation(format!("Invalid form data: {e}")))?;
                if !filename.is_empty() {
                    form.file = Some(UploadedFile {
                        filename,
                        bytes: bytes.to_vec(),
                    });
                }
            } else if TEXT_FIELDS.contains(&name.as_str()) {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::Validation(format!("Invalid form data: {e}")))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// A text field that was sent and is not blank
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

pub async fn add_syllabus(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = SyllabusForm::read(multipart).await?;

    let (
        Some(course_id),
        Some(course_name),
        Some(department_id),
        Some(department_name),
        Some(syllabus_description),
        Some(file),
    ) = (
        form.field("course_id"),
        form.field("course_name"),
        form.field("department_id"),
        form.field("department_name"),
        form.field("syllabus_description"),
        form.file.as_ref(),
    )
    else {
        return Err(Error::Validation("All fields are required.".to_string()));
    };

    if !pdf::is_pdf_filename(&file.filename) {
        return Err(Error::Validation(
            "Invalid file type. Only PDF files are allowed.".to_string(),
        ));
    }

    let pdf_id = state
        .db
        .files
        .put(&file.filename, PDF_CONTENT_TYPE, &file.bytes)?;

    let syllabus = Syllabus {
        id: new_id(),
        course_id: course_id.to_string(),
        course_name: course_name.to_string(),
        department_id: department_id.to_string(),
        department_name: department_name.to_string(),
        syllabus_description: syllabus_description.to_string(),
        syllabus_pdf: pdf_id.clone(),
        uploaded_by: user.username().to_string(),
    };

    if let Err(e) = state.db.syllabi.insert(&syllabus) {
        state.db.files.delete(&pdf_id)?;
        return Err(e);
    }

    info!(
        "[SYLLABUS] '{}' uploaded {} ({})",
        syllabus.uploaded_by, syllabus.course_id, pdf_id
    );
    state.indexer.spawn(pdf_id.clone());

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Syllabus added successfully!",
            "pdf_file_id": pdf_id,
            "course_id": syllabus.course_id,
            "course_name": syllabus.course_name,
        })),
    ))
}

/// Syllabi uploaded by the caller
pub async fn professor_syllabi(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<SyllabusSummary>>> {
    let syllabi = state.db.syllabi.list_by_uploader(user.username())?;
    Ok(Json(syllabi.into_iter().map(SyllabusSummary::from).collect()))
}

pub async fn all_syllabi(State(state): State<AppState>) -> Result<Json<Vec<SyllabusSummary>>> {
    let syllabi = state.db.syllabi.list()?;
    Ok(Json(syllabi.into_iter().map(SyllabusSummary::from).collect()))
}

/// Keep header-safe characters of an uploaded file name
fn disposition_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub async fn get_pdf_file(
    State(state): State<AppState>,
    Path(pdf_id): Path<String>,
) -> Result<impl IntoResponse> {
    let file = state
        .db
        .files
        .get(&pdf_id)?
        .ok_or_else(|| Error::NotFound("PDF file not found".to_string()))?;

    let disposition = format!(
        "inline; filename=\"{}\"",
        disposition_filename(&file.info.filename)
    );

    Ok((
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.data,
    ))
}

pub async fn get_single_syllabus(
    State(state): State<AppState>,
    Path(pdf_id): Path<String>,
) -> Result<Json<Syllabus>> {
    if !is_valid_id(&pdf_id) {
        return Err(Error::Validation("Invalid syllabus ID".to_string()));
    }

    let syllabus = state
        .db
        .syllabi
        .get_by_pdf(&pdf_id)?
        .ok_or_else(|| Error::NotFound("Syllabus not found".to_string()))?;
    Ok(Json(syllabus))
}

/// Write `syllabus`, switching it to `replacement` when one is given, and
/// return the new PDF id.
///
/// The new blob is stored before the record and the old blob is removed
/// only once the record no longer points at it.
fn save_syllabus(
    db: &Database,
    syllabus: &mut Syllabus,
    replacement: Option<&UploadedFile>,
) -> Result<Option<String>> {
    let old_pdf_id = syllabus.syllabus_pdf.clone();
    let new_pdf_id = match replacement {
        Some(file) => Some(db.files.put(&file.filename, PDF_CONTENT_TYPE, &file.bytes)?),
        None => None,
    };
    if let Some(new_pdf_id) = &new_pdf_id {
        syllabus.syllabus_pdf = new_pdf_id.clone();
    }

    if let Err(e) = db.syllabi.update(syllabus) {
        if let Some(new_pdf_id) = &new_pdf_id {
            db.files.delete(new_pdf_id)?;
        }
        syllabus.syllabus_pdf = old_pdf_id;
        return Err(e);
    }

    if new_pdf_id.is_some() {
        db.files.delete(&old_pdf_id)?;
    }
    Ok(new_pdf_id)
}

/// Update the text fields that were sent; a new `.pdf` file replaces the old
/// one and is re-indexed
pub async fn update_syllabus(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(pdf_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let mut syllabus = state
        .db
        .syllabi
        .get_by_pdf(&pdf_id)?
        .ok_or_else(|| Error::NotFound("Syllabus not found".to_string()))?;

    let form = SyllabusForm::read(multipart).await?;

    for name in TEXT_FIELDS {
        let Some(value) = form.field(name) else {
            continue;
        };
        let slot = match name {
            "course_id" => &mut syllabus.course_id,
            "course_name" => &mut syllabus.course_name,
            "department_id" => &mut syllabus.department_id,
            "department_name" => &mut syllabus.department_name,
            _ => &mut syllabus.syllabus_description,
        };
        *slot = value.to_string();
    }

    let replacement = match &form.file {
        Some(file) if pdf::is_pdf_filename(&file.filename) => Some(file),
        Some(file) => {
            warn!("[SYLLABUS] Ignoring non-PDF replacement '{}'", file.filename);
            None
        }
        None => None,
    };

    if let Some(new_pdf_id) = save_syllabus(&state.db, &mut syllabus, replacement)? {
        info!("[SYLLABUS] {} replaced by {}", pdf_id, new_pdf_id);
        state.indexer.forget(&pdf_id).await?;
        state.indexer.spawn(new_pdf_id);
    }

    Ok(Json(json!({ "message": "Syllabus updated successfully" })))
}

pub async fn delete_syllabus(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(pdf_id): Path<String>,
) -> Result<Json<Value>> {
    let syllabus = state
        .db
        .syllabi
        .get_by_pdf(&pdf_id)?
        .ok_or_else(|| Error::NotFound("Syllabus not found".to_string()))?;

    state.db.syllabi.delete(&syllabus.id)?;
    state.db.files.delete(&pdf_id)?;
    state.indexer.forget(&pdf_id).await?;

    info!("[SYLLABUS] Deleted {} ({})", syllabus.course_id, pdf_id);
    Ok(Json(json!({ "message": "Syllabus deleted successfully" })))
}

pub async fn extract_pdf_content(
    State(state): State<AppState>,
    Path(pdf_id): Path<String>,
) -> Result<Json<Value>> {
    if !is_valid_id(&pdf_id) {
        return Err(Error::Validation("Invalid PDF ID.".to_string()));
    }

    let file = state
        .db
        .files
        .get(&pdf_id)?
        .ok_or_else(|| Error::NotFound("PDF file not found.".to_string()))?;

    match pdf::extract_text(file.data).await {
        Ok(content) => Ok(Json(json!({ "content": content }))),
        Err(Error::NoReadableText) => Err(Error::NoReadableText),
        Err(e) => {
            error!("[SYLLABUS] Extraction failed for {}: {}", pdf_id, e);
            Err(Error::Internal("Failed to extract PDF content.".to_string()))
        }
    }
}
