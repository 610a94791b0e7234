use super::{decode, decode_all, encode, flatten_tx};
use crate::types::Syllabus;
use crate::{Error, Result};
use sled::transaction::ConflictableTransactionError;
use sled::Transactional;

/// Syllabi collection, addressable by record id or by the id of its PDF
#[derive(Clone)]
pub struct SyllabusStore {
    syllabi: sled::Tree,
    by_pdf: sled::Tree,
}

impl SyllabusStore {
    pub(crate) fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            syllabi: db.open_tree("syllabi")?,
            by_pdf: db.open_tree("syllabi_by_pdf")?,
        })
    }

    pub fn insert(&self, syllabus: &Syllabus) -> Result<()> {
        let value = encode(syllabus)?;

        (&self.syllabi, &self.by_pdf)
            .transaction(|(syllabi, by_pdf)| {
                if by_pdf.get(syllabus.syllabus_pdf.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(Error::Conflict(format!(
                        "PDF {} already belongs to a syllabus",
                        syllabus.syllabus_pdf
                    ))));
                }
                by_pdf.insert(syllabus.syllabus_pdf.as_bytes(), syllabus.id.as_bytes())?;
                syllabi.insert(syllabus.id.as_bytes(), value.as_slice())?;
                Ok(())
            })
            .map_err(flatten_tx)
    }

    pub fn get(&self, id: &str) -> Result<Option<Syllabus>> {
        match self.syllabi.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_by_pdf(&self, pdf_id: &str) -> Result<Option<Syllabus>> {
        match self.by_pdf.get(pdf_id.as_bytes())? {
            Some(id) => {
                let id = String::from_utf8(id.to_vec())
                    .map_err(|e| Error::Storage(format!("Corrupt syllabus index entry: {e}")))?;
                self.get(&id)
            }
            None => Ok(None),
        }
    }

    pub fn list(&self) -> Result<Vec<Syllabus>> {
        let mut syllabi: Vec<Syllabus> = decode_all(&self.syllabi)?;
        syllabi.sort_by(|a, b| a.course_id.cmp(&b.course_id));
        Ok(syllabi)
    }

    pub fn list_by_uploader(&self, username: &str) -> Result<Vec<Syllabus>> {
        let mut syllabi = self.list()?;
        syllabi.retain(|s| s.uploaded_by == username);
        Ok(syllabi)
    }

    /// Replace a stored syllabus; a changed `syllabus_pdf` re-points the pdf index
    pub fn update(&self, syllabus: &Syllabus) -> Result<()> {
        let value = encode(syllabus)?;

        (&self.syllabi, &self.by_pdf)
            .transaction(|(syllabi, by_pdf)| {
                let old: Syllabus = match syllabi.get(syllabus.id.as_bytes())? {
                    Some(bytes) => decode(&bytes).map_err(ConflictableTransactionError::Abort)?,
                    None => {
                        return Err(ConflictableTransactionError::Abort(Error::NotFound(
                            "Syllabus not found".to_string(),
                        )))
                    }
                };

                if old.syllabus_pdf != syllabus.syllabus_pdf {
                    by_pdf.remove(old.syllabus_pdf.as_bytes())?;
                    by_pdf.insert(syllabus.syllabus_pdf.as_bytes(), syllabus.id.as_bytes())?;
                }
                syllabi.insert(syllabus.id.as_bytes(), value.as_slice())?;
                Ok(())
            })
            .map_err(flatten_tx)
    }

    pub fn delete(&self, id: &str) -> Result<Option<Syllabus>> {
        (&self.syllabi, &self.by_pdf)
            .transaction(|(syllabi, by_pdf)| {
                let Some(bytes) = syllabi.remove(id.as_bytes())? else {
                    return Ok(None);
                };
                let syllabus: Syllabus =
                    decode(&bytes).map_err(ConflictableTransactionError::Abort)?;
                by_pdf.remove(syllabus.syllabus_pdf.as_bytes())?;
                Ok(Some(syllabus))
            })
            .map_err(flatten_tx)
    }
}
