//! PDF text extraction

use crate::{Error, Result};

/// Extract the text of every page, in order.
///
/// Runs on the blocking pool; a panic inside the parser is reported as an
/// extraction failure rather than tearing down the request.
pub async fn extract_text(bytes: Vec<u8>) -> Result<String> {
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| Error::Pdf(format!("extractor panicked: {e}")))?
        .map_err(|e| Error::Pdf(e.to_string()))?;

    ensure_readable(extracted)
}

fn ensure_readable(text: String) -> Result<String> {
    if text.trim().is_empty() {
        return Err(Error::NoReadableText);
    }
    Ok(text)
}

pub fn is_pdf_filename(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
