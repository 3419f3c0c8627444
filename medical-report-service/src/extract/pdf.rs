use lopdf::Document;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::ServiceError;

/// Concatenates the text of every page. Pages whose text cannot be decoded
/// contribute an empty string.
pub async fn extract_pdf_text(path: &Path) -> Result<String, ServiceError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let document =
            Document::load(&path).map_err(|e| ServiceError::Extraction(e.to_string()))?;
        Ok(document_text(&document))
    })
    .await
    .map_err(|e| ServiceError::Extraction(e.to_string()))?
}

/// Walks pages in order; a page that fails to decode is logged and skipped.
pub fn document_text(document: &Document) -> String {
    let pages = document.get_pages();
    info!("Extracting text from {} PDF pages", pages.len());

    let mut text = String::new();
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(page_text) => {
                debug!(page = page_number, characters = page_text.len(), "Extracted page");
                text.push_str(&page_text);
            }
            Err(e) => warn!(page = page_number, "No text extracted from page: {}", e),
        }
    }
    text
}
