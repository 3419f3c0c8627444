pub mod ocr;
pub mod pdf;

use image::{DynamicImage, ImageReader};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::ServiceError;
use crate::models::DocumentKind;

pub use ocr::{OcrEngine, TesseractOcr, VisionOcr, build_ocr_engine};
pub use pdf::extract_pdf_text;

/// Picks an extraction strategy by document kind and rejects empty output.
#[derive(Clone)]
pub struct TextExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl TextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    /// Extracts text for `kind` from the stored file at `path`.
    pub async fn extract(&self, kind: DocumentKind, path: &Path) -> Result<String, ServiceError> {
        let text = match kind {
            DocumentKind::Pdf => extract_pdf_text(path).await?,
            DocumentKind::Image => self.extract_image_text(path).await?,
        };

        if text.trim().is_empty() {
            return Err(ServiceError::EmptyContent);
        }

        info!(?kind, characters = text.len(), "Text extracted");
        Ok(text)
    }

    /// Decodes the image by sniffing its bytes, then runs OCR on it.
    async fn extract_image_text(&self, path: &Path) -> Result<String, ServiceError> {
        let path = path.to_path_buf();
        let image = tokio::task::spawn_blocking(move || load_image(&path))
            .await
            .map_err(|e| ServiceError::Extraction(e.to_string()))?
            .map_err(|e| ServiceError::Extraction(format!("failed to load image: {}", e)))?;

        let text = self.ocr.recognize(image).await?;
        Ok(text.trim().to_string())
    }
}

/// The extension may disagree with the content (a PNG named `.jpg`), so the
/// decoder is chosen from the leading bytes.
fn load_image(path: &Path) -> image::ImageResult<DynamicImage> {
    ImageReader::open(path)?.with_guessed_format()?.decode()
}
