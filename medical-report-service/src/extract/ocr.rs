use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::Arc;
use tokio::process::Command;
use tracing::info;

use crate::config::{OcrBackend, OcrConfig};
use crate::error::ServiceError;
use crate::llm::{ChatModel, CompletionRequest, ContentPart};

/// Turns a decoded image into text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: DynamicImage) -> Result<String, ServiceError>;
}

/// Picks the engine named by `OCR_BACKEND`. Vision OCR shares the chat model.
pub fn build_ocr_engine(
    config: &OcrConfig,
    chat_model: Arc<dyn ChatModel>,
    vision_model: &str,
) -> Arc<dyn OcrEngine> {
    match config.backend {
        OcrBackend::Tesseract => Arc::new(TesseractOcr::new(
            config.tesseract_cmd.clone(),
            config.language.clone(),
        )),
        OcrBackend::Vision => Arc::new(VisionOcr::new(chat_model, vision_model)),
    }
}

/// Encode image as PNG bytes
pub(crate) fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ServiceError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| ServiceError::Extraction(format!("failed to encode image: {}", e)))?;
    Ok(buffer)
}

/// Runs the `tesseract` CLI on a PNG copy of the image.
pub struct TesseractOcr {
    command: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: DynamicImage) -> Result<String, ServiceError> {
        let png = encode_png(&image)?;
        let input = tokio::task::spawn_blocking(move || -> std::io::Result<tempfile::TempPath> {
            let mut file = tempfile::Builder::new()
                .prefix("ocr-")
                .suffix(".png")
                .tempfile()?;
            std::io::Write::write_all(&mut file, &png)?;
            Ok(file.into_temp_path())
        })
        .await
        .map_err(|e| ServiceError::Extraction(e.to_string()))?
        .map_err(|e| ServiceError::Extraction(format!("failed to stage image for OCR: {}", e)))?;

        let output = Command::new(&self.command)
            .arg(&*input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .map_err(|e| ServiceError::Extraction(format!("{} failed to start: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::Extraction(format!(
                "{} error: {}",
                self.command,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(characters = text.len(), "Tesseract OCR completed");
        Ok(text)
    }
}

/// OCR through a vision-capable chat model.
pub struct VisionOcr {
    model: Arc<dyn ChatModel>,
    vision_model: String,
}

const VISION_OCR_PROMPT: &str = "You are an expert medical document OCR system. \
Extract ALL text from this image with perfect accuracy, preserving the structure, \
formatting and medical terminology. Return ONLY the extracted text without any \
commentary or explanations.";

impl VisionOcr {
    pub fn new(model: Arc<dyn ChatModel>, vision_model: impl Into<String>) -> Self {
        Self {
            model,
            vision_model: vision_model.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    async fn recognize(&self, image: DynamicImage) -> Result<String, ServiceError> {
        let base64_image = STANDARD.encode(encode_png(&image)?);

        let request = CompletionRequest {
            model: self.vision_model.clone(),
            system: None,
            content: vec![
                ContentPart::Text(VISION_OCR_PROMPT.to_string()),
                ContentPart::ImagePng(base64_image),
            ],
            temperature: 0.0,
            max_tokens: 4000,
        };

        let text = self
            .model
            .complete(request)
            .await
            .map_err(|e| ServiceError::Extraction(format!("vision OCR failed: {}", e)))?;

        info!(
            model = self.model.name(),
            characters = text.len(),
            "Vision OCR completed"
        );
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use std::sync::Mutex;

    struct RecordingModel {
        reply: String,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn vision_ocr_sends_png_and_trims_reply() {
        let model = Arc::new(RecordingModel {
            reply: "\n  WBC 7.2  \n".into(),
            seen: Mutex::new(Vec::new()),
        });
        let ocr = VisionOcr::new(model.clone(), "vision-model");

        let text = ocr.recognize(DynamicImage::new_rgb8(8, 8)).await.unwrap();
        assert_eq!(text, "WBC 7.2");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "vision-model");
        match &seen[0].content[1] {
            ContentPart::ImagePng(data) => {
                let bytes = STANDARD.decode(data).unwrap();
                assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
            }
            other => panic!("expected image part, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_tesseract_binary_is_an_extraction_error() {
        let ocr = TesseractOcr::new("definitely-not-a-real-tesseract-binary", "eng");
        let err = ocr.recognize(DynamicImage::new_rgb8(4, 4)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Extraction(_)));
    }
}
