use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use image::ImageFormat;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::ServiceError;
use crate::models::{DocumentKind, UploadedDocument};

pub const FILE_FIELD: &str = "reportFile";

const MAX_FILENAME_LEN: usize = 255;
const PDF_HEADER_WINDOW: usize = 1024;

/// Body-limit failures surface as 413; any other parse error is a bad request.
fn multipart_error(err: MultipartError, limit: usize) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge { limit }
    } else {
        ServiceError::InvalidRequest(format!("Failed to parse multipart data: {}", err.body_text()))
    }
}

/// Reads the `reportFile` part, enforcing presence, a non-empty name and body,
/// and the configured size limit. Other fields are skipped.
pub async fn receive_upload(
    multipart: &mut Multipart,
    config: &UploadConfig,
) -> Result<UploadedDocument, ServiceError> {
    let limit = config.max_bytes;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(sanitize_filename)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ServiceError::MissingFile("No selected file".to_string()))?;

        let mut content = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            if content.len() + chunk.len() > limit {
                warn!(%filename, limit, "Upload exceeds size limit");
                return Err(ServiceError::PayloadTooLarge { limit });
            }
            content.extend_from_slice(&chunk);
        }

        if content.is_empty() {
            return Err(ServiceError::MissingFile("Uploaded file is empty".to_string()));
        }

        let document = UploadedDocument {
            id: Uuid::new_v4(),
            extension: extension_of(&filename),
            filename,
            content,
        };
        info!(
            document_id = %document.id,
            filename = %document.filename,
            bytes = document.content.len(),
            "Upload received"
        );
        return Ok(document);
    }

    Err(ServiceError::MissingFile("No file uploaded".to_string()))
}

/// Keeps the final path component and drops anything outside a conservative
/// character set.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .take(MAX_FILENAME_LEN)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    cleaned.to_string()
}

/// Lower-case extension including the dot, or an empty string.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Checks that the bytes look like the kind the extension promises.
pub fn content_matches(kind: DocumentKind, content: &[u8]) -> bool {
    match kind {
        DocumentKind::Pdf => {
            let window = &content[..content.len().min(PDF_HEADER_WINDOW)];
            window.windows(5).any(|w| w == b"%PDF-")
        }
        DocumentKind::Image => matches!(
            image::guess_format(content),
            Ok(ImageFormat::Png) | Ok(ImageFormat::Jpeg)
        ),
    }
}

/// An upload written to scratch storage under an internal name. The file is
/// removed when this value is dropped unless retention is enabled.
#[derive(Debug)]
pub struct StoredUpload {
    path: PathBuf,
    _temp: Option<tempfile::TempPath>,
}

impl StoredUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Writes the upload into `config.dir` as `<uuid>.<random><ext>`. The client's
/// filename never reaches the filesystem.
pub async fn store_upload(
    document: &UploadedDocument,
    config: &UploadConfig,
) -> Result<StoredUpload, ServiceError> {
    let dir = config.dir.clone();
    let prefix = format!("{}.", document.id);
    let suffix = document.extension.clone();
    let content = document.content.clone();
    let retain = config.retain;

    let stored = tokio::task::spawn_blocking(move || -> std::io::Result<StoredUpload> {
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(&dir)?;
        file.write_all(&content)?;
        file.flush()?;

        let temp = file.into_temp_path();
        if retain {
            let path = temp.keep().map_err(|e| e.error)?;
            Ok(StoredUpload { path, _temp: None })
        } else {
            Ok(StoredUpload {
                path: temp.to_path_buf(),
                _temp: Some(temp),
            })
        }
    })
    .await
    .map_err(|e| ServiceError::Io(std::io::Error::other(e)))??;

    debug!(document_id = %document.id, path = %stored.path.display(), "Upload stored");
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_config(dir: &Path, retain: bool) -> UploadConfig {
        UploadConfig {
            dir: dir.to_path_buf(),
            retain,
            max_bytes: 1024,
            verify_content_type: true,
        }
    }

    fn document(extension: &str, content: &[u8]) -> UploadedDocument {
        UploadedDocument {
            id: Uuid::new_v4(),
            filename: format!("report{extension}"),
            extension: extension.to_string(),
            content: content.to_vec(),
        }
    }

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\scan.PNG"), "scan.PNG");
        assert_eq!(sanitize_filename("lab<results>;.pdf"), "labresults.pdf");
        assert_eq!(sanitize_filename("..."), "");
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename(&"a".repeat(400)).len(), MAX_FILENAME_LEN);
    }

    #[test]
    fn extension_is_lowercased_with_dot() {
        assert_eq!(extension_of("Scan.JPG"), ".jpg");
        assert_eq!(extension_of("report.final.pdf"), ".pdf");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn content_sniffing() {
        assert!(content_matches(DocumentKind::Pdf, b"%PDF-1.7\n..."));
        assert!(content_matches(DocumentKind::Pdf, b"\xef\xbb\xbf%PDF-1.4"));
        assert!(!content_matches(DocumentKind::Pdf, b"hello world"));

        assert!(content_matches(DocumentKind::Image, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"));
        assert!(content_matches(DocumentKind::Image, b"\xff\xd8\xff\xe0\0\x10JFIF"));
        assert!(!content_matches(DocumentKind::Image, b"%PDF-1.7"));
    }

    #[tokio::test]
    async fn stored_upload_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(".pdf", b"%PDF-1.4 body");

        let stored = store_upload(&doc, &upload_config(dir.path(), false)).await.unwrap();
        let path = stored.path().to_path_buf();

        assert!(path.starts_with(dir.path()));
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with(&doc.id.to_string()));
        assert_eq!(path.extension().unwrap(), "pdf");
        assert_eq!(std::fs::read(&path).unwrap(), doc.content);

        drop(stored);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn retained_upload_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document(".png", b"pixels");

        let stored = store_upload(&doc, &upload_config(dir.path(), true)).await.unwrap();
        let path = stored.path().to_path_buf();
        drop(stored);

        assert!(path.exists());
    }

    #[tokio::test]
    async fn identical_names_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let config = upload_config(dir.path(), false);
        let first = store_upload(&document(".pdf", b"one"), &config).await.unwrap();
        let second = store_upload(&document(".pdf", b"two"), &config).await.unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).unwrap(), b"one");
        assert_eq!(std::fs::read(second.path()).unwrap(), b"two");
    }
}
