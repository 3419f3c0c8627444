use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// OpenAI-compatible chat completions over plain HTTP.
    Groq,
    /// rig agent against OpenRouter.
    OpenRouter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackend {
    Tesseract,
    Vision,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub retain: bool,
    pub max_bytes: usize,
    pub verify_content_type: bool,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub backend: OcrBackend,
    pub tesseract_cmd: String,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub llm: LlmConfig,
    pub uploads: UploadConfig,
    pub ocr: OcrConfig,
    pub template_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl ServiceConfig {
    /// Reads configuration from the process environment, loading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match var("LLM_PROVIDER").as_deref() {
            None | Some("groq") => LlmProvider::Groq,
            Some("openrouter") => LlmProvider::OpenRouter,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LLM_PROVIDER",
                    value: other.to_string(),
                });
            }
        };

        let (key_var, default_base_url, default_text, default_vision) = match provider {
            LlmProvider::Groq => (
                "GROQ_API_KEY",
                GROQ_BASE_URL,
                "mixtral-8x7b-32768",
                "llama-3.2-90b-vision-preview",
            ),
            LlmProvider::OpenRouter => (
                "OPENROUTER_API_KEY",
                OPENROUTER_BASE_URL,
                "openai/gpt-4o-mini",
                "openai/gpt-4.1-mini",
            ),
        };
        let api_key = var(key_var).ok_or(ConfigError::Missing(key_var))?;

        let llm = LlmConfig {
            provider,
            api_key,
            base_url: var("LLM_BASE_URL")
                .unwrap_or_else(|| default_base_url.to_string())
                .trim_end_matches('/')
                .to_string(),
            text_model: var("LLM_MODEL").unwrap_or_else(|| default_text.to_string()),
            vision_model: var("VISION_MODEL").unwrap_or_else(|| default_vision.to_string()),
            timeout: Duration::from_secs(parse_or(&var, "LLM_TIMEOUT_SECS", 60)?),
        };

        let uploads = UploadConfig {
            dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            retain: parse_or(&var, "RETAIN_UPLOADS", false)?,
            max_bytes: parse_or(&var, "MAX_UPLOAD_BYTES", 16 * 1024 * 1024)?,
            verify_content_type: parse_or(&var, "VERIFY_CONTENT_TYPE", true)?,
        };

        let backend = match var("OCR_BACKEND").as_deref() {
            None | Some("tesseract") => OcrBackend::Tesseract,
            Some("vision") => OcrBackend::Vision,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "OCR_BACKEND",
                    value: other.to_string(),
                });
            }
        };
        let ocr = OcrConfig {
            backend,
            tesseract_cmd: var("TESSERACT_CMD").unwrap_or_else(|| "tesseract".to_string()),
            language: var("OCR_LANGUAGE").unwrap_or_else(|| "eng".to_string()),
        };

        Ok(Self {
            port: parse_or(&var, "PORT", 5000)?,
            llm,
            uploads,
            ocr,
            template_dir: var("TEMPLATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("templates")),
            static_dir: var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
        })
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_with_groq_key() {
        let config = ServiceConfig::from_lookup(lookup(&[("GROQ_API_KEY", "gsk_test")])).unwrap();

        assert_eq!(config.llm.provider, LlmProvider::Groq);
        assert_eq!(config.llm.api_key, "gsk_test");
        assert_eq!(config.llm.base_url, GROQ_BASE_URL);
        assert_eq!(config.llm.text_model, "mixtral-8x7b-32768");
        assert_eq!(config.port, 5000);
        assert_eq!(config.uploads.dir, PathBuf::from("uploads"));
        assert!(!config.uploads.retain);
        assert!(config.uploads.verify_content_type);
        assert_eq!(config.uploads.max_bytes, 16 * 1024 * 1024);
        assert_eq!(config.ocr.backend, OcrBackend::Tesseract);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = ServiceConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GROQ_API_KEY")));

        let err = ServiceConfig::from_lookup(lookup(&[
            ("LLM_PROVIDER", "openrouter"),
            ("GROQ_API_KEY", "gsk_test"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("OPENROUTER_API_KEY")));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("LLM_PROVIDER", "openrouter"),
            ("OPENROUTER_API_KEY", "sk-or"),
            ("LLM_BASE_URL", "http://localhost:9000/v1/"),
            ("PORT", "8080"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("RETAIN_UPLOADS", "true"),
            ("OCR_BACKEND", "vision"),
        ]))
        .unwrap();

        assert_eq!(config.llm.provider, LlmProvider::OpenRouter);
        assert_eq!(config.llm.text_model, "openai/gpt-4o-mini");
        assert_eq!(config.llm.base_url, "http://localhost:9000/v1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.uploads.max_bytes, 1024);
        assert!(config.uploads.retain);
        assert_eq!(config.ocr.backend, OcrBackend::Vision);
    }

    #[test]
    fn openrouter_with_vision_ocr_targets_openrouter() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("LLM_PROVIDER", "openrouter"),
            ("OPENROUTER_API_KEY", "sk-or"),
            ("OCR_BACKEND", "vision"),
        ]))
        .unwrap();

        assert_eq!(config.llm.base_url, OPENROUTER_BASE_URL);
        assert_eq!(config.llm.vision_model, "openai/gpt-4.1-mini");
        assert_eq!(config.ocr.backend, OcrBackend::Vision);
        assert!(crate::llm::build_chat_model(&config.llm).is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ServiceConfig::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = ServiceConfig::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("OCR_BACKEND", "magic"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "OCR_BACKEND", .. }));
    }
}
