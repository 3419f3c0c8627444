use anyhow::{Result, anyhow};
use medical_report_service::{
    AnalysisClient, ServiceConfig, TextExtractor,
    extract::build_ocr_engine,
    intake::extension_of,
    llm::build_chat_model,
    models::DocumentKind,
};
use std::env;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <report.pdf|report.png|report.jpg>", args[0]);
        std::process::exit(1);
    }
    let path = Path::new(&args[1]);

    let config = ServiceConfig::from_env()?;
    let kind = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(extension_of)
        .and_then(|ext| DocumentKind::from_extension(&ext))
        .ok_or_else(|| anyhow!("Unsupported file format: {}", path.display()))?;

    let chat_model = build_chat_model(&config.llm)?;
    let ocr = build_ocr_engine(&config.ocr, chat_model.clone(), &config.llm.vision_model);
    let extractor = TextExtractor::new(ocr);
    let analysis = AnalysisClient::new(chat_model, config.llm.text_model.clone());

    eprintln!("Extracting text from {}", path.display());
    let text = match extractor.extract(kind, path).await {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Extraction failed: {}", e);
            std::process::exit(1);
        }
    };
    eprintln!("Extracted {} characters, requesting analysis", text.len());

    let result = analysis.summarize(&text).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.is_failure() {
        std::process::exit(2);
    }
    Ok(())
}
