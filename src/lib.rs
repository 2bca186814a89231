use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub mod cleanup;
pub mod logging;
pub mod ocr;
pub mod pages;
pub mod pipeline;
mod providers;
pub mod settings;
mod test_util;
pub mod text;

pub use cleanup::{LlmCleanup, Passthrough, TextCleanup};
pub use pipeline::{DocumentExtractor, DocumentResult, ExtractOptions, ProcessingStats};
pub use providers::{OpenAI, Provider, ProviderUsage};

use ocr::{EnhancementLevel, TesseractCli};
use pages::PageSource;
use settings::Settings;
use text::EnglishFilter;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub inputs: Vec<PathBuf>,
    pub level: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub no_cleanup: bool,
    pub source_name: Option<String>,
    pub settings_path: Option<String>,
    pub show_ocr_languages: bool,
}

/// Extracts one document and returns its result as pretty-printed JSON.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    if config.show_ocr_languages {
        let languages = ocr::list_tesseract_languages(&settings.tesseract_path)?;
        return Ok(languages.join("\n"));
    }
    if config.inputs.is_empty() {
        return Err(anyhow!("no input files given"));
    }

    let level = match config.level.as_deref() {
        Some(value) => value.parse::<EnhancementLevel>()?,
        None => settings.enhancement_level,
    };
    if !pages::command_exists(&settings.tesseract_path) {
        return Err(anyhow!(
            "OCR engine '{}' not found (install tesseract or set [ocr].tesseract_path)",
            settings.tesseract_path
        ));
    }
    let engine = TesseractCli::new(&settings.tesseract_path, &settings.ocr_languages)
        .with_dpi(settings.dpi)
        .with_installed_languages()?;
    debug!(languages = engine.languages(), level = %level, "ocr engine ready");

    let options = ExtractOptions {
        level,
        smear_gap: settings.smear_gap,
        cleanup_timeout: Duration::from_secs(settings.cleanup_timeout_secs),
        ..ExtractOptions::default()
    };
    let source_file = config
        .source_name
        .clone()
        .unwrap_or_else(|| default_source_name(&config.inputs[0]));
    let full_path = config.inputs[0].display().to_string();

    let result = if config.no_cleanup || !settings.cleanup_enabled {
        extract_document(engine, Passthrough, options, &settings, &config.inputs, &source_file)
            .await
    } else {
        let key = providers::resolve_key(config.key.as_deref())?;
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| settings.cleanup_model.clone());
        let provider = OpenAI::new(key)
            .with_model(model)
            .with_temperature(settings.cleanup_temperature);
        debug!(model = provider.model(), "using LLM cleanup");
        let cleanup = LlmCleanup::new(provider)?;
        extract_document(engine, cleanup, options, &settings, &config.inputs, &source_file).await
    };

    let result = result.with_full_path(full_path);
    serde_json::to_string_pretty(&result).with_context(|| "failed to serialize result")
}

/// The bare file name of the first input, used as the `source_file` label.
fn default_source_name(input: &Path) -> String {
    input
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| input.display().to_string())
}

async fn extract_document<C: TextCleanup>(
    engine: TesseractCli,
    cleanup: C,
    options: ExtractOptions,
    settings: &Settings,
    inputs: &[PathBuf],
    source_file: &str,
) -> DocumentResult {
    let level = options.level;
    let pages = match PageSource::open(inputs, settings.dpi) {
        Ok(pages) => pages,
        Err(err) => {
            warn!("failed to open {}: {err:#}", source_file);
            return DocumentResult::failed(source_file, level, format!("{err:#}"));
        }
    };
    DocumentExtractor::new(engine, cleanup, options)
        .with_filter(EnglishFilter::new(settings.min_language_confidence))
        .extract(source_file, pages.images())
        .await
}
