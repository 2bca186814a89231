use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::EnhancementLevel;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const HOME_DIR_NAME: &str = ".exam-vocab-ocr";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub enhancement_level: EnhancementLevel,
    pub ocr_languages: String,
    pub tesseract_path: String,
    pub dpi: u32,
    pub smear_gap: u32,
    pub min_language_confidence: f64,
    pub cleanup_enabled: bool,
    pub cleanup_model: String,
    pub cleanup_timeout_secs: u64,
    pub cleanup_temperature: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enhancement_level: EnhancementLevel::Standard,
            ocr_languages: "eng".to_string(),
            tesseract_path: "tesseract".to_string(),
            dpi: 300,
            smear_gap: 12,
            min_language_confidence: 0.5,
            cleanup_enabled: true,
            cleanup_model: "gpt-4o-mini".to_string(),
            cleanup_timeout_secs: 60,
            cleanup_temperature: 0.02,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSettings>,
    regions: Option<RegionSettings>,
    language: Option<LanguageSettings>,
    cleanup: Option<CleanupSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    enhancement_level: Option<String>,
    languages: Option<String>,
    tesseract_path: Option<String>,
    dpi: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RegionSettings {
    smear_gap: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LanguageSettings {
    min_confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CleanupSettings {
    enabled: Option<bool>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f64>,
}

/// Layers the embedded defaults, `./settings.toml`, `./settings.local.toml`,
/// the same two files under `~/.exam-vocab-ocr/`, then `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.merge(
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?,
    );
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(ocr) = incoming.ocr {
            if let Some(level) = ocr
                .enhancement_level
                .and_then(|value| value.parse::<EnhancementLevel>().ok())
            {
                self.enhancement_level = level;
            }
            if let Some(languages) = ocr.languages.filter(|value| !value.trim().is_empty()) {
                self.ocr_languages = languages.trim().to_string();
            }
            if let Some(path) = ocr.tesseract_path.filter(|value| !value.trim().is_empty()) {
                self.tesseract_path = path.trim().to_string();
            }
            if let Some(dpi) = ocr.dpi.filter(|dpi| *dpi > 0) {
                self.dpi = dpi;
            }
        }
        if let Some(regions) = incoming.regions
            && let Some(gap) = regions.smear_gap
        {
            self.smear_gap = gap;
        }
        if let Some(language) = incoming.language
            && let Some(confidence) = language.min_confidence
            && (0.0..=1.0).contains(&confidence)
        {
            self.min_language_confidence = confidence;
        }
        if let Some(cleanup) = incoming.cleanup {
            if let Some(enabled) = cleanup.enabled {
                self.cleanup_enabled = enabled;
            }
            if let Some(model) = cleanup.model.filter(|value| !value.trim().is_empty()) {
                self.cleanup_model = model.trim().to_string();
            }
            if let Some(secs) = cleanup.timeout_secs.filter(|secs| *secs > 0) {
                self.cleanup_timeout_secs = secs;
            }
            if let Some(temperature) = cleanup
                .temperature
                .filter(|value| (0.0..=2.0).contains(value))
            {
                self.cleanup_temperature = temperature;
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(HOME_DIR_NAME))
        }
    })
}
