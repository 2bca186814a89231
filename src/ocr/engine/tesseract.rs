use anyhow::{Context, Result, anyhow};
use image::GrayImage;
use std::io::Write;
use std::process::Command;
use tracing::warn;

use crate::ocr::OcrEngine;

/// One engine configuration: LSTM/legacy mode plus page segmentation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    pub tag: String,
    pub oem: u8,
    pub psm: u8,
}

impl OcrConfig {
    pub fn new(tag: impl Into<String>, oem: u8, psm: u8) -> Self {
        Self {
            tag: tag.into(),
            oem,
            psm,
        }
    }
}

/// Block of text, single word, raw line, and LSTM-only block.
pub fn default_configs() -> Vec<OcrConfig> {
    vec![
        OcrConfig::new("general", 3, 6),
        OcrConfig::new("word", 3, 8),
        OcrConfig::new("raw-line", 3, 13),
        OcrConfig::new("lstm", 1, 6),
    ]
}

/// Runs the `tesseract` binary on a temporary PNG per call.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: String,
    languages: String,
    dpi: u32,
}

impl TesseractCli {
    pub fn new(program: impl Into<String>, languages: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            languages: languages.into(),
            dpi: 300,
        }
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.max(1);
        self
    }

    /// Narrows the configured languages to those the installed engine has.
    pub fn with_installed_languages(mut self) -> Result<Self> {
        self.languages = normalize_ocr_languages(&self.program, &self.languages)?;
        Ok(self)
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &GrayImage, config: &OcrConfig) -> Result<String> {
        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for OCR")?;
        image
            .write_to(&mut tmp, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;
        tmp.flush().ok();

        let output = Command::new(&self.program)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("--oem")
            .arg(config.oem.to_string())
            .arg("--psm")
            .arg(config.psm.to_string())
            .arg("--dpi")
            .arg(self.dpi.to_string())
            .output()
            .with_context(|| format!("failed to run {} (is it installed?)", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

pub fn list_tesseract_languages(program: &str) -> Result<Vec<String>> {
    let output = Command::new(program)
        .arg("--list-langs")
        .output()
        .with_context(|| format!("failed to run {} --list-langs", program))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
    }
    Ok(parse_language_list(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_ocr_languages(program: &str, requested: &str) -> Result<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("ocr languages is empty"));
    }

    let available = match list_tesseract_languages(program) {
        Ok(list) => list,
        Err(_) => return Ok(trimmed.to_string()),
    };
    choose_languages(trimmed, &available)
}

const FALLBACK_LANGUAGE: &str = "eng";

fn choose_languages(requested: &str, available: &[String]) -> Result<String> {
    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for lang in requested.split(['+', ',', ' ']).map(str::trim) {
        if lang.is_empty() {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        if missing.is_empty() {
            return Err(anyhow!("ocr languages is empty"));
        }
        warn!(
            "ocr language(s) not available: {} (available: {}); falling back to {}",
            missing.join(", "),
            available.join(", "),
            FALLBACK_LANGUAGE
        );
        return Ok(FALLBACK_LANGUAGE.to_string());
    }
    if !missing.is_empty() {
        warn!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        );
    }
    Ok(chosen.join("+"))
}
