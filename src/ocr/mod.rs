mod engine;

use anyhow::{Result, anyhow};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use engine::{
    HeuristicConfidence, OcrConfig, TesseractCli, crop_region, default_configs,
    generate_variants, list_tesseract_languages, locate_text_regions, recognize, run_ensemble,
    select_best, to_gray,
};

/// How many preprocessing variants a page goes through, and whether text
/// regions are localized before OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhancementLevel {
    Light,
    #[default]
    Standard,
    Aggressive,
}

impl EnhancementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnhancementLevel::Light => "light",
            EnhancementLevel::Standard => "standard",
            EnhancementLevel::Aggressive => "aggressive",
        }
    }

    pub fn variant_tags(&self) -> &'static [VariantTag] {
        const LIGHT: &[VariantTag] = &[VariantTag::Standard];
        const STANDARD: &[VariantTag] = &[
            VariantTag::Standard,
            VariantTag::Contrast,
            VariantTag::Denoise,
            VariantTag::Upscale,
        ];
        const AGGRESSIVE: &[VariantTag] = &[
            VariantTag::Standard,
            VariantTag::Contrast,
            VariantTag::Denoise,
            VariantTag::Upscale,
            VariantTag::Morphological,
            VariantTag::AdaptiveThreshold,
        ];
        match self {
            EnhancementLevel::Light => LIGHT,
            EnhancementLevel::Standard => STANDARD,
            EnhancementLevel::Aggressive => AGGRESSIVE,
        }
    }

    pub fn locates_regions(&self) -> bool {
        matches!(self, EnhancementLevel::Aggressive)
    }
}

impl FromStr for EnhancementLevel {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "light" => Ok(EnhancementLevel::Light),
            "standard" => Ok(EnhancementLevel::Standard),
            "aggressive" => Ok(EnhancementLevel::Aggressive),
            other => Err(anyhow!(
                "unknown enhancement level '{}' (expected light, standard or aggressive)",
                other
            )),
        }
    }
}

impl fmt::Display for EnhancementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantTag {
    Standard,
    Contrast,
    Denoise,
    Upscale,
    Morphological,
    AdaptiveThreshold,
}

impl VariantTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantTag::Standard => "standard",
            VariantTag::Contrast => "contrast",
            VariantTag::Denoise => "denoise",
            VariantTag::Upscale => "upscale",
            VariantTag::Morphological => "morphological",
            VariantTag::AdaptiveThreshold => "adaptive-threshold",
        }
    }
}

/// A preprocessed rendering of one page (or region), discarded after OCR.
#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub tag: VariantTag,
    pub image: GrayImage,
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrCandidate {
    pub text: String,
    pub variant_tag: VariantTag,
    pub config_tag: String,
    pub confidence: f64,
}

/// Why a (variant, config) pair produced no candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    EngineFailed(String),
    EmptyText,
}

/// Outcome of a single OCR invocation.
#[derive(Debug, Clone)]
pub enum Attempt {
    Candidate(OcrCandidate),
    Skipped(SkipReason),
}

/// Best candidate of one ensemble run, plus how many attempts were tried.
#[derive(Debug, Clone, Default)]
pub struct EnsembleResult {
    pub best: Option<OcrCandidate>,
    pub candidates: usize,
    pub skipped: usize,
}

impl EnsembleResult {
    pub fn text(&self) -> &str {
        self.best
            .as_ref()
            .map(|candidate| candidate.text.as_str())
            .unwrap_or("")
    }

    pub fn confidence(&self) -> f64 {
        self.best
            .as_ref()
            .map(|candidate| candidate.confidence)
            .unwrap_or(0.0)
    }
}

/// Rectangle in page pixel coordinates believed to hold a block of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Runs one OCR configuration over one image and returns the raw text.
///
/// Errors are expected and treated as "no candidate" by the executor.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &GrayImage, config: &OcrConfig) -> Result<String>;
}

/// Scores raw OCR text; higher means more plausibly clean English.
pub trait ConfidenceEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> f64;
}

impl<T: OcrEngine + ?Sized> OcrEngine for &T {
    fn recognize(&self, image: &GrayImage, config: &OcrConfig) -> Result<String> {
        (**self).recognize(image, config)
    }
}

impl<T: ConfidenceEstimator + ?Sized> ConfidenceEstimator for &T {
    fn estimate(&self, text: &str) -> f64 {
        (**self).estimate(text)
    }
}
