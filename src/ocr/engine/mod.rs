mod confidence;
mod filters;
mod preprocess;
mod regions;
mod tesseract;

use image::GrayImage;
use tracing::debug;

use crate::ocr::{
    Attempt, ConfidenceEstimator, EnhancementLevel, EnsembleResult, ImageVariant, OcrCandidate,
    OcrEngine, SkipReason, TextRegion,
};

pub use confidence::HeuristicConfidence;
pub use preprocess::{generate_variants, to_gray};
pub use regions::locate_text_regions;
pub use tesseract::{OcrConfig, TesseractCli, default_configs, list_tesseract_languages};

/// Runs every configuration over every variant, in that nesting order.
pub fn run_ensemble<E, S>(
    engine: &E,
    scorer: &S,
    variants: &[ImageVariant],
    configs: &[OcrConfig],
) -> Vec<Attempt>
where
    E: OcrEngine + ?Sized,
    S: ConfidenceEstimator + ?Sized,
{
    let mut attempts = Vec::with_capacity(variants.len() * configs.len());
    for variant in variants {
        for config in configs {
            let attempt = match engine.recognize(&variant.image, config) {
                Ok(raw) => {
                    let text = raw.trim();
                    if text.is_empty() {
                        Attempt::Skipped(SkipReason::EmptyText)
                    } else {
                        let score = scorer.estimate(text);
                        let confidence = if score.is_finite() {
                            score.clamp(0.0, 1.0)
                        } else {
                            0.0
                        };
                        Attempt::Candidate(OcrCandidate {
                            text: text.to_string(),
                            variant_tag: variant.tag,
                            config_tag: config.tag.clone(),
                            confidence,
                        })
                    }
                }
                Err(err) => {
                    debug!(
                        variant = variant.tag.as_str(),
                        config = config.tag.as_str(),
                        "ocr attempt failed: {err:#}"
                    );
                    Attempt::Skipped(SkipReason::EngineFailed(format!("{err:#}")))
                }
            };
            attempts.push(attempt);
        }
    }
    attempts
}

/// Keeps the highest-confidence candidate; on ties the earliest attempt wins.
pub fn select_best(attempts: Vec<Attempt>) -> EnsembleResult {
    let mut result = EnsembleResult::default();
    for attempt in attempts {
        match attempt {
            Attempt::Candidate(candidate) => {
                result.candidates += 1;
                let better = result
                    .best
                    .as_ref()
                    .is_none_or(|best| candidate.confidence > best.confidence);
                if better {
                    result.best = Some(candidate);
                }
            }
            Attempt::Skipped(_) => result.skipped += 1,
        }
    }
    result
}

/// Preprocesses `image` for `level` and returns the best OCR reading of it.
pub fn recognize<E, S>(
    engine: &E,
    scorer: &S,
    image: &GrayImage,
    level: EnhancementLevel,
    configs: &[OcrConfig],
) -> EnsembleResult
where
    E: OcrEngine + ?Sized,
    S: ConfidenceEstimator + ?Sized,
{
    let variants = generate_variants(image, level);
    let result = select_best(run_ensemble(engine, scorer, &variants, configs));
    debug!(
        variants = variants.len(),
        candidates = result.candidates,
        skipped = result.skipped,
        confidence = result.confidence(),
        "ocr ensemble finished"
    );
    result
}

pub fn crop_region(image: &GrayImage, region: &TextRegion) -> GrayImage {
    image::imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image()
}
