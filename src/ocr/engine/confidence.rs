use once_cell::sync::Lazy;
use regex::Regex;

use crate::ocr::ConfidenceEstimator;

static ALPHA_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z]{2,}\b").unwrap());

const ASCII_ALPHA_WEIGHT: f64 = 0.4;
const TOKEN_WEIGHT: f64 = 0.3;
const LENGTH_WEIGHT: f64 = 0.2;
const PUNCTUATION_BONUS: f64 = 0.1;

/// Text-only plausibility score for an OCR candidate.
///
/// Rewards ASCII letters, clean alphabetic tokens, longer output and a
/// sentence-like amount of punctuation. Always within `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicConfidence;

impl ConfidenceEstimator for HeuristicConfidence {
    fn estimate(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }

        let mut score = 0.0;

        let ascii_alpha = text.chars().filter(char::is_ascii_alphabetic).count();
        let visible = text.chars().filter(|c| !c.is_whitespace()).count();
        if visible > 0 {
            score += ascii_alpha as f64 / visible as f64 * ASCII_ALPHA_WEIGHT;
        }

        let tokens = ALPHA_TOKEN
            .find_iter(text)
            .map(|token| token.as_str())
            .collect::<Vec<_>>();
        if !tokens.is_empty() {
            let clean = tokens
                .iter()
                .filter(|token| token.len() >= 2 && token.chars().all(|c| c.is_alphabetic()))
                .count();
            score += clean as f64 / tokens.len() as f64 * TOKEN_WEIGHT;
        }

        let length = text.chars().count();
        score += (length as f64 / 100.0).min(1.0) * LENGTH_WEIGHT;

        let punctuation = text
            .chars()
            .filter(|c| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
            .count();
        let ratio = punctuation as f64 / length.max(1) as f64;
        if (0.01..=0.1).contains(&ratio) {
            score += PUNCTUATION_BONUS;
        }

        score.clamp(0.0, 1.0)
    }
}
