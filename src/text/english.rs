use once_cell::sync::Lazy;
use regex::Regex;
use whatlang::Lang;

use super::contains_cjk;

static FORMULA_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s+\-*/=()\[\]]+$").unwrap());
static ALPHA_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z]{2,}\b").unwrap());
static FUNCTION_WORDS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r"\b(the|and|or|but|in|on|at|to|for|of|with|by)\b").unwrap(),
        Regex::new(r"\b(is|are|was|were|be|been|being|have|has|had)\b").unwrap(),
        Regex::new(r"\b(can|could|should|would|will|shall|may|might|must)\b").unwrap(),
        Regex::new(r"\b(this|that|these|those|here|there|where|when|what|who|how|why)\b").unwrap(),
    ]
});

const MIN_ENGLISH_RATIO: f64 = 0.7;
const CONFIDENT_ENGLISH_RATIO: f64 = 0.8;

/// Decides whether a string reads as English prose.
///
/// Hard rejects: kana/kanji, formula-only strings, mostly non-ASCII letters,
/// no two-letter words. Survivors are accepted on any of three signals:
/// a high ASCII-letter ratio, a common function word, or the language
/// identifier calling it English.
#[derive(Debug, Clone, Copy)]
pub struct EnglishFilter {
    min_language_confidence: f64,
}

impl Default for EnglishFilter {
    fn default() -> Self {
        Self {
            min_language_confidence: 0.5,
        }
    }
}

impl EnglishFilter {
    pub fn new(min_language_confidence: f64) -> Self {
        Self {
            min_language_confidence: min_language_confidence.clamp(0.0, 1.0),
        }
    }

    pub fn is_english(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() || contains_cjk(trimmed) || FORMULA_ONLY.is_match(trimmed) {
            return false;
        }

        let ascii_alpha = trimmed.chars().filter(char::is_ascii_alphabetic).count();
        let all_alpha = trimmed.chars().filter(|c| c.is_alphabetic()).count();
        if all_alpha == 0 {
            return false;
        }
        let ratio = ascii_alpha as f64 / all_alpha as f64;
        if ratio < MIN_ENGLISH_RATIO {
            return false;
        }

        let lowered = trimmed.to_lowercase();
        if !ALPHA_TOKEN.is_match(&lowered) {
            return false;
        }
        if ratio >= CONFIDENT_ENGLISH_RATIO {
            return true;
        }
        if FUNCTION_WORDS.iter().any(|pattern| pattern.is_match(&lowered)) {
            return true;
        }
        self.identified_as_english(trimmed)
    }

    /// True when at least one line of `text` passes [`Self::is_english`].
    pub fn accepts_any_line(&self, text: &str) -> bool {
        text.lines().any(|line| self.is_english(line))
    }

    fn identified_as_english(&self, text: &str) -> bool {
        self.accepts_detection(whatlang::detect(text).map(|info| (info.lang(), info.confidence())))
    }

    fn accepts_detection(&self, detected: Option<(Lang, f64)>) -> bool {
        matches!(
            detected,
            Some((Lang::Eng, confidence)) if confidence >= self.min_language_confidence
        )
    }
}
