//! English-only text handling: language gating, passage cleanup and
//! vocabulary extraction.

mod english;
mod passage;
mod stopwords;
mod words;

pub use english::EnglishFilter;
pub use passage::{reconstruct_paragraphs, strict_english_filter};
pub use stopwords::StopWords;
pub use words::{WordCounter, WordExtractor, are_similar, deduplicate};

/// Hiragana, katakana and the CJK unified ideographs block.
pub(crate) fn is_cjk(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' | '\u{4E00}'..='\u{9FAF}')
}

pub(crate) fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}
