use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::{EnglishFilter, StopWords};

static WORD_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+(?:['’-]\w+)*").unwrap());

const MAX_LENGTH_GAP: usize = 2;
const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Pulls vocabulary candidates out of cleaned passages.
#[derive(Debug, Clone, Copy)]
pub struct WordExtractor<'a> {
    stop_words: &'a StopWords,
    filter: EnglishFilter,
}

impl<'a> WordExtractor<'a> {
    pub fn new(stop_words: &'a StopWords, filter: EnglishFilter) -> Self {
        Self { stop_words, filter }
    }

    /// Lowercase alphabetic words of two or more letters from every English
    /// line of `passage`, stop words removed, in reading order.
    pub fn extract(&self, passage: &str) -> Vec<String> {
        let mut words = Vec::new();
        for line in passage.lines().map(str::trim) {
            if line.is_empty() || !self.filter.is_english(line) {
                continue;
            }
            let lowered = line.to_lowercase();
            for token in WORD_TOKEN.find_iter(&lowered).map(|m| m.as_str()) {
                if self.keeps(token) {
                    words.push(token.to_string());
                }
            }
        }
        words
    }

    fn keeps(&self, token: &str) -> bool {
        token.len() >= 2
            && token.bytes().all(|b| b.is_ascii_lowercase())
            && !self.stop_words.contains(token)
    }
}

/// Word frequencies that remember first-seen order.
#[derive(Debug, Clone, Default)]
pub struct WordCounter {
    counts: HashMap<String, usize>,
    order: Vec<String>,
}

impl WordCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, word: &str) {
        match self.counts.get_mut(word) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(word.to_string(), 1);
                self.order.push(word.to_string());
            }
        }
    }

    pub fn count(&self, word: &str) -> usize {
        self.counts.get(word).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Distinct words by descending count; equal counts keep first-seen order.
    pub fn most_common(&self) -> Vec<(&str, usize)> {
        let mut ranked = self
            .order
            .iter()
            .map(|word| (word.as_str(), self.count(word)))
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

impl<S: AsRef<str>> Extend<S> for WordCounter {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for word in iter {
            self.add(word.as_ref());
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for WordCounter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut counter = WordCounter::new();
        counter.extend(iter);
        counter
    }
}

/// Merges near-duplicate spellings, keeping the more frequent form.
///
/// Words are visited most frequent first. A word similar to an already
/// accepted one replaces it only when strictly more frequent, otherwise it
/// is dropped. Accepted words are bucketed by length so a word is only
/// compared with accepted words at most two letters longer or shorter.
/// Returns words in acceptance order.
pub fn deduplicate(counter: &WordCounter) -> Vec<String> {
    let mut accepted: Vec<String> = Vec::new();
    let mut by_length: HashMap<usize, Vec<usize>> = HashMap::new();

    for (word, count) in counter.most_common() {
        let len = word.chars().count();
        let mut nearby = (len.saturating_sub(MAX_LENGTH_GAP)..=len + MAX_LENGTH_GAP)
            .filter_map(|bucket| by_length.get(&bucket))
            .flatten()
            .copied()
            .collect::<Vec<_>>();
        nearby.sort_unstable();

        let similar = nearby
            .into_iter()
            .find(|&idx| are_similar(word, &accepted[idx]));
        match similar {
            Some(idx) => {
                if count > counter.count(&accepted[idx]) {
                    let old_len = accepted[idx].chars().count();
                    if let Some(bucket) = by_length.get_mut(&old_len) {
                        bucket.retain(|&other| other != idx);
                    }
                    by_length.entry(len).or_default().push(idx);
                    accepted[idx] = word.to_string();
                }
            }
            None => {
                by_length.entry(len).or_default().push(accepted.len());
                accepted.push(word.to_string());
            }
        }
    }
    accepted
}

/// Surface similarity used by [`deduplicate`].
///
/// Lengths may differ by at most two. Matches are counted position by
/// position from the start; when the lengths differ by exactly one, the shared
/// prefix plus shared suffix counts too, so a single dropped or inserted
/// letter still lines up both halves.
pub fn are_similar(a: &str, b: &str) -> bool {
    let a = a.chars().collect::<Vec<_>>();
    let b = b.chars().collect::<Vec<_>>();
    if a.len().abs_diff(b.len()) > MAX_LENGTH_GAP {
        return false;
    }
    if a == b {
        return true;
    }

    let shorter = a.len().min(b.len());
    let longer = a.len().max(b.len());
    if longer == 0 {
        return true;
    }

    let aligned = a.iter().zip(&b).filter(|(x, y)| x == y).count();
    let matched = if longer - shorter == 1 {
        let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
        let suffix = a
            .iter()
            .rev()
            .zip(b.iter().rev())
            .take_while(|(x, y)| x == y)
            .count();
        aligned.max((prefix + suffix).min(shorter))
    } else {
        aligned
    };
    matched as f64 / longer as f64 > SIMILARITY_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> WordExtractor<'static> {
        WordExtractor::new(StopWords::english(), EnglishFilter::default())
    }

    #[test]
    fn extracts_content_words() {
        assert_eq!(
            extractor().extract("The cat sat on the mat."),
            vec!["cat", "sat", "mat"]
        );
    }

    #[test]
    fn skips_non_english_lines_and_odd_tokens() {
        let passage = "彼は走った\nHe didn't run 42 km, x-ray aside";
        assert_eq!(extractor().extract(passage), vec!["run", "km", "aside"]);
    }

    #[test]
    fn counter_orders_by_frequency_then_first_seen() {
        let counter = ["b", "a", "c", "a", "c"].into_iter().collect::<WordCounter>();
        assert_eq!(
            counter.most_common(),
            vec![("a", 2), ("c", 2), ("b", 1)]
        );
    }

    #[test]
    fn similarity_rules() {
        assert!(are_similar("nation", "naton"));
        assert!(are_similar("running", "runming"));
        assert!(!are_similar("cat", "bat"));
        assert!(!are_similar("vocabulary", "voc"));
        assert!(are_similar("same", "same"));
    }

    #[test]
    fn split_halves_only_line_up_across_one_letter() {
        assert!(are_similar("nation", "naton"));
        assert!(are_similar("beautiful", "beautifl"));
        // Two letters dropped mid-word: only the aligned prefix counts.
        assert!(!are_similar("international", "internatial"));
        assert!(are_similar("international", "internationxx"));
    }

    #[test]
    fn frequent_misspelling_absorbs_rare_spelling() {
        let counter = ["nation", "naton", "naton", "naton"]
            .into_iter()
            .collect::<WordCounter>();
        assert_eq!(deduplicate(&counter), vec!["naton"]);
    }

    #[test]
    fn deduplication_is_idempotent() {
        let counter = [
            "student", "students", "student", "studemt", "library", "libary", "river", "rivers",
            "cat", "bat",
        ]
        .into_iter()
        .collect::<WordCounter>();
        let once = deduplicate(&counter);
        let twice = deduplicate(&once.iter().collect::<WordCounter>());
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_counter_yields_nothing() {
        assert!(deduplicate(&WordCounter::new()).is_empty());
    }
}
