use once_cell::sync::Lazy;
use regex::Regex;

use super::contains_cjk;

static LABEL_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s()\[\]A-Z.]+$").unwrap());
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").unwrap());
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

const PARAGRAPH_OPENERS: &[&str] = &["In ", "The ", "When ", "Last ", "After ", "My "];

/// Keeps only lines that look like English prose and reflows them into
/// paragraphs separated by a blank line.
///
/// Dropped: lines with kana/kanji, short question labels such as `(2) A.`,
/// lines with fewer than three ASCII letters, and long runs without any
/// whitespace (usually garbled OCR).
pub fn strict_english_filter(text: &str) -> String {
    let lines = text
        .lines()
        .map(str::trim)
        .filter(|line| keep_line(line))
        .collect::<Vec<_>>();
    reconstruct_paragraphs(&lines).trim().to_string()
}

fn keep_line(line: &str) -> bool {
    if line.is_empty() || contains_cjk(line) {
        return false;
    }
    let length = line.chars().count();
    if length < 10 && LABEL_LINE.is_match(line) {
        return false;
    }
    if line.chars().filter(char::is_ascii_alphabetic).count() < 3 {
        return false;
    }
    !(length > 5 && !line.chars().any(char::is_whitespace))
}

/// Joins wrapped lines back into paragraphs.
pub fn reconstruct_paragraphs<S: AsRef<str>>(lines: &[S]) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in lines {
        let line = line.as_ref();
        if line.is_empty() {
            continue;
        }
        if starts_paragraph(&current, line) {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            current.push_str(line);
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    let joined = paragraphs.join("\n\n");
    let collapsed = SPACE_RUN.replace_all(&joined, " ");
    BLANK_RUN.replace_all(&collapsed, "\n\n").into_owned()
}

fn starts_paragraph(current: &str, line: &str) -> bool {
    let sentence_break = !current.is_empty()
        && current.ends_with('.')
        && line.chars().next().is_some_and(char::is_uppercase);
    sentence_break || PARAGRAPH_OPENERS.iter().any(|opener| line.starts_with(opener))
}
