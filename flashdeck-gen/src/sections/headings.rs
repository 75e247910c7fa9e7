//! Heuristic heading detection for documents without an outline

use super::PageIndex;
use once_cell::sync::Lazy;
use regex::Regex;

/// Longest line (in whitespace tokens) still considered a heading
const MAX_HEADING_TOKENS: usize = 10;

/// `1 Intro`, `1.2 Title`, `3. Results`, `Chapter 3`, `Part II: Energy`
static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:\d+(?:\.\d+)*\.?\s+\p{Lu}|(?i:chapter|part|section|unit|lesson|module)\s+(?:\d+|[ivxlcIVXLC]+)\b)",
    )
    .expect("numbered heading regex is valid")
});

/// Symbol bullets and parenthesised list markers
static BULLET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-*•▪◦‣–>]\s|\(?[a-z0-9]\)\s)").expect("bullet regex is valid")
});

/// `term: lowercase prose` reads as a definition, not a heading
static DEFINITION_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\s+\p{Ll}").expect("definition shape regex is valid"));

const MINOR_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "of", "on", "or", "the", "to", "vs",
    "with",
];

/// A heading found in the concatenated document text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub title: String,
    pub page: u32,
}

/// Decide whether a single line reads like a heading
pub fn is_heading(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.chars().count() > 120 {
        return false;
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() > MAX_HEADING_TOKENS {
        return false;
    }
    if !line.chars().any(|c| c.is_alphabetic()) {
        return false;
    }
    if line.ends_with(['.', ',', ';', ':', '?', '!']) {
        return false;
    }
    if BULLET_RE.is_match(line) || DEFINITION_SHAPE_RE.is_match(line) || line.contains('=') {
        return false;
    }

    NUMBERED_RE.is_match(line) || is_all_caps(line) || is_title_case(&tokens)
}

fn is_all_caps(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
}

fn is_title_case(tokens: &[&str]) -> bool {
    let mut saw_word = false;

    for (i, token) in tokens.iter().enumerate() {
        let word = token.trim_matches(|c: char| !c.is_alphanumeric());
        let first = match word.chars().next() {
            Some(c) => c,
            None => continue,
        };
        if !first.is_alphabetic() {
            continue;
        }
        saw_word = true;

        if i > 0 && MINOR_WORDS.contains(&word.to_lowercase().as_str()) {
            continue;
        }
        if !first.is_uppercase() {
            return false;
        }
    }

    saw_word
}

/// Scan the document for headings, one per page at most
///
/// Headings on the same page fold into the first heading on that page, so
/// the returned pages strictly increase.
pub fn detect_headings(index: &PageIndex) -> Vec<Heading> {
    let mut headings: Vec<Heading> = Vec::new();
    let mut offset = 0usize;

    for line in index.text().split('\n') {
        let line_offset = offset;
        offset += line.len() + 1;

        if !is_heading(line) {
            continue;
        }
        let page = match index.page_at(line_offset) {
            Some(p) => p,
            None => continue,
        };
        if headings.last().map(|h| h.page == page).unwrap_or(false) {
            continue;
        }

        headings.push(Heading {
            title: line.trim().to_string(),
            page,
        });
    }

    headings
}
