//! Text helpers shared by analysis, section building and fingerprinting

use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w][\w\-'’]*").expect("word regex is valid"));

/// Count words the way the document analyzer does
///
/// A word is a run of word characters, hyphens and apostrophes that starts
/// with a word character.
pub fn count_words(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

/// Normalise text for fingerprinting
///
/// Lower-cases, replaces every run of non-alphanumeric characters with a
/// single space and trims the result.
pub fn normalize_for_key(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;

    for ch in lowered.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            pending_space = true;
        }
    }

    out
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
