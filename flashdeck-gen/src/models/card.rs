use flashdeck_common::text::normalize_for_key;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a card fingerprint in hex characters
pub const CARD_KEY_LEN: usize = 40;

/// Study card produced by the synthesizer and finalized by the assembler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub front: String,
    pub back: String,
    pub excerpt: String,
    /// Two wrong answers for multiple-choice drills (empty when unknown)
    pub distractors: [String; 2],
    pub context: ContextTag,
    pub page: Option<u32>,
    pub section: Option<String>,
    /// Fingerprint of the normalized front/back pair
    pub card_key: String,
    /// `section_index * 10_000 + position_within_section`
    pub ordinal: u64,
}

impl Card {
    /// Build a card with its fingerprint computed and ordinal unset
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        let front = front.into().trim().to_string();
        let back = back.into().trim().to_string();
        let card_key = card_key(&front, &back);
        Self {
            front,
            back,
            excerpt: String::new(),
            distractors: [String::new(), String::new()],
            context: ContextTag::General,
            page: None,
            section: None,
            card_key,
            ordinal: 0,
        }
    }

    /// Both sides carry text
    pub fn is_complete(&self) -> bool {
        !self.front.trim().is_empty() && !self.back.trim().is_empty()
    }

    /// Recompute the fingerprint from the current front/back
    pub fn refresh_key(&mut self) {
        self.card_key = card_key(&self.front, &self.back);
    }
}

/// Deterministic fingerprint of a card's content
///
/// SHA-256 over the normalized `"{front} || {back}"` (lower-cased, punctuation
/// and whitespace runs collapsed to single spaces), truncated to 40 hex chars.
pub fn card_key(front: &str, back: &str) -> String {
    let base = normalize_for_key(&format!("{} || {}", front, back));
    let digest = Sha256::digest(base.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(CARD_KEY_LEN);
    hex
}

/// What kind of knowledge a card tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextTag {
    Definition,
    Formula,
    Example,
    Concept,
    #[default]
    General,
}

impl ContextTag {
    /// Parse a free-form label from a model response
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "definition" | "def" | "term" => Some(ContextTag::Definition),
            "formula" | "equation" | "math" => Some(ContextTag::Formula),
            "example" | "worked example" | "problem" => Some(ContextTag::Example),
            "concept" | "idea" | "principle" => Some(ContextTag::Concept),
            "general" | "fact" | "text" => Some(ContextTag::General),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextTag::Definition => "definition",
            ContextTag::Formula => "formula",
            ContextTag::Example => "example",
            ContextTag::Concept => "concept",
            ContextTag::General => "general",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_key_is_40_hex() {
        let key = card_key("What is X?", "Y");
        assert_eq!(key.len(), CARD_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_card_key_ignores_case_whitespace_punctuation() {
        assert_eq!(card_key("What is X?", "Y"), card_key("  what is x?  ", "y"));
        assert_eq!(card_key("What is X?", "Y"), card_key("WHAT -- is X", "Y."));
    }

    #[test]
    fn test_card_key_changes_with_content() {
        let base = card_key("What is X?", "Y");
        assert_ne!(base, card_key("What is Z?", "Y"));
        assert_ne!(base, card_key("What is X?", "Z"));
        assert_ne!(base, card_key("Y", "What is X?"));
    }

    #[test]
    fn test_card_key_distinguishes_non_latin_content() {
        let dna = card_key("Что такое ДНК?", "Молекула наследственности");
        let rna = card_key("Что такое РНК?", "Рибонуклеиновая кислота");
        let photosynthesis = card_key("光合作用是什么？", "植物利用光能");
        let empty = card_key("", "");

        assert_ne!(dna, rna);
        assert_ne!(dna, photosynthesis);
        assert_ne!(rna, photosynthesis);
        assert_ne!(dna, empty);
        assert_eq!(dna, card_key("что такое днк", "молекула наследственности!"));
    }

    #[test]
    fn test_new_card_trims_and_keys() {
        let card = Card::new("  Front ", " Back  ");
        assert_eq!(card.front, "Front");
        assert_eq!(card.back, "Back");
        assert_eq!(card.card_key, card_key("Front", "Back"));
        assert!(card.is_complete());
        assert!(!Card::new("", "Back").is_complete());
    }

    #[test]
    fn test_context_labels() {
        assert_eq!(ContextTag::from_label(" Formula "), Some(ContextTag::Formula));
        assert_eq!(ContextTag::from_label("nonsense"), None);
        assert_eq!(ContextTag::Definition.as_str(), "definition");
    }
}
