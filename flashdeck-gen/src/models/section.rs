use super::card::ContextTag;
use serde::{Deserialize, Serialize};

/// Contiguous page range of the document with its text and extracted facts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub page_start: u32,
    /// Inclusive, never below `page_start`
    pub page_end: u32,
    /// Raw section text, seed source for synthesis
    pub text: String,
    /// Facts in document order
    pub items: Vec<Fact>,
}

impl Section {
    pub fn new(title: impl Into<String>, page_start: u32, page_end: u32, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            page_start,
            page_end: page_end.max(page_start),
            text: text.into(),
            items: Vec::new(),
        }
    }

    pub fn contains_page(&self, page: u32) -> bool {
        page >= self.page_start && page <= self.page_end
    }

    pub fn page_span(&self) -> u32 {
        self.page_end - self.page_start + 1
    }

    pub fn word_count(&self) -> usize {
        flashdeck_common::text::count_words(&self.text)
    }
}

/// Sub-section unit used as synthesis seed material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub kind: FactKind,
    /// Source line the fact was read from
    pub excerpt: String,
    pub page: Option<u32>,
    /// 1-based position within the document
    pub ordinal: usize,
}

/// Kind of fact, with the fields each kind carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FactKind {
    Definition { term: String, def: String },
    Formula { name: String, expr: String },
    Example { prompt: String, solution: String },
    Concept { term: String, def: String },
    Text { body: String },
}

impl FactKind {
    /// Seed text handed to the generation call
    pub fn seed_text(&self) -> String {
        match self {
            FactKind::Definition { term, def } => format!("Definition: {}: {}", term, def),
            FactKind::Formula { name, expr } if name.is_empty() => format!("Formula: {}", expr),
            FactKind::Formula { name, expr } => format!("Formula ({}): {}", name, expr),
            FactKind::Example { prompt, solution } if solution.is_empty() => {
                format!("Example: {}", prompt)
            }
            FactKind::Example { prompt, solution } => {
                format!("Example: {} Solution: {}", prompt, solution)
            }
            FactKind::Concept { term, def } => format!("{}: {}", term, def),
            FactKind::Text { body } => body.clone(),
        }
    }

    /// Card context tag implied by this fact kind
    pub fn context_tag(&self) -> ContextTag {
        match self {
            FactKind::Definition { .. } => ContextTag::Definition,
            FactKind::Formula { .. } => ContextTag::Formula,
            FactKind::Example { .. } => ContextTag::Example,
            FactKind::Concept { .. } => ContextTag::Concept,
            FactKind::Text { .. } => ContextTag::General,
        }
    }
}

impl Fact {
    pub fn seed_text(&self) -> String {
        self.kind.seed_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_text_per_kind() {
        let def = FactKind::Definition {
            term: "Osmosis".into(),
            def: "diffusion of water across a membrane".into(),
        };
        assert_eq!(def.seed_text(), "Definition: Osmosis: diffusion of water across a membrane");

        let formula = FactKind::Formula {
            name: "Newton".into(),
            expr: "F = m a".into(),
        };
        assert_eq!(formula.seed_text(), "Formula (Newton): F = m a");

        let bare = FactKind::Formula {
            name: String::new(),
            expr: "x < y".into(),
        };
        assert_eq!(bare.seed_text(), "Formula: x < y");

        let example = FactKind::Example {
            prompt: "2 + 2".into(),
            solution: "4".into(),
        };
        assert_eq!(example.seed_text(), "Example: 2 + 2 Solution: 4");
        assert_eq!(example.context_tag(), ContextTag::Example);
    }

    #[test]
    fn test_section_clamps_end_page() {
        let s = Section::new("Intro", 4, 2, "text");
        assert_eq!(s.page_end, 4);
        assert_eq!(s.page_span(), 1);
        assert!(s.contains_page(4));
        assert!(!s.contains_page(5));
    }
}
