//! Bullet-level fact extraction

use crate::models::{Fact, FactKind, Page};
use once_cell::sync::Lazy;
use regex::Regex;

/// Longest term (in words) accepted for a `term: definition` bullet
const MAX_TERM_WORDS: usize = 6;

/// Bullet or numeral marker followed by the item body
static BULLET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•▪◦‣–]|\d{1,3}[.)]|\(?[a-z]\))\s+(?P<body>\S.*)$")
        .expect("bullet regex is valid")
});

static EXAMPLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:worked\s+)?(?:example|e\.g\.)\s*\d*\s*[:.\-–]\s*(?P<rest>.*)$")
        .expect("example regex is valid")
});

static SOLUTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:solution|answer)\s*[:\-–]\s*").expect("solution regex is valid")
});

/// Equals, comparisons, and calculus notation
static FORMULA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"=|≤|≥|≠|≈|<|>|∫|∑|√|∂|\bd[a-z]/d[a-z]\b|\blim\b")
        .expect("formula regex is valid")
});

static DEFINITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<term>[^:]{1,80}?)\s*:\s+(?P<def>\S.*)$").expect("definition regex is valid")
});

/// Classify one bullet body
///
/// Priority: example prefix, formula notation, `term: definition`, then a
/// concept keyed by the section title.
pub fn classify(body: &str, section_title: &str) -> FactKind {
    let body = body.trim();

    if let Some(caps) = EXAMPLE_RE.captures(body) {
        let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
        let (prompt, solution) = match SOLUTION_RE.find(rest) {
            Some(m) => (rest[..m.start()].trim(), rest[m.end()..].trim()),
            None => (rest.trim(), ""),
        };
        return FactKind::Example {
            prompt: prompt.to_string(),
            solution: solution.to_string(),
        };
    }

    if FORMULA_RE.is_match(body) {
        // `Name: expr` keeps the name when it carries no notation itself
        if let Some(caps) = DEFINITION_RE.captures(body) {
            let name = caps["term"].trim();
            if !FORMULA_RE.is_match(name) && name.split_whitespace().count() <= MAX_TERM_WORDS {
                return FactKind::Formula {
                    name: name.to_string(),
                    expr: caps["def"].trim().to_string(),
                };
            }
        }
        return FactKind::Formula {
            name: String::new(),
            expr: body.to_string(),
        };
    }

    if let Some(caps) = DEFINITION_RE.captures(body) {
        let term = caps["term"].trim();
        if term.split_whitespace().count() <= MAX_TERM_WORDS {
            return FactKind::Definition {
                term: term.to_string(),
                def: caps["def"].trim().to_string(),
            };
        }
    }

    FactKind::Concept {
        term: section_title.to_string(),
        def: body.to_string(),
    }
}

/// Collect facts from the bullet lines of the given pages
///
/// `next_ordinal` is the document-wide counter; it advances once per fact.
pub fn extract_facts(pages: &[&Page], section_title: &str, next_ordinal: &mut usize) -> Vec<Fact> {
    let mut facts = Vec::new();

    for page in pages {
        for line in page.text.lines() {
            let caps = match BULLET_RE.captures(line) {
                Some(c) => c,
                None => continue,
            };
            let body = caps["body"].trim();

            *next_ordinal += 1;
            facts.push(Fact {
                kind: classify(body, section_title),
                excerpt: body.to_string(),
                page: Some(page.number),
                ordinal: *next_ordinal,
            });
        }
    }

    facts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_priority() {
        assert_eq!(
            classify("Example: 2 + 2 = ? Solution: 4", "Math"),
            FactKind::Example {
                prompt: "2 + 2 = ?".into(),
                solution: "4".into()
            }
        );
        assert_eq!(
            classify("Newton's second law: F = m a", "Physics"),
            FactKind::Formula {
                name: "Newton's second law".into(),
                expr: "F = m a".into()
            }
        );
        assert_eq!(
            classify("x^2 >= 0 for real x", "Math"),
            FactKind::Formula {
                name: String::new(),
                expr: "x^2 >= 0 for real x".into()
            }
        );
        assert_eq!(
            classify("Osmosis: diffusion of water across a membrane", "Cells"),
            FactKind::Definition {
                term: "Osmosis".into(),
                def: "diffusion of water across a membrane".into()
            }
        );
        assert_eq!(
            classify("Mitochondria produce most of the cell's ATP", "Cells"),
            FactKind::Concept {
                term: "Cells".into(),
                def: "Mitochondria produce most of the cell's ATP".into()
            }
        );
    }

    #[test]
    fn test_long_term_is_not_a_definition() {
        let kind = classify("this lead-in is far too long to be a term: really", "T");
        assert!(matches!(kind, FactKind::Concept { .. }));
    }

    #[test]
    fn test_only_bullet_lines_become_facts() {
        let p1 = Page::new("Intro prose line\n- Osmosis: water diffusion\n2) Example: find x", 4);
        let p2 = Page::new("• ATP stores energy\nplain closing line", 5);
        let mut ordinal = 10;

        let facts = extract_facts(&[&p1, &p2], "Cells", &mut ordinal);

        assert_eq!(facts.len(), 3);
        assert_eq!(facts[0].ordinal, 11);
        assert_eq!(facts[0].page, Some(4));
        assert!(matches!(facts[1].kind, FactKind::Example { .. }));
        assert_eq!(facts[2].page, Some(5));
        assert_eq!(facts[2].excerpt, "ATP stores energy");
        assert_eq!(ordinal, 13);
    }
}
