//! Document analysis
//!
//! Fast inspection without any generation call: page and word counts, the
//! outline-derived table of contents, a recommended deck size and the quota
//! split at that size.

use crate::allocation::{allocate, recommend_total, suggested_range, AllocatorOptions, SuggestedRange, Weights};
use crate::models::{OutlineEntry, Page};
use crate::sections::{build_sections_with_source, SectionSource};
use flashdeck_common::text::count_words;
use serde::{Deserialize, Serialize};

/// One table-of-contents row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocSection {
    pub title: String,
    pub page_start: u32,
    pub page_end: u32,
    pub words: usize,
}

/// Planned cards for one section at the recommended total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionQuota {
    pub title: String,
    pub page_start: u32,
    pub page_end: u32,
    pub cards: usize,
}

/// Result of [`analyze`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub pages: usize,
    pub words: usize,
    pub words_per_page: f64,
    /// Number of outline-derived sections (0 without an outline)
    pub sections_count: usize,
    pub toc_sections: Vec<TocSection>,
    pub recommended_cards: usize,
    pub suggested_range: SuggestedRange,
    pub per_section_allocation: Vec<SectionQuota>,
}

/// Analyze extracted pages
pub fn analyze(
    pages: &[Page],
    outline: Option<&[OutlineEntry]>,
    fallback_sections: usize,
    options: &AllocatorOptions,
) -> DocumentAnalysis {
    let words: usize = pages.iter().map(|p| count_words(&p.text)).sum();
    let words_per_page = if pages.is_empty() {
        0.0
    } else {
        ((words as f64 / pages.len() as f64) * 10.0).round() / 10.0
    };

    let (sections, source) = build_sections_with_source(pages, outline, fallback_sections);

    // Only an outline counts as a table of contents here
    let toc_sections: Vec<TocSection> = if source == SectionSource::Outline {
        sections
            .iter()
            .map(|s| TocSection {
                title: s.title.clone(),
                page_start: s.page_start,
                page_end: s.page_end,
                words: s.word_count(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let recommended_cards = recommend_total(toc_sections.len(), words);
    let allocation = allocate(recommended_cards, &sections, &Weights::Derived, options);

    let per_section_allocation = sections
        .iter()
        .zip(&allocation.quotas)
        .map(|(s, &cards)| SectionQuota {
            title: s.title.clone(),
            page_start: s.page_start,
            page_end: s.page_end,
            cards,
        })
        .collect();

    DocumentAnalysis {
        pages: pages.len(),
        words,
        words_per_page,
        sections_count: toc_sections.len(),
        toc_sections,
        recommended_cards,
        suggested_range: suggested_range(recommended_cards),
        per_section_allocation,
    }
}
