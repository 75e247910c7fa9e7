//! Progress event types for deck generation
//!
//! Events are emitted by the generation pipeline on an optional channel so a
//! front end (CLI progress log, SSE bridge, ...) can follow a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deck generation progress events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GenerationEvent {
    /// Document text extracted
    DocumentExtracted {
        /// Source file path
        file_path: String,
        /// Number of pages (pseudo-pages for DOCX/TXT)
        pages: usize,
        /// Whether the document carried an outline
        has_outline: bool,
        timestamp: DateTime<Utc>,
    },

    /// Sections derived from the outline, headings, pages, or a caller plan
    SectionsBuilt {
        /// Number of sections
        sections: usize,
        /// How the sections were derived
        source: String,
        timestamp: DateTime<Utc>,
    },

    /// Per-section quotas computed
    QuotasAllocated {
        /// Requested total
        requested: usize,
        /// Quota per section, in section order
        quotas: Vec<usize>,
        /// Cards lost to the per-section ceiling
        dropped: usize,
        timestamp: DateTime<Utc>,
    },

    /// Section synthesis started
    SectionStarted {
        /// Section index (0-based)
        section_index: usize,
        /// Section title
        title: String,
        /// Cards requested for this section
        target: usize,
    },

    /// Section synthesis finished
    SectionCompleted {
        /// Section index (0-based)
        section_index: usize,
        /// Cards requested for this section
        target: usize,
        /// Cards produced by the synthesizer (before global dedupe)
        generated: usize,
        /// Generation calls made
        calls: usize,
        /// Generation calls that failed
        failures: usize,
    },

    /// Catch-up pass over pooled leftover material
    CatchUpStarted {
        /// Cards missing from the requested total
        shortfall: usize,
    },

    /// Final deck assembled
    DeckAssembled {
        /// Cards in the final deck
        cards: usize,
        /// Requested total
        requested: usize,
        /// Duplicates rejected during assembly
        duplicates_dropped: usize,
        timestamp: DateTime<Utc>,
    },
}

impl GenerationEvent {
    /// Short machine-friendly name of the event variant
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationEvent::DocumentExtracted { .. } => "document_extracted",
            GenerationEvent::SectionsBuilt { .. } => "sections_built",
            GenerationEvent::QuotasAllocated { .. } => "quotas_allocated",
            GenerationEvent::SectionStarted { .. } => "section_started",
            GenerationEvent::SectionCompleted { .. } => "section_completed",
            GenerationEvent::CatchUpStarted { .. } => "catch_up_started",
            GenerationEvent::DeckAssembled { .. } => "deck_assembled",
        }
    }
}
