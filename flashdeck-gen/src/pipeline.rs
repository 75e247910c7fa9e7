//! Deck generation pipeline
//!
//! One-way data flow:
//! extract → build sections → allocate → synthesize (parallel) → assemble
//!
//! # Error Handling
//! - Extraction and plan errors abort the run before any generation call
//! - Per-call generation failures are absorbed inside each section
//! - Per-section shortfalls become warnings, not errors
//! - A run that ends with zero cards fails with `NoCards`

use crate::allocation::{allocate, clamp_total, AllocatorOptions, Weights};
use crate::assembly::Assembler;
use crate::error::{GenError, GenResult};
use crate::extract::PageSource;
use crate::llm::CardGenerator;
use crate::models::{Card, ExtractedDocument, Section, SectionPlan};
use crate::sections::{build_sections_with_source, sections_from_plan, SectionSource};
use crate::synthesis::{mixed_topics_section, seed_windows, SectionOutcome, SynthesisOptions, Synthesizer};
use chrono::{DateTime, Utc};
use flashdeck_common::config::{GenerationSettings, OverflowPolicy};
use flashdeck_common::events::GenerationEvent;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Cap on pooled leftover text sent in the catch-up pass
const MAX_CATCH_UP_CHARS: usize = 24_000;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum sections synthesized concurrently
    pub concurrency: usize,
    /// Deadline for a single generation call
    pub call_timeout: Duration,
    /// Cards requested per generation call
    pub batch_size: usize,
    /// Per-section card ceiling
    pub max_per_section: usize,
    pub overflow: OverflowPolicy,
    /// Section count for the even page partition
    pub fallback_sections: usize,
    /// Total used when the request names none
    pub default_cards: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&GenerationSettings::default())
    }
}

impl From<&GenerationSettings> for PipelineConfig {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            concurrency: settings.concurrency.max(1),
            call_timeout: Duration::from_secs(settings.call_timeout_secs.max(1)),
            batch_size: settings.batch_size.max(1),
            max_per_section: settings.max_per_section.max(1),
            overflow: settings.overflow,
            fallback_sections: settings.fallback_sections,
            default_cards: settings.default_cards,
        }
    }
}

impl PipelineConfig {
    pub fn allocator_options(&self) -> AllocatorOptions {
        AllocatorOptions {
            ceiling: self.max_per_section,
            overflow: self.overflow,
        }
    }

    pub fn synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            batch_size: self.batch_size,
            call_timeout: self.call_timeout,
            ..Default::default()
        }
    }
}

/// What to generate
#[derive(Debug, Clone, Default)]
pub struct DeckRequest {
    pub path: PathBuf,
    /// Requested total, clamped to `[3, 30]`
    pub cards: Option<usize>,
    /// Caller-supplied per-section budget; replaces section detection
    pub plan: Option<Vec<SectionPlan>>,
    /// Defaults to the file stem
    pub deck_name: Option<String>,
}

impl DeckRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_cards(mut self, cards: usize) -> Self {
        self.cards = Some(cards);
        self
    }

    pub fn with_plan(mut self, plan: Vec<SectionPlan>) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_deck_name(mut self, name: impl Into<String>) -> Self {
        self.deck_name = Some(name.into());
        self
    }

    fn resolved_deck_name(&self) -> String {
        self.deck_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                self.path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "Deck".to_string())
    }
}

/// Planned vs. created cards for one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionReport {
    pub title: String,
    pub planned: usize,
    pub created: usize,
}

/// Finished deck
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckOutput {
    pub deck_id: Uuid,
    pub deck_name: String,
    pub requested: usize,
    pub cards: Vec<Card>,
    pub warnings: Vec<String>,
    pub per_section: Vec<SectionReport>,
    pub duplicates_dropped: usize,
    pub generated_at: DateTime<Utc>,
}

/// Deck generation orchestrator
pub struct DeckPipeline {
    config: PipelineConfig,
    extractor: Arc<dyn PageSource>,
    synthesizer: Synthesizer,
    event_tx: Option<mpsc::Sender<GenerationEvent>>,
}

impl DeckPipeline {
    pub fn new(
        config: PipelineConfig,
        extractor: Arc<dyn PageSource>,
        generator: Arc<dyn CardGenerator>,
    ) -> Self {
        let synthesizer = Synthesizer::new(generator, config.synthesis_options());
        Self {
            config,
            extractor,
            synthesizer,
            event_tx: None,
        }
    }

    /// Attach an event channel for progress reporting
    pub fn with_events(mut self, event_tx: mpsc::Sender<GenerationEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extract the document and generate its deck
    pub async fn run(&self, request: DeckRequest) -> GenResult<DeckOutput> {
        info!(file = %request.path.display(), "Deck generation started");

        let document = self.extract(&request.path).await?;

        self.emit_event(GenerationEvent::DocumentExtracted {
            file_path: request.path.display().to_string(),
            pages: document.pages.len(),
            has_outline: !document.outline.is_empty(),
            timestamp: Utc::now(),
        })
        .await;

        self.generate_from_document(&document, &request).await
    }

    /// Run the blocking reader on the blocking pool
    async fn extract(&self, path: &Path) -> GenResult<ExtractedDocument> {
        let extractor = Arc::clone(&self.extractor);
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| GenError::Internal(format!("extraction task failed: {}", e)))?
    }

    /// Generate a deck from already-extracted pages
    pub async fn generate_from_document(
        &self,
        document: &ExtractedDocument,
        request: &DeckRequest,
    ) -> GenResult<DeckOutput> {
        let mut warnings: Vec<String> = Vec::new();

        // Sections and weights
        let (sections, weights, source, total) = match &request.plan {
            Some(plan) => {
                let planned = sections_from_plan(&document.pages, plan);
                if planned.is_empty() {
                    return Err(GenError::InvalidPlan(
                        "no titled plan entry falls inside the document".to_string(),
                    ));
                }
                let (sections, counts): (Vec<Section>, Vec<usize>) = planned
                    .into_iter()
                    .map(|(s, cards)| (s, cards.min(self.config.max_per_section)))
                    .unzip();
                let total = clamp_total(counts.iter().sum());
                (sections, Weights::Planned(counts), SectionSource::Plan, total)
            }
            None => {
                let (sections, source) = build_sections_with_source(
                    &document.pages,
                    document.outline(),
                    self.config.fallback_sections,
                );
                let asked = request.cards.unwrap_or(self.config.default_cards);
                let total = clamp_total(asked);
                if total != asked {
                    debug!(asked, total, "Requested card total clamped");
                }
                (sections, Weights::Derived, source, total)
            }
        };

        self.emit_event(GenerationEvent::SectionsBuilt {
            sections: sections.len(),
            source: source.as_str().to_string(),
            timestamp: Utc::now(),
        })
        .await;

        // Quotas
        let allocation = allocate(total, &sections, &weights, &self.config.allocator_options());
        if allocation.dropped > 0 {
            warnings.push(format!(
                "Per-section ceiling of {} dropped {} card(s).",
                self.config.max_per_section, allocation.dropped
            ));
        }

        self.emit_event(GenerationEvent::QuotasAllocated {
            requested: total,
            quotas: allocation.quotas.clone(),
            dropped: allocation.dropped,
            timestamp: Utc::now(),
        })
        .await;

        // Parallel synthesis; workers return local results only
        let jobs: Vec<(usize, usize)> = allocation.nonzero().collect();
        let pool = self.config.concurrency.min(jobs.len()).max(1);
        info!(
            sections = sections.len(),
            active_sections = jobs.len(),
            workers = pool,
            requested = total,
            "Starting section synthesis"
        );

        let sections_ref = &sections;
        let mut outcomes: Vec<SectionOutcome> = stream::iter(jobs)
            .map(move |(index, quota)| async move {
                let section = &sections_ref[index];
                self.emit_event(GenerationEvent::SectionStarted {
                    section_index: index,
                    title: section.title.clone(),
                    target: quota,
                })
                .await;

                let outcome = self.synthesizer.synthesize(section, index, quota).await;

                self.emit_event(GenerationEvent::SectionCompleted {
                    section_index: index,
                    target: quota,
                    generated: outcome.cards.len(),
                    calls: outcome.calls,
                    failures: outcome.failures,
                })
                .await;

                outcome
            })
            .buffer_unordered(pool)
            .collect()
            .await;

        // Restore document order before the single-threaded merge
        outcomes.sort_by_key(|o| o.section_index);

        let mut assembler = Assembler::new();
        let mut leftover_seeds: Vec<String> = Vec::new();
        for outcome in &mut outcomes {
            assembler.absorb(outcome.section_index, std::mem::take(&mut outcome.cards));
            leftover_seeds.append(&mut outcome.leftover_seeds);
        }

        // Sections that never ran still hold unused material
        let synthesis_options = self.synthesizer.options();
        for (index, section) in sections.iter().enumerate() {
            if allocation.quotas.get(index).copied().unwrap_or(0) == 0 {
                leftover_seeds.extend(
                    seed_windows(section, synthesis_options)
                        .into_iter()
                        .map(|w| w.text),
                );
            }
        }

        // Catch-up pass over pooled leftovers; cards the ceiling dropped stay dropped
        let deck_target = allocation.total();
        let shortfall = deck_target.saturating_sub(assembler.len());
        if shortfall > 0 && !leftover_seeds.is_empty() {
            self.emit_event(GenerationEvent::CatchUpStarted { shortfall }).await;

            let mixed = mixed_topics_section(
                &leftover_seeds,
                document.page_count(),
                MAX_CATCH_UP_CHARS,
            );
            let catch_up_index = sections.len();
            let outcome = self
                .synthesizer
                .synthesize(&mixed, catch_up_index, shortfall)
                .await;
            let kept = assembler.absorb(catch_up_index, outcome.cards);
            info!(shortfall, kept, "Catch-up pass finished");
        }

        // Per-section report and shortfall warnings
        let per_section: Vec<SectionReport> = sections
            .iter()
            .enumerate()
            .map(|(index, section)| SectionReport {
                title: section.title.clone(),
                planned: allocation.quotas.get(index).copied().unwrap_or(0),
                created: assembler.kept_for(index),
            })
            .collect();

        for report in &per_section {
            if report.created < report.planned {
                warn!(
                    section = %report.title,
                    requested = report.planned,
                    generated = report.created,
                    "Section fell short of its quota"
                );
                warnings.push(format!(
                    "Section \"{}\": requested {}, generated {}.",
                    report.title, report.planned, report.created
                ));
            }
        }

        let deck = assembler.finish(Some(deck_target));

        self.emit_event(GenerationEvent::DeckAssembled {
            cards: deck.cards.len(),
            requested: total,
            duplicates_dropped: deck.duplicates_dropped,
            timestamp: Utc::now(),
        })
        .await;

        if deck.cards.is_empty() {
            return Err(GenError::NoCards);
        }

        info!(
            cards = deck.cards.len(),
            requested = total,
            duplicates_dropped = deck.duplicates_dropped,
            warnings = warnings.len(),
            "Deck generation completed"
        );

        Ok(DeckOutput {
            deck_id: Uuid::new_v4(),
            deck_name: request.resolved_deck_name(),
            requested: total,
            cards: deck.cards,
            warnings,
            per_section,
            duplicates_dropped: deck.duplicates_dropped,
            generated_at: Utc::now(),
        })
    }

    /// Emit a progress event
    async fn emit_event(&self, event: GenerationEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}
