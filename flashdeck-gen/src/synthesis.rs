//! Card synthesis for one section
//!
//! Drives repeated generation calls over a section's seed windows until the
//! section target is met or generation stops producing anything new. Each
//! worker keeps its own local dedupe set; the run-wide dedupe happens in the
//! assembler once every worker has finished.

use crate::llm::{CardGenerator, GenerationError, GenerationRequest, RawCard};
use crate::models::{Card, ContextTag, Section};
use flashdeck_common::text::{count_words, truncate_chars};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest excerpt stored on a card
pub const MAX_EXCERPT_CHARS: usize = 500;

/// Synthesizer tuning
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Cards requested per generation call
    pub batch_size: usize,
    /// Deadline for a single generation call
    pub call_timeout: Duration,
    /// Consecutive passes without a new card before giving up
    pub max_idle_passes: usize,
    /// Target size of a text chunk when a section has no facts
    pub words_per_chunk: usize,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            batch_size: 3,
            call_timeout: Duration::from_secs(60),
            max_idle_passes: 2,
            words_per_chunk: 350,
        }
    }
}

/// Seed material for one generation request
#[derive(Debug, Clone, PartialEq)]
pub struct SeedWindow {
    pub text: String,
    pub page: Option<u32>,
    /// Context implied by the seed facts, when they agree
    pub context: Option<ContextTag>,
}

/// Result of synthesizing one section
#[derive(Debug, Clone)]
pub struct SectionOutcome {
    pub section_index: usize,
    pub title: String,
    pub target: usize,
    /// Accepted cards in acceptance order, at most `target`
    pub cards: Vec<Card>,
    pub calls: usize,
    pub failures: usize,
    /// Seed text of windows that never yielded a card
    pub leftover_seeds: Vec<String>,
}

impl SectionOutcome {
    pub fn shortfall(&self) -> usize {
        self.target.saturating_sub(self.cards.len())
    }
}

/// Split a section into seed windows
///
/// Facts are grouped `batch_size` at a time and come first; the section text
/// follows as paragraph-aligned chunks of at most `words_per_chunk` words, so
/// prose around the bullets is still reached once the facts run dry.
pub fn seed_windows(section: &Section, options: &SynthesisOptions) -> Vec<SeedWindow> {
    let mut windows: Vec<SeedWindow> = section
        .items
        .chunks(options.batch_size.max(1))
        .map(|facts| {
            let first_context = facts[0].kind.context_tag();
            let same_context = facts.iter().all(|f| f.kind.context_tag() == first_context);
            SeedWindow {
                text: facts
                    .iter()
                    .map(|f| f.seed_text())
                    .collect::<Vec<_>>()
                    .join("\n"),
                page: facts.iter().find_map(|f| f.page),
                context: same_context.then_some(first_context),
            }
        })
        .collect();

    windows.extend(text_windows(section, options.words_per_chunk.max(1)));
    windows
}

fn text_windows(section: &Section, words_per_chunk: usize) -> Vec<SeedWindow> {
    let text = section.text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    // (chunk text, byte offset where it starts)
    let mut chunks: Vec<(String, usize)> = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_start = 0usize;
    let mut tally = 0usize;

    for (offset, para) in paragraphs(text) {
        for (piece_offset, piece) in bounded_pieces(para, words_per_chunk) {
            let words = count_words(piece);
            if words == 0 {
                continue;
            }
            if tally + words > words_per_chunk && !buffer.is_empty() {
                chunks.push((buffer.join("\n\n"), buffer_start));
                buffer.clear();
                tally = 0;
            }
            if buffer.is_empty() {
                buffer_start = offset + piece_offset;
            }
            buffer.push(piece);
            tally += words;
        }
    }
    if !buffer.is_empty() {
        chunks.push((buffer.join("\n\n"), buffer_start));
    }

    let span = section.page_span() as usize;
    chunks
        .into_iter()
        .map(|(chunk, offset)| {
            // Page estimated from the chunk's position in the section text
            let page = section.page_start + (offset * span / text.len().max(1)) as u32;
            SeedWindow {
                text: chunk,
                page: Some(page.min(section.page_end)),
                context: None,
            }
        })
        .collect()
}

/// Blank-line separated paragraphs with their byte offsets
fn paragraphs(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if !trimmed.is_empty() {
            out.push((offset + (trimmed.as_ptr() as usize - para.as_ptr() as usize), trimmed));
        }
        offset += para.len() + 2;
    }
    out
}

/// Cut a paragraph into pieces of at most `limit` words
///
/// Line breaks are preferred cut points; a single line over the limit is cut
/// between words. Offsets are relative to `para`.
fn bounded_pieces(para: &str, limit: usize) -> Vec<(usize, &str)> {
    if count_words(para) <= limit {
        return vec![(0, para)];
    }

    let mut pieces = Vec::new();
    // Byte range of the piece being grown, and its word count
    let mut current: Option<(usize, usize)> = None;
    let mut tally = 0usize;

    for line in para.lines() {
        let line = line.trim();
        let words = count_words(line);
        if words == 0 {
            continue;
        }
        let start = line.as_ptr() as usize - para.as_ptr() as usize;
        let end = start + line.len();

        if words > limit {
            if let Some((s, e)) = current.take() {
                pieces.push((s, &para[s..e]));
            }
            tally = 0;
            pieces.extend(
                word_runs(line, limit)
                    .into_iter()
                    .map(|(o, run)| (start + o, run)),
            );
            continue;
        }

        match current {
            Some((s, e)) if tally + words > limit => {
                pieces.push((s, &para[s..e]));
                current = Some((start, end));
                tally = words;
            }
            Some((s, _)) => {
                current = Some((s, end));
                tally += words;
            }
            None => {
                current = Some((start, end));
                tally = words;
            }
        }
    }
    if let Some((s, e)) = current {
        pieces.push((s, &para[s..e]));
    }
    pieces
}

/// Runs of whitespace-separated tokens holding at most `limit` words each
fn word_runs(line: &str, limit: usize) -> Vec<(usize, &str)> {
    let base = line.as_ptr() as usize;
    let mut runs = Vec::new();
    // Byte range of the run being grown, and its word count
    let mut current: Option<(usize, usize)> = None;
    let mut tally = 0usize;

    for token in line.split_whitespace() {
        let words = count_words(token);
        let start = token.as_ptr() as usize - base;
        let end = start + token.len();

        current = match current {
            Some((s, e)) if tally + words > limit && tally > 0 => {
                runs.push((s, &line[s..e]));
                tally = words;
                Some((start, end))
            }
            Some((s, _)) => {
                tally += words;
                Some((s, end))
            }
            None => {
                tally = words;
                Some((start, end))
            }
        };
    }
    if let Some((s, e)) = current {
        runs.push((s, &line[s..e]));
    }
    runs
}

/// Per-section card producer
pub struct Synthesizer {
    generator: Arc<dyn CardGenerator>,
    options: SynthesisOptions,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn CardGenerator>, options: SynthesisOptions) -> Self {
        Self { generator, options }
    }

    pub fn options(&self) -> &SynthesisOptions {
        &self.options
    }

    /// Produce up to `target` distinct cards for one section
    ///
    /// Generation failures count as empty attempts and never abort the
    /// section. Each pass over the seed windows either accepts a new card or
    /// counts as idle, so at most `target + max_idle_passes` passes run.
    pub async fn synthesize(&self, section: &Section, section_index: usize, target: usize) -> SectionOutcome {
        let windows = seed_windows(section, &self.options);
        let batch_size = self.options.batch_size.max(1);
        let max_passes = target + self.options.max_idle_passes;

        let mut outcome = SectionOutcome {
            section_index,
            title: section.title.clone(),
            target,
            cards: Vec::new(),
            calls: 0,
            failures: 0,
            leftover_seeds: Vec::new(),
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut productive = vec![false; windows.len()];
        let mut idle_passes = 0usize;
        let mut passes = 0usize;

        while outcome.cards.len() < target
            && !windows.is_empty()
            && idle_passes < self.options.max_idle_passes
            && passes < max_passes
        {
            passes += 1;
            let before = outcome.cards.len();

            for (w, window) in windows.iter().enumerate() {
                let need = target - outcome.cards.len();
                if need == 0 {
                    break;
                }

                let batch = need.min(batch_size);
                let raws = self.call(window, section, batch, &mut outcome).await;
                let mut accepted = self.accept(raws, window, section, need, &mut seen, &mut outcome);

                if accepted == 0 {
                    // Single-item retries for a batch that yielded nothing usable
                    for _ in 0..batch_size {
                        let need = target - outcome.cards.len();
                        if need == 0 {
                            break;
                        }
                        let raws = self.call(window, section, 1, &mut outcome).await;
                        accepted += self.accept(raws, window, section, need, &mut seen, &mut outcome);
                    }
                }

                if accepted > 0 {
                    productive[w] = true;
                }
            }

            if outcome.cards.len() == before {
                idle_passes += 1;
            } else {
                idle_passes = 0;
            }
        }

        outcome.leftover_seeds = windows
            .iter()
            .zip(&productive)
            .filter(|(_, used)| !**used)
            .map(|(window, _)| window.text.clone())
            .collect();

        info!(
            section = %section.title,
            section_index,
            requested = target,
            generated = outcome.cards.len(),
            calls = outcome.calls,
            failures = outcome.failures,
            passes,
            "Section synthesis finished"
        );

        outcome
    }

    /// One generation call under the per-call timeout; failures yield no cards
    async fn call(
        &self,
        window: &SeedWindow,
        section: &Section,
        max_cards: usize,
        outcome: &mut SectionOutcome,
    ) -> Vec<RawCard> {
        let request = GenerationRequest {
            chunk_text: window.text.clone(),
            page_hint: window.page,
            section_hint: Some(section.title.clone()),
            max_cards,
        };

        outcome.calls += 1;
        let timeout = self.options.call_timeout;
        let result = match tokio::time::timeout(timeout, self.generator.generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(timeout)),
        };

        match result {
            Ok(cards) => cards,
            Err(e) => {
                outcome.failures += 1;
                warn!(section = %section.title, error = %e, "Generation call failed");
                Vec::new()
            }
        }
    }

    /// Validate raw cards and append new ones; returns how many were accepted
    fn accept(
        &self,
        raws: Vec<RawCard>,
        window: &SeedWindow,
        section: &Section,
        need: usize,
        seen: &mut HashSet<String>,
        outcome: &mut SectionOutcome,
    ) -> usize {
        let mut accepted = 0usize;

        for raw in raws {
            if accepted == need {
                break;
            }
            let card = finish_card(raw, window, section);
            if !card.is_complete() {
                continue;
            }
            if !seen.insert(card.card_key.clone()) {
                debug!(section = %section.title, "Skipping repeated card within section");
                continue;
            }
            outcome.cards.push(card);
            accepted += 1;
        }

        accepted
    }
}

/// Stamp a raw card with section, page, context, excerpt and distractors
fn finish_card(raw: RawCard, window: &SeedWindow, section: &Section) -> Card {
    let mut card = Card::new(raw.front, raw.back);

    card.page = match raw.page {
        Some(p) if section.contains_page(p) => Some(p),
        _ => window.page,
    };
    card.section = Some(section.title.clone());
    card.context = raw
        .context
        .as_deref()
        .and_then(ContextTag::from_label)
        .or(window.context)
        .unwrap_or_default();

    let excerpt = raw
        .excerpt
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| window.text.clone());
    card.excerpt = truncate_chars(excerpt.trim(), MAX_EXCERPT_CHARS).to_string();

    let mut distractors = raw
        .distractors
        .into_iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    card.distractors = [
        distractors.next().unwrap_or_default(),
        distractors.next().unwrap_or_default(),
    ];

    card
}

/// Pseudo-section pooling leftover seed text for the catch-up pass
///
/// Each seed becomes its own paragraph, so chunking keeps seeds whole unless
/// a single seed is over the chunk budget.
pub fn mixed_topics_section(seeds: &[String], page_count: u32, max_chars: usize) -> Section {
    let mut text = String::new();
    for seed in seeds.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if text.chars().count() >= max_chars {
            break;
        }
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(seed);
    }
    let text = truncate_chars(&text, max_chars).to_string();

    Section::new("Mixed topics", 1, page_count.max(1), text)
}
