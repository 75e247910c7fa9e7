//! Deck assembly
//!
//! Single-threaded merge of per-section results. Owns the only run-wide
//! "seen" set, so the first occurrence of a fingerprint wins in section
//! order regardless of which worker finished first.

use crate::models::Card;
use crate::synthesis::SectionOutcome;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Ordinal distance between consecutive sections
pub const ORDINAL_STRIDE: u64 = 10_000;

/// Final, ordered deck
#[derive(Debug, Clone, Default)]
pub struct AssembledDeck {
    pub cards: Vec<Card>,
    pub duplicates_dropped: usize,
}

#[derive(Debug)]
struct Entry {
    card: Card,
    seq: usize,
}

/// Incremental deck builder
#[derive(Debug, Default)]
pub struct Assembler {
    seen: HashSet<String>,
    entries: Vec<Entry>,
    next_position: HashMap<usize, u64>,
    duplicates: usize,
    incomplete: usize,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one section's cards; returns how many were kept
    ///
    /// Cards with an empty side are dropped, as are cards whose fingerprint
    /// was already kept earlier in the run.
    pub fn absorb(&mut self, section_index: usize, cards: Vec<Card>) -> usize {
        let mut kept = 0usize;

        for mut card in cards {
            if !card.is_complete() {
                self.incomplete += 1;
                continue;
            }
            card.refresh_key();
            if !self.seen.insert(card.card_key.clone()) {
                self.duplicates += 1;
                debug!(
                    section_index,
                    card_key = %card.card_key,
                    "Dropping duplicate card"
                );
                continue;
            }

            let position = self.next_position.entry(section_index).or_insert(0);
            card.ordinal = section_index as u64 * ORDINAL_STRIDE + *position;
            *position += 1;

            let seq = self.entries.len();
            self.entries.push(Entry { card, seq });
            kept += 1;
        }

        kept
    }

    /// Cards kept so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cards kept so far for one section
    pub fn kept_for(&self, section_index: usize) -> usize {
        self.next_position.get(&section_index).copied().unwrap_or(0) as usize
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates
    }

    /// Sort into document order and truncate to `limit`
    pub fn finish(self, limit: Option<usize>) -> AssembledDeck {
        let mut entries = self.entries;
        entries.sort_by(|a, b| {
            a.card
                .ordinal
                .cmp(&b.card.ordinal)
                .then_with(|| page_key(&a.card).cmp(&page_key(&b.card)))
                .then(a.seq.cmp(&b.seq))
        });

        let mut cards: Vec<Card> = entries.into_iter().map(|e| e.card).collect();
        if let Some(limit) = limit {
            cards.truncate(limit);
        }

        if self.incomplete > 0 {
            debug!(incomplete = self.incomplete, "Dropped cards with an empty side");
        }

        AssembledDeck {
            cards,
            duplicates_dropped: self.duplicates,
        }
    }
}

/// Missing pages sort after every real page
fn page_key(card: &Card) -> (bool, u32) {
    match card.page {
        Some(p) => (false, p),
        None => (true, 0),
    }
}

/// Merge section outcomes in section order and finish the deck
pub fn assemble(outcomes: &[SectionOutcome], total: Option<usize>) -> AssembledDeck {
    let mut ordered: Vec<&SectionOutcome> = outcomes.iter().collect();
    ordered.sort_by_key(|o| o.section_index);

    let mut assembler = Assembler::new();
    for outcome in ordered {
        assembler.absorb(outcome.section_index, outcome.cards.clone());
    }
    assembler.finish(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(front: &str, back: &str, page: Option<u32>) -> Card {
        let mut c = Card::new(front, back);
        c.page = page;
        c
    }

    fn outcome(section_index: usize, cards: Vec<Card>) -> SectionOutcome {
        SectionOutcome {
            section_index,
            title: format!("S{}", section_index),
            target: cards.len(),
            cards,
            calls: 1,
            failures: 0,
            leftover_seeds: Vec::new(),
        }
    }

    #[test]
    fn test_cross_section_duplicate_first_wins() {
        let outcomes = vec![
            outcome(0, vec![card("What is ATP?", "Energy currency", Some(2))]),
            outcome(1, vec![card("what is ATP", "energy currency.", Some(9))]),
        ];

        let deck = assemble(&outcomes, None);

        assert_eq!(deck.cards.len(), 1);
        assert_eq!(deck.cards[0].page, Some(2));
        assert_eq!(deck.duplicates_dropped, 1);
    }

    #[test]
    fn test_order_independent_of_completion_order() {
        let a = outcome(0, vec![card("A1", "x", Some(1)), card("A2", "x", Some(2))]);
        let b = outcome(1, vec![card("B1", "x", Some(5))]);
        let c = outcome(2, vec![card("C1", "x", None)]);

        let forward = assemble(&[a.clone(), b.clone(), c.clone()], None);
        let reversed = assemble(&[c, b, a], None);

        let fronts = |d: &AssembledDeck| d.cards.iter().map(|c| c.front.clone()).collect::<Vec<_>>();
        assert_eq!(fronts(&forward), vec!["A1", "A2", "B1", "C1"]);
        assert_eq!(fronts(&forward), fronts(&reversed));

        let ordinals: Vec<u64> = forward.cards.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 10_000, 20_000]);
    }

    #[test]
    fn test_idempotent_reassembly() {
        let outcomes = vec![
            outcome(0, vec![card("Q1", "A1", Some(1)), card("Q1", "A1", Some(1))]),
            outcome(1, vec![card("Q2", "A2", None)]),
        ];
        let once = assemble(&outcomes, None);
        let twice = assemble(&[outcome(0, once.cards.clone())], None);

        let keys = |d: &AssembledDeck| d.cards.iter().map(|c| c.card_key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&once), keys(&twice));
        assert_eq!(twice.duplicates_dropped, 0);
    }

    #[test]
    fn test_incomplete_cards_dropped() {
        let deck = assemble(&[outcome(0, vec![card("", "back", None), card("Q", "A", None)])], None);
        assert_eq!(deck.cards.len(), 1);
        assert_eq!(deck.duplicates_dropped, 0);
    }

    #[test]
    fn test_truncate_after_ordering() {
        let outcomes = vec![
            outcome(1, vec![card("late", "x", Some(9))]),
            outcome(0, vec![card("early", "x", Some(1)), card("early2", "x", Some(1))]),
        ];
        let deck = assemble(&outcomes, Some(2));
        let fronts: Vec<&str> = deck.cards.iter().map(|c| c.front.as_str()).collect();
        assert_eq!(fronts, vec!["early", "early2"]);
    }

    #[test]
    fn test_catch_up_cards_follow_sections() {
        let mut assembler = Assembler::new();
        assembler.absorb(0, vec![card("Q", "A", Some(1))]);
        assembler.absorb(3, vec![card("Q", "A", None), card("Extra", "B", None)]);

        assert_eq!(assembler.kept_for(3), 1);
        let deck = assembler.finish(None);
        assert_eq!(deck.cards.last().map(|c| c.ordinal), Some(30_000));
        assert_eq!(deck.duplicates_dropped, 1);
    }
}
