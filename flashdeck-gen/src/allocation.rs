//! Quota allocation
//!
//! Splits a global card budget across sections. Derived weights get a flat
//! baseline of one card per section (breadth first) with the remainder shared
//! proportionally; a caller plan is scaled by largest remainder without a
//! baseline. A deterministic correction pass guarantees the quotas sum to the
//! requested total before the per-section ceiling is applied.

use crate::models::Section;
use flashdeck_common::config::OverflowPolicy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Smallest deck the caller-facing boundary accepts
pub const MIN_CARDS: usize = 3;
/// Largest deck the caller-facing boundary accepts
pub const MAX_CARDS: usize = 30;
/// Default per-section ceiling
pub const DEFAULT_MAX_PER_SECTION: usize = 8;
/// Words per card when no section table is available
const WORDS_PER_CARD: f64 = 200.0;

/// Clamp a requested total into `[MIN_CARDS, MAX_CARDS]`
pub fn clamp_total(total: usize) -> usize {
    total.clamp(MIN_CARDS, MAX_CARDS)
}

/// How section weights are obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Weights {
    /// Section word counts, flat baseline of one card per section
    Derived,
    /// Caller plan card counts, aligned with the sections, no baseline
    Planned(Vec<usize>),
}

/// Allocator tuning
#[derive(Debug, Clone, Copy)]
pub struct AllocatorOptions {
    /// Per-section cap on quotas
    pub ceiling: usize,
    pub overflow: OverflowPolicy,
}

impl Default for AllocatorOptions {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_MAX_PER_SECTION,
            overflow: OverflowPolicy::Discard,
        }
    }
}

/// Per-section quotas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Quota per section, aligned with the section list
    pub quotas: Vec<usize>,
    /// Total the quotas were split from
    pub requested: usize,
    /// Cards lost to the per-section ceiling
    pub dropped: usize,
}

impl Allocation {
    pub fn total(&self) -> usize {
        self.quotas.iter().sum()
    }

    /// Indices of sections with something to generate
    pub fn nonzero(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.quotas
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, q)| *q > 0)
    }
}

/// Split `total` cards across `sections`
pub fn allocate(
    total: usize,
    sections: &[Section],
    weights: &Weights,
    options: &AllocatorOptions,
) -> Allocation {
    let (raw, ideal, quotas) = match weights {
        Weights::Derived => {
            let raw: Vec<usize> = sections.iter().map(|s| s.word_count().max(1)).collect();
            let (ideal, quotas) = baseline_split(total, &raw);
            (raw, ideal, quotas)
        }
        Weights::Planned(counts) => {
            let mut raw = counts.clone();
            raw.resize(sections.len(), 0);
            let (ideal, quotas) = proportional_split(total, &raw);
            (raw, ideal, quotas)
        }
    };

    let allocation = apply_ceiling(total, quotas, &ideal, &raw, options);
    debug!(
        requested = total,
        quotas = ?allocation.quotas,
        dropped = allocation.dropped,
        "Allocated section quotas"
    );
    allocation
}

/// Flat baseline of one card per section, remainder shared by weight
///
/// Returns the ideal (fractional) shares alongside the integer quotas. With
/// fewer cards than sections, the baseline goes to the heaviest sections.
pub fn baseline_split(total: usize, weights: &[usize]) -> (Vec<f64>, Vec<usize>) {
    let n = weights.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }

    if total < n {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| weights[b].cmp(&weights[a]).then(a.cmp(&b)));

        let mut quotas = vec![0; n];
        for &i in order.iter().take(total) {
            quotas[i] = 1;
        }
        let ideal = quotas.iter().map(|&q| q as f64).collect();
        return (ideal, quotas);
    }

    let remaining = (total - n) as f64;
    let weight_sum: f64 = weights.iter().map(|&w| w.max(1) as f64).sum();

    let ideal: Vec<f64> = weights
        .iter()
        .map(|&w| 1.0 + remaining * (w.max(1) as f64) / weight_sum)
        .collect();
    let mut quotas: Vec<usize> = ideal.iter().map(|x| x.round() as usize).collect();

    correct(&mut quotas, &ideal, total);
    (ideal, quotas)
}

/// Largest-remainder proportional scaling without a baseline
///
/// Zero-weight entries stay at zero unless every weight is zero, in which
/// case the split is even.
pub fn proportional_split(total: usize, weights: &[usize]) -> (Vec<f64>, Vec<usize>) {
    let n = weights.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }

    let weights: Vec<usize> = if weights.iter().all(|&w| w == 0) {
        vec![1; n]
    } else {
        weights.to_vec()
    };
    let weight_sum: usize = weights.iter().sum();

    let ideal: Vec<f64> = weights
        .iter()
        .map(|&w| total as f64 * w as f64 / weight_sum as f64)
        .collect();
    let mut quotas: Vec<usize> = weights.iter().map(|&w| total * w / weight_sum).collect();

    let mut by_remainder: Vec<usize> = (0..n).collect();
    by_remainder.sort_by(|&a, &b| {
        let ra = total * weights[a] % weight_sum;
        let rb = total * weights[b] % weight_sum;
        rb.cmp(&ra).then(a.cmp(&b))
    });

    let short = total - quotas.iter().sum::<usize>();
    for &i in by_remainder.iter().take(short) {
        quotas[i] += 1;
    }

    (ideal, quotas)
}

/// Step one card at a time until the quotas sum to `total`
///
/// Adds to the most under-allocated section (largest ideal − current) or
/// removes from the most over-allocated section with a non-zero quota. Ties
/// go to the earliest section.
fn correct(quotas: &mut [usize], ideal: &[f64], total: usize) {
    loop {
        let sum: usize = quotas.iter().sum();
        if sum == total {
            return;
        }

        if sum < total {
            let idx = most_by(quotas.len(), |i| Some(ideal[i] - quotas[i] as f64));
            match idx {
                Some(i) => quotas[i] += 1,
                None => return,
            }
        } else {
            let idx = most_by(quotas.len(), |i| {
                (quotas[i] > 0).then(|| quotas[i] as f64 - ideal[i])
            });
            match idx {
                Some(i) => quotas[i] -= 1,
                None => return,
            }
        }
    }
}

/// Index with the greatest score; ties resolve to the lowest index
fn most_by(n: usize, score: impl Fn(usize) -> Option<f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for i in 0..n {
        if let Some(s) = score(i) {
            if best.map(|(_, b)| s > b).unwrap_or(true) {
                best = Some((i, s));
            }
        }
    }
    best.map(|(i, _)| i)
}

fn apply_ceiling(
    total: usize,
    mut quotas: Vec<usize>,
    ideal: &[f64],
    weights: &[usize],
    options: &AllocatorOptions,
) -> Allocation {
    let ceiling = options.ceiling.max(1);
    let mut excess = 0usize;
    for q in quotas.iter_mut() {
        if *q > ceiling {
            excess += *q - ceiling;
            *q = ceiling;
        }
    }

    if excess > 0 && options.overflow == OverflowPolicy::Redistribute {
        let any_weighted = weights.iter().any(|&w| w > 0);
        while excess > 0 {
            let target = most_by(quotas.len(), |i| {
                let eligible = quotas[i] < ceiling && (weights[i] > 0 || !any_weighted);
                eligible.then(|| ideal[i] - quotas[i] as f64)
            });
            match target {
                Some(i) => {
                    quotas[i] += 1;
                    excess -= 1;
                }
                None => break,
            }
        }
    }

    if excess > 0 {
        warn!(
            requested = total,
            dropped = excess,
            ceiling,
            "Per-section ceiling dropped cards"
        );
    }

    Allocation {
        quotas,
        requested: total,
        dropped: excess,
    }
}

/// Suggested deck size window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedRange {
    pub lo: usize,
    pub hi: usize,
}

/// Recommended card count for a document
///
/// One card per section when a section table exists, otherwise one card per
/// 200 words; always within `[MIN_CARDS, MAX_CARDS]`.
pub fn recommend_total(section_count: usize, total_words: usize) -> usize {
    if section_count > 0 {
        clamp_total(section_count)
    } else {
        clamp_total((total_words as f64 / WORDS_PER_CARD).round() as usize)
    }
}

/// Window of ±25% around a recommendation
pub fn suggested_range(recommended: usize) -> SuggestedRange {
    let r = recommended as f64;
    SuggestedRange {
        lo: clamp_total((r * 0.75).round() as usize),
        hi: clamp_total((r * 1.25).round() as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sections_with_words(words: &[usize]) -> Vec<Section> {
        words
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let text = vec!["word"; w].join(" ");
                Section::new(format!("S{}", i), i as u32 + 1, i as u32 + 1, text)
            })
            .collect()
    }

    #[test]
    fn test_fewer_cards_than_sections() {
        let sections = sections_with_words(&[10; 10]);
        let alloc = allocate(7, &sections, &Weights::Derived, &AllocatorOptions::default());

        assert_eq!(alloc.quotas, vec![1, 1, 1, 1, 1, 1, 1, 0, 0, 0]);
        assert_eq!(alloc.total(), 7);
        assert_eq!(alloc.dropped, 0);
    }

    #[test]
    fn test_fewer_cards_than_sections_prefers_heavy_sections() {
        let (_, quotas) = baseline_split(2, &[5, 50, 5, 50]);
        assert_eq!(quotas, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_baseline_plus_proportional_remainder() {
        // 3 baseline + 9 remainder split 1:2
        let (_, quotas) = baseline_split(12, &[100, 200, 0]);
        assert_eq!(quotas.iter().sum::<usize>(), 12);
        assert!(quotas.iter().all(|&q| q >= 1));
        assert!(quotas[1] > quotas[0]);
    }

    #[test]
    fn test_correction_ties_go_to_earliest() {
        // Three equal sections, 4 cards: baseline 3, one extra to section 0
        let (_, quotas) = baseline_split(4, &[1, 1, 1]);
        assert_eq!(quotas, vec![2, 1, 1]);
    }

    #[test]
    fn test_zero_sections_empty_allocation() {
        let alloc = allocate(12, &[], &Weights::Derived, &AllocatorOptions::default());
        assert!(alloc.quotas.is_empty());
        assert_eq!(alloc.requested, 12);
    }

    #[test]
    fn test_ceiling_discards_overflow() {
        let sections = sections_with_words(&[1000, 1]);
        let alloc = allocate(20, &sections, &Weights::Derived, &AllocatorOptions::default());

        assert!(alloc.quotas.iter().all(|&q| q <= 8));
        assert_eq!(alloc.total() + alloc.dropped, 20);
        assert!(alloc.dropped > 0);
    }

    #[test]
    fn test_ceiling_redistributes_when_asked() {
        let sections = sections_with_words(&[1000, 1, 1]);
        let options = AllocatorOptions {
            ceiling: 8,
            overflow: OverflowPolicy::Redistribute,
        };
        let alloc = allocate(20, &sections, &Weights::Derived, &options);

        assert_eq!(alloc.quotas[0], 8);
        assert_eq!(alloc.total(), 20);
        assert_eq!(alloc.dropped, 0);
    }

    #[test]
    fn test_redistribute_stops_at_capacity() {
        let sections = sections_with_words(&[1000, 1]);
        let options = AllocatorOptions {
            ceiling: 8,
            overflow: OverflowPolicy::Redistribute,
        };
        let alloc = allocate(30, &sections, &Weights::Derived, &options);

        assert_eq!(alloc.quotas, vec![8, 8]);
        assert_eq!(alloc.dropped, 14);
    }

    #[test]
    fn test_plan_reproduced_exactly() {
        let sections = sections_with_words(&[5, 5, 5]);
        let weights = Weights::Planned(vec![4, 0, 2]);
        let alloc = allocate(6, &sections, &weights, &AllocatorOptions::default());
        assert_eq!(alloc.quotas, vec![4, 0, 2]);
    }

    #[test]
    fn test_plan_scaled_by_largest_remainder() {
        let (_, quotas) = proportional_split(10, &[1, 1, 1]);
        assert_eq!(quotas, vec![4, 3, 3]);

        let (_, quotas) = proportional_split(5, &[0, 0]);
        assert_eq!(quotas, vec![3, 2]);
    }

    #[test]
    fn test_recommendation() {
        assert_eq!(recommend_total(0, 0), 3);
        assert_eq!(recommend_total(0, 2_000), 10);
        assert_eq!(recommend_total(45, 0), 30);
        assert_eq!(recommend_total(7, 100_000), 7);
        assert_eq!(suggested_range(12), SuggestedRange { lo: 9, hi: 15 });
        assert_eq!(suggested_range(3), SuggestedRange { lo: 3, hi: 4 });
    }

    proptest! {
        #[test]
        fn prop_baseline_split_conserves_total(
            total in 0usize..200,
            weights in proptest::collection::vec(0usize..5_000, 1..40),
        ) {
            let (_, quotas) = baseline_split(total, &weights);
            prop_assert_eq!(quotas.len(), weights.len());
            prop_assert_eq!(quotas.iter().sum::<usize>(), total);
        }

        #[test]
        fn prop_proportional_split_conserves_total(
            total in 0usize..200,
            weights in proptest::collection::vec(0usize..50, 1..40),
        ) {
            let (_, quotas) = proportional_split(total, &weights);
            prop_assert_eq!(quotas.iter().sum::<usize>(), total);
        }

        #[test]
        fn prop_ceiling_accounts_for_every_card(
            total in MIN_CARDS..=MAX_CARDS,
            words in proptest::collection::vec(0usize..400, 1..12),
            ceiling in 1usize..10,
        ) {
            let sections = sections_with_words(&words);
            let options = AllocatorOptions { ceiling, overflow: OverflowPolicy::Discard };
            let alloc = allocate(total, &sections, &Weights::Derived, &options);

            prop_assert!(alloc.quotas.iter().all(|&q| q <= ceiling));
            prop_assert_eq!(alloc.total() + alloc.dropped, total);
        }
    }
}
