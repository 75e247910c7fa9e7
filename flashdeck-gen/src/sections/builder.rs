use super::facts::extract_facts;
use super::headings::detect_headings;
use super::{range_text, PageIndex};
use crate::models::{OutlineEntry, Page, Section, SectionPlan};
use tracing::{debug, info};

/// Where a section table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionSource {
    Outline,
    Headings,
    EvenPartition,
    Plan,
}

impl SectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionSource::Outline => "outline",
            SectionSource::Headings => "headings",
            SectionSource::EvenPartition => "even_partition",
            SectionSource::Plan => "plan",
        }
    }
}

/// Titled inclusive page range before text and facts are attached
#[derive(Debug, Clone, PartialEq, Eq)]
struct Range {
    title: String,
    start: u32,
    end: u32,
}

/// Build sections covering every page exactly once
pub fn build_sections(
    pages: &[Page],
    outline: Option<&[OutlineEntry]>,
    fallback_sections: usize,
) -> Vec<Section> {
    build_sections_with_source(pages, outline, fallback_sections).0
}

/// Same as [`build_sections`], also reporting which strategy produced them
pub fn build_sections_with_source(
    pages: &[Page],
    outline: Option<&[OutlineEntry]>,
    fallback_sections: usize,
) -> (Vec<Section>, SectionSource) {
    let page_count = pages.len() as u32;
    if page_count == 0 {
        return (Vec::new(), SectionSource::EvenPartition);
    }

    let (ranges, source) = match outline.map(|o| outline_ranges(o, page_count)) {
        Some(ranges) if !ranges.is_empty() => (ranges, SectionSource::Outline),
        _ => {
            let ranges = heading_ranges(pages, page_count);
            if ranges.is_empty() {
                (
                    partition_ranges(page_count, fallback_sections),
                    SectionSource::EvenPartition,
                )
            } else {
                (ranges, SectionSource::Headings)
            }
        }
    };

    let sections = materialize(pages, ranges);
    info!(
        sections = sections.len(),
        source = source.as_str(),
        pages = page_count,
        "Built sections"
    );

    (sections, source)
}

/// Split the pages into `clamp(n, 1, P)` near-equal sections titled `Pages a–b`
pub fn even_partition(pages: &[Page], n: usize) -> Vec<Section> {
    if pages.is_empty() {
        return Vec::new();
    }
    materialize(pages, partition_ranges(pages.len() as u32, n))
}

/// Turn a caller plan into sections, paired with each entry's card count
///
/// Untitled entries are dropped, ranges are clipped to `[1, P]` and the result
/// is ordered by start page (ties keep plan order).
pub fn sections_from_plan(pages: &[Page], plan: &[SectionPlan]) -> Vec<(Section, usize)> {
    let page_count = pages.len() as u32;
    if page_count == 0 {
        return Vec::new();
    }

    let mut entries: Vec<(Range, usize)> = plan
        .iter()
        .filter(|p| !p.title.trim().is_empty())
        .map(|p| {
            let start = p.page_start.clamp(1, page_count);
            let end = p.end().clamp(start, page_count);
            (
                Range {
                    title: p.title.trim().to_string(),
                    start,
                    end,
                },
                p.cards,
            )
        })
        .collect();
    entries.sort_by_key(|(range, _)| range.start);

    let counts: Vec<usize> = entries.iter().map(|(_, cards)| *cards).collect();
    let ranges: Vec<Range> = entries.into_iter().map(|(range, _)| range).collect();

    materialize(pages, ranges).into_iter().zip(counts).collect()
}

fn outline_ranges(outline: &[OutlineEntry], page_count: u32) -> Vec<Range> {
    let mut entries: Vec<&OutlineEntry> = outline
        .iter()
        .filter(|e| e.page >= 1 && e.page <= page_count && !e.title.trim().is_empty())
        .collect();
    // Stable: entries sharing a page stay in outline order
    entries.sort_by_key(|e| e.page);
    entries.dedup_by_key(|e| e.page);

    let mut ranges: Vec<Range> = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let start = if i == 0 { 1 } else { entry.page };
        let end = entries
            .get(i + 1)
            .map(|next| next.page - 1)
            .unwrap_or(page_count)
            .max(start);
        ranges.push(Range {
            title: entry.title.trim().to_string(),
            start,
            end,
        });
    }

    ranges
}

fn heading_ranges(pages: &[Page], page_count: u32) -> Vec<Range> {
    let headings = detect_headings(&PageIndex::new(pages));
    debug!(headings = headings.len(), "Detected headings");

    headings
        .iter()
        .enumerate()
        .map(|(i, heading)| {
            let start = if i == 0 { 1 } else { heading.page };
            let end = headings
                .get(i + 1)
                .map(|next| next.page - 1)
                .unwrap_or(page_count)
                .max(start);
            Range {
                title: heading.title.clone(),
                start,
                end,
            }
        })
        .collect()
}

fn partition_ranges(page_count: u32, n: usize) -> Vec<Range> {
    let p = page_count as usize;
    let n = n.clamp(1, p.max(1));

    (0..n)
        .map(|i| {
            let start = (i * p / n) as u32 + 1;
            let end = ((i + 1) * p / n) as u32;
            Range {
                title: format!("Pages {}–{}", start, end),
                start,
                end,
            }
        })
        .collect()
}

/// Attach text and facts; fact ordinals run across the whole document
fn materialize(pages: &[Page], ranges: Vec<Range>) -> Vec<Section> {
    let mut next_ordinal = 0usize;

    ranges
        .into_iter()
        .map(|range| {
            let in_range: Vec<&Page> = pages
                .iter()
                .filter(|p| p.number >= range.start && p.number <= range.end)
                .collect();

            let mut section = Section::new(
                range.title,
                range.start,
                range.end,
                range_text(pages, range.start, range.end),
            );
            section.items = extract_facts(&in_range, &section.title, &mut next_ordinal);
            section
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_pages(n: u32) -> Vec<Page> {
        (1..=n).map(|i| Page::new(format!("plain text on page {}", i), i)).collect()
    }

    /// Sections cover 1..=P with no gaps or overlaps
    fn assert_partition(sections: &[Section], page_count: u32) {
        assert!(!sections.is_empty());
        assert_eq!(sections[0].page_start, 1);
        assert_eq!(sections.last().unwrap().page_end, page_count);
        for pair in sections.windows(2) {
            assert_eq!(pair[1].page_start, pair[0].page_end + 1);
        }
        for s in sections {
            assert!(s.page_end >= s.page_start);
        }
    }

    #[test]
    fn test_outline_sections() {
        let pages = blank_pages(10);
        let outline = vec![
            OutlineEntry::new("Cells", 3, 1),
            OutlineEntry::new("Energy", 7, 1),
            OutlineEntry::new("Energy (dup)", 7, 2),
            OutlineEntry::new("Out of range", 42, 1),
        ];

        let (sections, source) = build_sections_with_source(&pages, Some(&outline), 6);

        assert_eq!(source, SectionSource::Outline);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Cells");
        assert_eq!((sections[0].page_start, sections[0].page_end), (1, 6));
        assert_eq!(sections[1].title, "Energy");
        assert_eq!((sections[1].page_start, sections[1].page_end), (7, 10));
        assert_partition(&sections, 10);
    }

    #[test]
    fn test_unusable_outline_falls_back() {
        let pages = blank_pages(4);
        let outline = vec![OutlineEntry::new("Nowhere", 99, 1)];

        let (sections, source) = build_sections_with_source(&pages, Some(&outline), 2);

        assert_eq!(source, SectionSource::EvenPartition);
        assert_eq!(sections.len(), 2);
        assert_partition(&sections, 4);
    }

    #[test]
    fn test_heading_sections() {
        let pages = vec![
            Page::new("front matter prose", 1),
            Page::new("1 Introduction\nbody text here", 2),
            Page::new("continued body", 3),
            Page::new("2 Methods\n- Titration: measuring concentration", 4),
        ];

        let (sections, source) = build_sections_with_source(&pages, None, 6);

        assert_eq!(source, SectionSource::Headings);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "1 Introduction");
        assert_eq!((sections[0].page_start, sections[0].page_end), (1, 3));
        assert!(sections[0].text.starts_with("front matter prose"));
        assert_eq!((sections[1].page_start, sections[1].page_end), (4, 4));
        assert_eq!(sections[1].items.len(), 1);
        assert_eq!(sections[1].items[0].ordinal, 1);
        assert_partition(&sections, 4);
    }

    #[test]
    fn test_even_partition_titles_and_bounds() {
        let pages = blank_pages(10);
        let sections = even_partition(&pages, 3);

        let bounds: Vec<(u32, u32)> = sections.iter().map(|s| (s.page_start, s.page_end)).collect();
        assert_eq!(bounds, vec![(1, 3), (4, 6), (7, 10)]);
        assert_eq!(sections[0].title, "Pages 1–3");
        assert_partition(&sections, 10);
    }

    #[test]
    fn test_even_partition_clamps_count() {
        let pages = blank_pages(2);
        assert_eq!(even_partition(&pages, 6).len(), 2);
        assert_eq!(even_partition(&pages, 0).len(), 1);
        assert!(even_partition(&[], 3).is_empty());
    }

    #[test]
    fn test_zero_pages_zero_sections() {
        let (sections, _) = build_sections_with_source(&[], None, 6);
        assert!(sections.is_empty());
    }

    #[test]
    fn test_partition_invariant_across_page_counts() {
        for page_count in 1..=25u32 {
            for n in 1..=8usize {
                let pages = blank_pages(page_count);
                assert_partition(&even_partition(&pages, n), page_count);
            }
        }
    }

    #[test]
    fn test_sections_from_plan() {
        let pages = blank_pages(5);
        let plan = vec![
            SectionPlan::new("Late", 4, 9, 2),
            SectionPlan::new("", 1, 1, 7),
            SectionPlan::new("Early", 1, 3, 5),
        ];

        let planned = sections_from_plan(&pages, &plan);

        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].0.title, "Early");
        assert_eq!(planned[0].1, 5);
        assert_eq!(planned[1].0.title, "Late");
        assert_eq!(planned[1].0.page_end, 5);
        assert_eq!(planned[1].1, 2);
    }
}
