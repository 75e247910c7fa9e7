use crate::error::{GenError, GenResult};
use serde::{Deserialize, Serialize};

/// One entry of a caller-supplied per-section card budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPlan {
    #[serde(default)]
    pub title: String,
    #[serde(default = "first_page")]
    pub page_start: u32,
    /// Defaults to `page_start` when omitted
    #[serde(default)]
    pub page_end: Option<u32>,
    #[serde(default)]
    pub cards: usize,
}

fn first_page() -> u32 {
    1
}

impl SectionPlan {
    pub fn new(title: impl Into<String>, page_start: u32, page_end: u32, cards: usize) -> Self {
        Self {
            title: title.into(),
            page_start,
            page_end: Some(page_end),
            cards,
        }
    }

    pub fn end(&self) -> u32 {
        self.page_end.unwrap_or(self.page_start).max(self.page_start)
    }
}

/// Parse a JSON plan (`[{"title": .., "page_start": .., "page_end": .., "cards": ..}]`)
///
/// Entries without a title are dropped; an empty result is an error.
pub fn parse_plan(raw: &str) -> GenResult<Vec<SectionPlan>> {
    let entries: Vec<SectionPlan> =
        serde_json::from_str(raw).map_err(|e| GenError::InvalidPlan(e.to_string()))?;

    let plan: Vec<SectionPlan> = entries
        .into_iter()
        .map(|mut p| {
            p.title = p.title.trim().to_string();
            p.page_start = p.page_start.max(1);
            p
        })
        .filter(|p| !p.title.is_empty())
        .collect();

    if plan.is_empty() {
        return Err(GenError::InvalidPlan("plan has no titled sections".to_string()));
    }
    Ok(plan)
}
