//! Data model shared by every pipeline stage

pub mod card;
pub mod page;
pub mod plan;
pub mod section;

pub use card::{card_key, Card, ContextTag};
pub use page::{ExtractedDocument, OutlineEntry, Page};
pub use plan::SectionPlan;
pub use section::{Fact, FactKind, Section};
