//! flashdeck-gen library interface
//!
//! Turns a PDF, DOCX or TXT document into an ordered deck of study cards:
//! pages are extracted, partitioned into sections, each section gets a card
//! quota, sections are synthesized in parallel through a [`llm::CardGenerator`],
//! and the results are deduplicated and reassembled in document order.

pub mod allocation;
pub mod analysis;
pub mod assembly;
pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod sections;
pub mod sink;
pub mod synthesis;

pub use crate::error::{GenError, GenResult};
pub use crate::pipeline::{DeckOutput, DeckPipeline, DeckRequest, PipelineConfig, SectionReport};
