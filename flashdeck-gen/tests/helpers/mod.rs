//! Test Helper Utilities
//!
//! Shared utilities for testing flashdeck-gen

#![allow(dead_code)]

pub mod documents;
pub mod generators;

// Re-export commonly used items
pub use documents::{filler_pages, outlined_document, StaticSource};
pub use generators::{unique_cards, ScriptedGenerator};

use flashdeck_gen::PipelineConfig;
use std::time::Duration;

/// Pipeline configuration suited to fast tests
pub fn test_config(concurrency: usize) -> PipelineConfig {
    PipelineConfig {
        concurrency,
        call_timeout: Duration::from_secs(5),
        ..PipelineConfig::default()
    }
}
