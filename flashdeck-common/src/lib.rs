//! # flashdeck Common Library
//!
//! Shared code for the flashdeck crates including:
//! - Error type and result alias
//! - TOML configuration model and tiered resolution
//! - Progress event types (GenerationEvent enum)
//! - Text normalisation helpers (word counting, fingerprint normalisation)

pub mod config;
pub mod error;
pub mod events;
pub mod text;

pub use error::{Error, Result};
pub use events::GenerationEvent;
