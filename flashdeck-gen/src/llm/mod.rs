//! Card generation collaborator
//!
//! The synthesizer only sees [`CardGenerator`]; the OpenAI-compatible HTTP
//! client is one implementation, test doubles are another.

pub mod openai_client;

pub use openai_client::{OpenAiCardGenerator, OpenAiSettings};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    /// Seed text the cards must be drawn from
    pub chunk_text: String,
    pub page_hint: Option<u32>,
    pub section_hint: Option<String>,
    /// Upper bound on cards returned
    pub max_cards: usize,
}

/// Card as returned by the generator, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCard {
    #[serde(default, alias = "question", alias = "q")]
    pub front: String,
    #[serde(default, alias = "answer", alias = "a")]
    pub back: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub distractors: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

impl RawCard {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
            ..Default::default()
        }
    }
}

/// Per-call failure, absorbed by the synthesizer
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("API key rejected")]
    Auth,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// External card generation call
///
/// Shape problems in an otherwise successful response yield `Ok(vec![])`;
/// only transport, authentication and API failures are errors.
#[async_trait]
pub trait CardGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<RawCard>, GenerationError>;
}
