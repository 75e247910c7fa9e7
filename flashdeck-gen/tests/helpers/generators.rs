//! Scripted card generators

use async_trait::async_trait;
use flashdeck_gen::llm::{CardGenerator, GenerationError, GenerationRequest, RawCard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Script = dyn Fn(&GenerationRequest, usize) -> Result<Vec<RawCard>, GenerationError> + Send + Sync;

/// Generator driven by a closure of (request, call number)
pub struct ScriptedGenerator {
    script: Box<Script>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(
        script: impl Fn(&GenerationRequest, usize) -> Result<Vec<RawCard>, GenerationError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Delay every call made for the named section
    pub fn with_delay(mut self, section: &str, millis: u64) -> Self {
        self.delays
            .insert(section.to_string(), Duration::from_millis(millis));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<RawCard>, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = request
            .section_hint
            .as_ref()
            .and_then(|s| self.delays.get(s))
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        (self.script)(request, n)
    }
}

/// Fresh cards on every call, as many as requested
pub fn unique_cards() -> ScriptedGenerator {
    ScriptedGenerator::new(|req, n| {
        let section = req.section_hint.clone().unwrap_or_default();
        Ok((0..req.max_cards)
            .map(|i| RawCard {
                front: format!("{} question {}.{}", section, n, i),
                back: format!("answer {}.{}", n, i),
                page: req.page_hint,
                ..Default::default()
            })
            .collect())
    })
}
