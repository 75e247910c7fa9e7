//! OpenAI-compatible chat-completions client
//!
//! Sends one seed chunk per request and reads back a `{"cards": [...]}` JSON
//! object. Requests from all synthesis workers share one rate limiter.

use super::{CardGenerator, GenerationError, GenerationRequest, RawCard};
use crate::error::{GenError, GenResult};
use async_trait::async_trait;
use flashdeck_common::config::TomlConfig;
use flashdeck_common::text::truncate_chars;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const USER_AGENT: &str = concat!("flashdeck/", env!("CARGO_PKG_VERSION"));
const TEMPERATURE: f64 = 0.2;
/// Longest chunk sent in a single request
const MAX_PROMPT_CHARS: usize = 24_000;

const SYSTEM_PROMPT: &str = "You are an expert flash-card author. \
Create question/answer cards that help a student remember the substantive facts, \
definitions, formulas, dates or numbers in the provided text. \
Each card must be self-contained: never refer to \"page X\", \"see above\" or \"the text\". \
Answers must be concrete and complete. Skip a card if its answer would be vague or redundant. \
For every card give two plausible but wrong answers as distractors, a short verbatim excerpt \
from the text that supports the answer, and a context tag: one of \
definition, formula, example, concept, general. \
Respond with JSON only, in the form \
{\"cards\": [{\"front\": \"...\", \"back\": \"...\", \"distractors\": [\"...\", \"...\"], \
\"excerpt\": \"...\", \"context\": \"definition\", \"page\": 1}]}.";

/// Connection settings for the chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub min_request_interval: Duration,
    /// Transport-level timeout; the synthesizer imposes its own per-call timeout
    pub request_timeout: Duration,
}

impl OpenAiSettings {
    pub fn from_config(config: &TomlConfig, api_key: String) -> Self {
        let generation = &config.generation;
        Self {
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            min_request_interval: Duration::from_millis(generation.min_request_interval_ms),
            // Slightly above the per-call timeout so that one fires first
            request_timeout: Duration::from_secs(generation.call_timeout_secs + 5),
        }
    }
}

/// Minimum spacing between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Generation rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Card generator backed by an OpenAI-compatible API
pub struct OpenAiCardGenerator {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    settings: OpenAiSettings,
}

impl OpenAiCardGenerator {
    pub fn new(settings: OpenAiSettings) -> GenResult<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(GenError::Config("generation API key is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| GenError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(settings.min_request_interval)),
            settings,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }
}

#[async_trait]
impl CardGenerator for OpenAiCardGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<RawCard>, GenerationError> {
        self.rate_limiter.wait().await;

        let body = json!({
            "model": self.settings.model,
            "temperature": TEMPERATURE,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(request)},
            ],
        });

        tracing::debug!(
            model = %self.settings.model,
            max_cards = request.max_cards,
            page_hint = ?request.page_hint,
            "Requesting cards"
        );

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(GenerationError::Auth);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: truncate_chars(&error_text, 300).to_string(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let chat: ChatResponse =
            serde_json::from_str(&text).map_err(|e| GenerationError::Malformed(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let cards = parse_card_payload(&content, request.max_cards);
        tracing::debug!(cards = cards.len(), "Generation call returned");
        Ok(cards)
    }
}

/// User message: hints, the card limit, and the (bounded) seed text
fn user_prompt(request: &GenerationRequest) -> String {
    let mut prompt = String::new();
    if let Some(section) = &request.section_hint {
        prompt.push_str(&format!("Section: {}\n", section));
    }
    if let Some(page) = request.page_hint {
        prompt.push_str(&format!("Page: {}\n", page));
    }
    prompt.push_str(&format!(
        "Write at most {} cards.\n\nTEXT:\n{}",
        request.max_cards.max(1),
        truncate_chars(&request.chunk_text, MAX_PROMPT_CHARS)
    ));
    prompt
}

/// Read cards out of the model's message content
///
/// Falls back to the span between the first `{` and the last `}` when the
/// content is wrapped in prose or code fences. Items that do not look like
/// cards are skipped; anything unreadable yields no cards.
pub fn parse_card_payload(content: &str, max_cards: usize) -> Vec<RawCard> {
    let value = match serde_json::from_str::<Value>(content.trim()) {
        Ok(v) => Some(v),
        Err(_) => salvage_object(content),
    };

    let items = match value {
        Some(Value::Object(mut map)) => match map.remove("cards") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawCard>(item).ok())
        .take(max_cards)
        .collect()
}

fn salvage_object(content: &str) -> Option<Value> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(key: &str) -> OpenAiSettings {
        OpenAiSettings {
            api_key: key.to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "http://localhost:9".to_string(),
            min_request_interval: Duration::from_millis(200),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = OpenAiCardGenerator::new(settings("sk-test")).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9/chat/completions");
        assert!(matches!(OpenAiCardGenerator::new(settings("  ")), Err(GenError::Config(_))));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = TomlConfig::default();
        config.base_url = "https://example.invalid/v1/".to_string();
        let s = OpenAiSettings::from_config(&config, "k".to_string());
        assert_eq!(s.base_url, "https://example.invalid/v1");
        assert_eq!(s.min_request_interval, Duration::from_millis(200));
        assert_eq!(s.request_timeout, Duration::from_secs(65));
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(100));
        let start = Instant::now();

        for _ in 0..3 {
            limiter.wait().await;
        }

        assert!(start.elapsed() >= Duration::from_millis(190));
    }

    #[test]
    fn test_parse_cards_object() {
        let content = r#"{"cards": [
            {"front": "What is osmosis?", "back": "Diffusion of water", "distractors": ["Active transport", "Endocytosis"], "context": "definition", "page": 3},
            {"question": "2+2?", "answer": "4"}
        ]}"#;
        let cards = parse_card_payload(content, 5);

        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].distractors.len(), 2);
        assert_eq!(cards[0].page, Some(3));
        assert_eq!(cards[1].front, "2+2?");
        assert_eq!(cards[1].back, "4");
    }

    #[test]
    fn test_parse_salvages_wrapped_json() {
        let content = "Sure! Here you go:\n```json\n{\"cards\": [{\"front\": \"A\", \"back\": \"B\"}]}\n```";
        let cards = parse_card_payload(content, 5);
        assert_eq!(cards, vec![RawCard::new("A", "B")]);
    }

    #[test]
    fn test_parse_caps_and_skips_bad_items() {
        let content = r#"{"cards": [
            {"front": "1", "back": "a"},
            "not a card",
            {"front": "2", "back": "b", "page": "seven"},
            {"front": "3", "back": "c"},
            {"front": "4", "back": "d"}
        ]}"#;
        let cards = parse_card_payload(content, 2);
        let fronts: Vec<&str> = cards.iter().map(|c| c.front.as_str()).collect();
        assert_eq!(fronts, vec!["1", "3"]);
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert!(parse_card_payload("no json here", 3).is_empty());
        assert!(parse_card_payload("{\"other\": 1}", 3).is_empty());
        assert!(parse_card_payload("", 3).is_empty());
    }

    #[test]
    fn test_user_prompt_carries_hints() {
        let prompt = user_prompt(&GenerationRequest {
            chunk_text: "Cells are small.".to_string(),
            page_hint: Some(4),
            section_hint: Some("Biology".to_string()),
            max_cards: 3,
        });
        assert!(prompt.contains("Section: Biology"));
        assert!(prompt.contains("Page: 4"));
        assert!(prompt.contains("at most 3 cards"));
        assert!(prompt.ends_with("Cells are small."));
    }
}
