//! Deck persistence

use crate::error::GenResult;
use crate::pipeline::DeckOutput;
use std::path::{Path, PathBuf};
use tracing::info;

/// Persistence collaborator for finished decks
pub trait DeckSink: Send + Sync {
    /// Store the deck; returns where it went
    fn store(&self, deck: &DeckOutput) -> GenResult<PathBuf>;
}

/// Writes `<dir>/<deck_name>.cards.json` (spaces in the name become `_`)
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, deck_name: &str) -> PathBuf {
        self.dir.join(format!("{}.cards.json", file_stem(deck_name)))
    }
}

impl DeckSink for JsonFileSink {
    fn store(&self, deck: &DeckOutput) -> GenResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path_for(&deck.deck_name);
        let json = serde_json::to_string_pretty(deck)?;
        write_atomic(&path, json.as_bytes())?;

        info!(
            path = %path.display(),
            cards = deck.cards.len(),
            "Deck written"
        );
        Ok(path)
    }
}

fn file_stem(deck_name: &str) -> String {
    let stem: String = deck_name
        .trim()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect();
    if stem.is_empty() {
        "deck".to_string()
    } else {
        stem
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Card;
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn deck(name: &str) -> DeckOutput {
        DeckOutput {
            deck_id: Uuid::new_v4(),
            deck_name: name.to_string(),
            requested: 3,
            cards: vec![Card::new("Q", "A")],
            warnings: vec!["Section \"X\": requested 2, generated 1.".to_string()],
            per_section: Vec::new(),
            duplicates_dropped: 0,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_store_writes_named_json() {
        let dir = TempDir::new().unwrap();
        let sink = JsonFileSink::new(dir.path().join("out"));

        let path = sink.store(&deck("Cell Biology")).unwrap();

        assert_eq!(path.file_name().unwrap(), "Cell_Biology.cards.json");
        let loaded: DeckOutput = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.cards.len(), 1);
        assert_eq!(loaded.deck_name, "Cell Biology");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_stem_sanitizing() {
        assert_eq!(file_stem("a/b: c"), "a-b-_c");
        assert_eq!(file_stem("   "), "deck");
    }
}
