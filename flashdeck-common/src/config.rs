//! Configuration loading and tiered resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "FLASHDECK_CONFIG";

/// Environment variables checked for the generation API key, in order
pub const API_KEY_ENVS: [&str; 2] = ["FLASHDECK_API_KEY", "OPENAI_API_KEY"];

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// API key for the chat-completions endpoint (optional, ENV usually wins)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name sent with every generation request
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Card generation tuning
    #[serde(default)]
    pub generation: GenerationSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// What happens to cards that exceed the per-section ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Excess cards are dropped and reported
    #[default]
    Discard,
    /// Excess cards move to sections still under the ceiling
    Redistribute,
}

/// Card generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Maximum number of sections synthesized concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout for a single generation call, in seconds
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Cards requested per generation call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-section card ceiling
    #[serde(default = "default_max_per_section")]
    pub max_per_section: usize,

    /// Handling of cards above the per-section ceiling
    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// Section count for the even page partition when no headings are found
    #[serde(default = "default_fallback_sections")]
    pub fallback_sections: usize,

    /// Card total used when the caller does not ask for one
    #[serde(default = "default_cards")]
    pub default_cards: usize,

    /// Minimum spacing between outgoing API requests, in milliseconds
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_call_timeout_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    3
}

fn default_max_per_section() -> usize {
    8
}

fn default_fallback_sections() -> usize {
    6
}

fn default_cards() -> usize {
    12
}

fn default_min_request_interval_ms() -> u64 {
    200
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            call_timeout_secs: default_call_timeout_secs(),
            batch_size: default_batch_size(),
            max_per_section: default_max_per_section(),
            overflow: OverflowPolicy::default(),
            fallback_sections: default_fallback_sections(),
            default_cards: default_cards(),
            min_request_interval_ms: default_min_request_interval_ms(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            logging: LoggingConfig::default(),
            generation: GenerationSettings::default(),
        }
    }
}

/// Get the per-user config file path for the platform
///
/// `~/.config/flashdeck/config.toml` on Linux, the platform equivalent elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("flashdeck").join("config.toml"))
}

/// Resolve which config file to read
///
/// Command-line path first, then `FLASHDECK_CONFIG`, then the per-user default.
/// Returns `None` when no candidate exists on disk.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Load a TOML config file
///
/// A missing file is a configuration error; callers that treat the file as
/// optional should go through [`load_or_default`].
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    validate(&config)?;
    Ok(config)
}

/// Load the resolved config file, or built-in defaults if there is none
pub fn load_or_default(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = load_toml_config(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => {
            info!("No configuration file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write config to disk atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Write a default config file and return its path
///
/// Uses `path` when given, otherwise the per-user default. An existing file
/// is only replaced when `force` is set.
pub fn init_config(path: Option<&Path>, force: bool) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()
            .ok_or_else(|| Error::Config("No per-user config directory on this platform".to_string()))?,
    };

    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (pass --force to overwrite)",
            path.display()
        )));
    }

    write_toml_config(&TomlConfig::default(), &path)?;
    info!("Wrote default configuration to {}", path.display());
    Ok(path)
}

fn validate(config: &TomlConfig) -> Result<()> {
    let g = &config.generation;
    if g.concurrency == 0 {
        return Err(Error::Config("generation.concurrency must be at least 1".to_string()));
    }
    if g.batch_size == 0 {
        return Err(Error::Config("generation.batch_size must be at least 1".to_string()));
    }
    if g.max_per_section == 0 {
        return Err(Error::Config("generation.max_per_section must be at least 1".to_string()));
    }
    if g.call_timeout_secs == 0 {
        return Err(Error::Config("generation.call_timeout_secs must be at least 1".to_string()));
    }
    Ok(())
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the generation API key from 3-tier configuration
///
/// **Priority:** command line → environment → TOML
pub fn resolve_api_key(cli_key: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    let mut sources = Vec::new();

    let cli_key = cli_key.filter(|k| is_valid_key(k));
    if cli_key.is_some() {
        sources.push("command line");
    }

    let env_key = API_KEY_ENVS
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|k| is_valid_key(k)));
    if env_key.is_some() {
        sources.push("environment");
    }

    let toml_key = toml_config.api_key.as_deref().filter(|k| is_valid_key(k));
    if toml_key.is_some() {
        sources.push("TOML");
    }

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = cli_key {
        info!("API key taken from command line");
        return Ok(key.to_string());
    }

    if let Some(key) = env_key {
        info!("API key loaded from environment variable");
        return Ok(key);
    }

    if let Some(key) = toml_key {
        info!("API key loaded from TOML config");
        return Ok(key.to_string());
    }

    Err(Error::Config(
        "API key not configured. Please configure using one of:\n\
         1. Command line: --api-key your-key\n\
         2. Environment: FLASHDECK_API_KEY=your-key (or OPENAI_API_KEY)\n\
         3. TOML config: ~/.config/flashdeck/config.toml (api_key = \"your-key\")"
            .to_string(),
    ))
}
