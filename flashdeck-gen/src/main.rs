//! flashdeck-gen - study card deck generator
//!
//! `analyze` inspects a document without calling the generation API;
//! `generate` builds a deck and writes it as `<deck_name>.cards.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flashdeck_common::config::{self, TomlConfig};
use flashdeck_common::events::GenerationEvent;
use flashdeck_gen::allocation::AllocatorOptions;
use flashdeck_gen::analysis::analyze;
use flashdeck_gen::extract::{FileExtractor, PageSource};
use flashdeck_gen::llm::{OpenAiCardGenerator, OpenAiSettings};
use flashdeck_gen::models::plan::parse_plan;
use flashdeck_gen::sink::{DeckSink, JsonFileSink};
use flashdeck_gen::{DeckPipeline, DeckRequest, PipelineConfig};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for flashdeck-gen
#[derive(Parser, Debug)]
#[command(name = "flashdeck-gen")]
#[command(about = "Generate study flashcards from PDF, DOCX and TXT documents")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/flashdeck/config.toml)
    #[arg(long, global = true, env = "FLASHDECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Page/word statistics, table of contents and a recommended deck size
    Analyze {
        /// Document to inspect
        file: PathBuf,
    },

    /// Generate a deck
    Generate {
        /// Document to read
        file: PathBuf,

        /// Cards in the deck (3-30)
        #[arg(short = 'n', long)]
        cards: Option<usize>,

        /// JSON section plan: [{"title", "page_start", "page_end", "cards"}]
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Deck name (default: file name)
        #[arg(long)]
        deck_name: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Sections synthesized concurrently
        #[arg(long)]
        concurrency: Option<usize>,

        /// Generation API key (overrides environment and config file)
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Write a default config file (to --config, or the per-user location)
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Runs before loading, so a broken config file can be replaced
    if let Command::InitConfig { force } = args.command {
        let path = config::init_config(args.config.as_deref(), force)
            .context("Failed to write configuration")?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let toml_config = config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    // RUST_LOG wins; otherwise the configured level for our crates
    let default_directive = format!(
        "flashdeck_gen={level},flashdeck_common={level}",
        level = toml_config.logging.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with_target(false)
        .init();

    info!(
        "Starting flashdeck-gen v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match args.command {
        Command::Analyze { file } => run_analyze(&file, &toml_config).await,
        Command::Generate {
            file,
            cards,
            plan,
            deck_name,
            out,
            concurrency,
            api_key,
        } => {
            let mut request = DeckRequest::new(file);
            request.cards = cards;
            request.deck_name = deck_name;
            if let Some(plan_path) = plan {
                let raw = std::fs::read_to_string(&plan_path)
                    .with_context(|| format!("Failed to read plan {}", plan_path.display()))?;
                request.plan = Some(parse_plan(&raw)?);
            }
            run_generate(request, &out, concurrency, api_key.as_deref(), &toml_config).await
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

async fn run_analyze(file: &Path, toml_config: &TomlConfig) -> Result<()> {
    let settings = &toml_config.generation;
    let path = file.to_path_buf();

    let document = tokio::task::spawn_blocking(move || FileExtractor::new().extract(&path))
        .await
        .context("Extraction task failed")??;

    let options = AllocatorOptions {
        ceiling: settings.max_per_section,
        overflow: settings.overflow,
    };
    let analysis = analyze(
        &document.pages,
        document.outline(),
        settings.fallback_sections,
        &options,
    );

    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

async fn run_generate(
    request: DeckRequest,
    out: &Path,
    concurrency: Option<usize>,
    cli_key: Option<&str>,
    toml_config: &TomlConfig,
) -> Result<()> {
    let api_key = config::resolve_api_key(cli_key, toml_config)?;

    let mut pipeline_config = PipelineConfig::from(&toml_config.generation);
    if let Some(n) = concurrency {
        pipeline_config.concurrency = n.max(1);
    }

    let generator = OpenAiCardGenerator::new(OpenAiSettings::from_config(toml_config, api_key))
        .context("Failed to create generation client")?;

    let (event_tx, mut event_rx) = mpsc::channel::<GenerationEvent>(64);
    let progress = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match &event {
                GenerationEvent::SectionCompleted {
                    section_index,
                    target,
                    generated,
                    ..
                } => info!(section_index, target, generated, "Section done"),
                other => info!(event = other.kind(), "Progress"),
            }
        }
    });

    let pipeline = DeckPipeline::new(
        pipeline_config,
        Arc::new(FileExtractor::new()),
        Arc::new(generator),
    )
    .with_events(event_tx);

    let result = pipeline.run(request).await;
    // Closing the channel ends the progress task
    drop(pipeline);
    let _ = progress.await;

    let deck = result.context("Deck generation failed")?;

    for warning in &deck.warnings {
        warn!("{}", warning);
    }

    let sink = JsonFileSink::new(out);
    let path = sink.store(&deck)?;

    println!(
        "Wrote {} card(s) to {} (requested {}, {} duplicate(s) dropped)",
        deck.cards.len(),
        path.display(),
        deck.requested,
        deck.duplicates_dropped
    );
    Ok(())
}
