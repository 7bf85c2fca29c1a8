//! Command-line interface for eduforge.
//!
//! Provides commands for ingesting content versions, reading content and its
//! artifacts cache-first, converting lessons to braille directly, and running
//! queue workers.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;

use crate::braille::ConvertOptions;
use crate::config;
use crate::core::{ContentReader, Store, StoreError, LATEST_VERSION};
use crate::domain::{BrailleFormat, BrailleScope};

pub mod jobs;

/// eduforge - Idempotent artifact pipeline for educational content
#[derive(Parser, Debug)]
#[command(name = "eduforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a new version of a content payload (JSON)
    Ingest {
        /// Content key, e.g. "chapter:12"
        content_key: String,

        /// Locale the payload is written in
        #[arg(short, long, default_value = "en")]
        locale: String,

        /// Payload file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Read content in a locale, queueing a translation if needed
    Content {
        content_key: String,

        #[arg(short, long, default_value = "en")]
        locale: String,

        /// Version number (0 = latest)
        #[arg(long, default_value_t = LATEST_VERSION)]
        version: i64,
    },

    /// Read the story deck, queueing whatever is missing
    Story {
        content_key: String,

        #[arg(short, long, default_value = "en")]
        locale: String,

        /// Version number (0 = latest)
        #[arg(long, default_value_t = LATEST_VERSION)]
        version: i64,
    },

    /// Read a braille export, queueing it if needed
    Braille {
        content_key: String,

        #[arg(short, long, default_value = "en")]
        locale: String,

        /// Version number (0 = latest)
        #[arg(long, default_value_t = LATEST_VERSION)]
        version: i64,

        /// "full" or a top-level payload field
        #[arg(short, long, default_value = "full")]
        scope: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: FormatArg,

        /// Print only the braille text when it is ready
        #[arg(long)]
        raw: bool,
    },

    /// Convert a lesson to braille synchronously (prints JSON)
    Convert {
        /// Lesson file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Normalize line endings, spacing and math glyphs first
        #[arg(long)]
        normalize: bool,

        /// Print only the BRF rendering
        #[arg(long)]
        brf: bool,
    },

    /// Run a queue worker
    Worker {
        /// Run at most one job and exit
        #[arg(long)]
        once: bool,

        /// Only claim jobs of this type (e.g. build_braille_export)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Show queue status or a single job
    Jobs {
        /// Job ID (UUID) to show
        #[arg(long)]
        id: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Export format for CLI (maps to BrailleFormat)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Unwrapped braille
    Text,

    /// Paginated braille-ready file
    Brf,
}

impl From<FormatArg> for BrailleFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Text => BrailleFormat::Text,
            FormatArg::Brf => BrailleFormat::Brf,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Ingest {
                content_key,
                locale,
                input,
            } => ingest(&content_key, &locale, input),
            Commands::Content {
                content_key,
                locale,
                version,
            } => {
                let reader = open_reader()?;
                print_read(reader.read_content(&content_key, &locale, version))
            }
            Commands::Story {
                content_key,
                locale,
                version,
            } => {
                let reader = open_reader()?;
                print_read(reader.read_story(&content_key, &locale, version))
            }
            Commands::Braille {
                content_key,
                locale,
                version,
                scope,
                format,
                raw,
            } => read_braille(&content_key, &locale, version, &scope, format.into(), raw),
            Commands::Convert {
                input,
                normalize,
                brf,
            } => convert(input, normalize, brf).await,
            Commands::Worker { once, kind } => jobs::run_worker(once, kind).await,
            Commands::Jobs { id } => jobs::show_jobs(id),
            Commands::Config => show_config(),
        }
    }
}

/// Open the configured database
pub(crate) fn open_store() -> Result<Arc<Store>> {
    let path = config::database_path()?;
    let store = Store::open(&path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    Ok(Arc::new(store))
}

fn open_reader() -> Result<ContentReader> {
    Ok(ContentReader::new(open_store()?))
}

/// Read from a file, or from stdin when it is piped
fn read_input(input_file: Option<PathBuf>) -> Result<String> {
    let input = if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No input provided. Use --input <file> or pipe to stdin");
    };

    if input.trim().is_empty() {
        anyhow::bail!("Input is empty");
    }
    Ok(input)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render JSON")?
    );
    Ok(())
}

/// Print a read response; unknown content exits with status 2
fn print_read<T: Serialize>(result: Result<T, StoreError>) -> Result<()> {
    match result {
        Ok(response) => print_json(&response),
        Err(e) if e.is_not_found() => {
            eprintln!("Not found: {}", e);
            std::process::exit(2);
        }
        Err(e) => Err(e).context("Read failed"),
    }
}

/// Store a new content version
fn ingest(content_key: &str, locale: &str, input: Option<PathBuf>) -> Result<()> {
    let raw = read_input(input)?;
    let payload: Value = serde_json::from_str(&raw).context("Payload is not valid JSON")?;
    if !payload.is_object() {
        anyhow::bail!("Payload must be a JSON object");
    }

    let store = open_store()?;
    let content = store
        .insert_version(content_key, locale, &payload)
        .with_context(|| format!("Failed to store version of {}", content_key))?;

    println!("Stored {} v{}", content.content_key, content.version);
    println!("  Locale: {}", content.canonical_locale);
    println!("  Hash:   {}", content.payload_hash);
    Ok(())
}

fn read_braille(
    content_key: &str,
    locale: &str,
    version: i64,
    scope: &str,
    format: BrailleFormat,
    raw: bool,
) -> Result<()> {
    let scope: BrailleScope = scope.parse()?;
    let reader = open_reader()?;
    let result = reader.read_braille(content_key, locale, version, &scope, format);

    if raw {
        if let Ok(response) = &result {
            match &response.braille_text {
                Some(text) => print!("{}", text),
                None => eprintln!("[Braille export queued; run a worker and retry]"),
            }
            return Ok(());
        }
    }
    print_read(result)
}

/// Convert a lesson without touching the queue
async fn convert(input: Option<PathBuf>, normalize: bool, brf_only: bool) -> Result<()> {
    let lesson = read_input(input)?;
    let settings = &config::config()?.braille;
    let engine = settings.engine();
    let options = ConvertOptions {
        normalize,
        layout: settings.layout,
    };

    let result = tokio::task::spawn_blocking(move || engine.convert(&lesson, &options))
        .await
        .context("Braille conversion task panicked")?;

    if brf_only && result.success {
        print!("{}", result.brf);
        return Ok(());
    }
    print_json(&result)?;
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn display_or_none(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none - using defaults)".to_string())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("eduforge Configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("Config file: {}", display_or_none(cfg.config_file.as_deref()));
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Database:  {}", cfg.database.display());
    println!("  Assets:    {}", cfg.assets_dir.display());
    println!("  Asset URL: {}", cfg.public_base_url);
    println!();
    println!("Worker:");
    println!("  Poll interval: {}ms", cfg.worker.poll_interval.as_millis());
    println!("  Lease:         {}s", cfg.worker.lease.as_secs());
    println!();
    println!("Braille:");
    println!("  Backend:  {:?}", cfg.braille.backend);
    println!("  liblouis: {}", cfg.braille.louis_binary);
    println!(
        "  Tables:   {} / {}",
        cfg.braille.literary_table, cfg.braille.math_table
    );
    println!(
        "  Page:     {} cells x {} lines",
        cfg.braille.layout.cells_per_line, cfg.braille.layout.lines_per_page
    );
    println!();
    println!("Generation:");
    println!("  Base URL: {}", cfg.generation.base_url);
    println!(
        "  Models:   {} / {} / {}",
        cfg.generation.chat_model, cfg.generation.image_model, cfg.generation.speech_model
    );
    println!("  Voice:    {}", cfg.generation.voice);
    println!(
        "  API key:  {}",
        if cfg.generation.api_key.is_some() {
            "set"
        } else {
            "(not set)"
        }
    );

    Ok(())
}
