//! Configuration for eduforge.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (EDUFORGE_HOME, EDUFORGE_DB, EDUFORGE_API_KEY)
//! 2. Config file (.eduforge/config.yaml)
//! 3. Defaults (~/.eduforge)
//!
//! Config file discovery:
//! - Searches current directory and parents for .eduforge/config.yaml
//! - Paths in config file are relative to the .eduforge/ directory

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::braille::{BrailleEngine, BrfLayout, LouisTranslator, TableTranslator, TranslateError};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub braille: BrailleConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .eduforge/)
    pub home: Option<String>,
    /// SQLite database file
    pub database: Option<String>,
    /// Directory for generated images and audio
    pub assets: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerConfig {
    pub poll_interval_ms: Option<u64>,
    pub lease_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrailleBackend {
    /// Built-in uncontracted tables
    #[default]
    Builtin,
    /// liblouis `lou_translate`
    Liblouis,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrailleConfig {
    pub backend: Option<BrailleBackend>,
    pub louis_binary: Option<String>,
    pub literary_table: Option<String>,
    pub math_table: Option<String>,
    pub cells_per_line: Option<usize>,
    pub lines_per_page: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationConfig {
    pub base_url: Option<String>,
    pub chat_model: Option<String>,
    pub image_model: Option<String>,
    pub speech_model: Option<String>,
    pub voice: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetsConfig {
    pub public_base_url: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to eduforge home
    pub home: PathBuf,
    /// SQLite database path
    pub database: PathBuf,
    /// Asset directory for generated media
    pub assets_dir: PathBuf,
    /// Prefix for asset URLs handed to readers
    pub public_base_url: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub worker: WorkerSettings,
    pub braille: BrailleSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub lease: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            lease: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrailleSettings {
    pub backend: BrailleBackend,
    pub louis_binary: String,
    pub literary_table: String,
    pub math_table: String,
    pub layout: BrfLayout,
}

impl Default for BrailleSettings {
    fn default() -> Self {
        Self {
            backend: BrailleBackend::Builtin,
            louis_binary: "lou_translate".to_string(),
            literary_table: "en-ueb-g2.ctb".to_string(),
            math_table: "nemeth.ctb".to_string(),
            layout: BrfLayout::default(),
        }
    }
}

impl BrailleSettings {
    /// Engine over the configured backend
    pub fn engine(&self) -> BrailleEngine {
        match self.backend {
            BrailleBackend::Builtin => BrailleEngine::new(Arc::new(TableTranslator::new())),
            BrailleBackend::Liblouis => BrailleEngine::new(Arc::new(LouisTranslator::new(
                &self.louis_binary,
                &self.literary_table,
                &self.math_table,
            ))),
        }
    }

    /// Fail early when the configured backend cannot run
    pub fn check_backend(&self) -> Result<(), TranslateError> {
        match self.backend {
            BrailleBackend::Builtin => Ok(()),
            BrailleBackend::Liblouis => LouisTranslator::new(
                &self.louis_binary,
                &self.literary_table,
                &self.math_table,
            )
            .health_check(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub image_model: String,
    pub speech_model: String,
    pub voice: String,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            chat_model: "gpt-4o-mini".to_string(),
            image_model: "dall-e-3".to_string(),
            speech_model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".eduforge").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to a base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Merge a config file (if any) with env overrides and defaults
fn resolve(config_file: Option<PathBuf>, file: ConfigFile) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".eduforge");
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let home = if let Some(env_home) = env_var("EDUFORGE_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = file.paths.home {
        resolve_path(&base_dir, home_path)
    } else {
        default_home
    };

    let database = if let Some(env_db) = env_var("EDUFORGE_DB") {
        PathBuf::from(env_db)
    } else if let Some(ref db_path) = file.paths.database {
        resolve_path(&base_dir, db_path)
    } else {
        home.join("eduforge.db")
    };

    let assets_dir = match file.paths.assets {
        Some(ref assets) => resolve_path(&base_dir, assets),
        None => home.join("assets"),
    };

    let public_base_url = file
        .assets
        .public_base_url
        .clone()
        .unwrap_or_else(|| format!("file://{}", assets_dir.display()));

    let worker_defaults = WorkerSettings::default();
    let worker = WorkerSettings {
        poll_interval: file
            .worker
            .poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(worker_defaults.poll_interval),
        lease: file
            .worker
            .lease_seconds
            .map(Duration::from_secs)
            .unwrap_or(worker_defaults.lease),
    };

    let braille_defaults = BrailleSettings::default();
    let braille = BrailleSettings {
        backend: file.braille.backend.unwrap_or(braille_defaults.backend),
        louis_binary: file
            .braille
            .louis_binary
            .unwrap_or(braille_defaults.louis_binary),
        literary_table: file
            .braille
            .literary_table
            .unwrap_or(braille_defaults.literary_table),
        math_table: file
            .braille
            .math_table
            .unwrap_or(braille_defaults.math_table),
        layout: BrfLayout {
            cells_per_line: file
                .braille
                .cells_per_line
                .unwrap_or(braille_defaults.layout.cells_per_line),
            lines_per_page: file
                .braille
                .lines_per_page
                .unwrap_or(braille_defaults.layout.lines_per_page),
        },
    };

    let generation_defaults = GenerationSettings::default();
    let generation = GenerationSettings {
        base_url: file
            .generation
            .base_url
            .unwrap_or(generation_defaults.base_url),
        api_key: env_var("EDUFORGE_API_KEY"),
        chat_model: file
            .generation
            .chat_model
            .unwrap_or(generation_defaults.chat_model),
        image_model: file
            .generation
            .image_model
            .unwrap_or(generation_defaults.image_model),
        speech_model: file
            .generation
            .speech_model
            .unwrap_or(generation_defaults.speech_model),
        voice: file.generation.voice.unwrap_or(generation_defaults.voice),
        timeout: file
            .generation
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(generation_defaults.timeout),
    };

    Ok(ResolvedConfig {
        home,
        database,
        assets_dir,
        public_base_url,
        config_file,
        worker,
        braille,
        generation,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    match find_config_file() {
        Some(path) => {
            let file = load_config_file(&path)?;
            resolve(Some(path), file)
        }
        None => resolve(None, ConfigFile::default()),
    }
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the eduforge home directory
pub fn eduforge_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the database path
pub fn database_path() -> Result<PathBuf> {
    Ok(config()?.database.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, ConfigFile::default()).unwrap();

        assert_eq!(config.worker.poll_interval, Duration::from_millis(500));
        assert_eq!(config.worker.lease, Duration::from_secs(600));
        assert_eq!(config.braille.backend, BrailleBackend::Builtin);
        assert_eq!(config.braille.layout, BrfLayout::default());
        assert_eq!(config.generation.base_url, DEFAULT_BASE_URL);
        assert!(config.config_file.is_none());
        assert!(config.public_base_url.starts_with("file://"));
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let eduforge_dir = temp.path().join(".eduforge");
        std::fs::create_dir_all(&eduforge_dir).unwrap();

        let config_path = eduforge_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1"
paths:
  database: /var/lib/eduforge/main.db
  assets: ./media
worker:
  poll_interval_ms: 250
  lease_seconds: 30
braille:
  backend: liblouis
  literary_table: es-g2.ctb
  cells_per_line: 32
generation:
  base_url: http://localhost:8080/v1
  voice: nova
assets:
  public_base_url: https://cdn.example.org/assets
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version.as_deref(), Some("1"));
        assert_eq!(parsed.braille.backend, Some(BrailleBackend::Liblouis));

        let config = resolve(Some(config_path), parsed).unwrap();
        assert_eq!(config.worker.poll_interval, Duration::from_millis(250));
        assert_eq!(config.worker.lease, Duration::from_secs(30));
        assert_eq!(config.braille.literary_table, "es-g2.ctb");
        assert_eq!(config.braille.math_table, "nemeth.ctb");
        assert_eq!(config.braille.layout.cells_per_line, 32);
        assert_eq!(config.braille.layout.lines_per_page, 25);
        assert_eq!(config.generation.base_url, "http://localhost:8080/v1");
        assert_eq!(config.generation.voice, "nova");
        assert_eq!(config.public_base_url, "https://cdn.example.org/assets");
        assert!(config.assets_dir.ends_with("media"));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let parsed: Result<ConfigFile, _> = serde_yaml::from_str("braille:\n  backend: brltty\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_engine_follows_backend() {
        let settings = BrailleSettings::default();
        assert_eq!(settings.engine().backend(), "table");

        let louis = BrailleSettings {
            backend: BrailleBackend::Liblouis,
            ..Default::default()
        };
        assert_eq!(louis.engine().backend(), "liblouis");
    }

    #[test]
    fn test_backend_check_catches_missing_liblouis() {
        assert!(BrailleSettings::default().check_backend().is_ok());

        let missing = BrailleSettings {
            backend: BrailleBackend::Liblouis,
            louis_binary: "eduforge-test-no-such-lou-translate".to_string(),
            ..Default::default()
        };
        assert!(missing.check_backend().is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
