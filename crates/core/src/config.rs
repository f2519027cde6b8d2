use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::strategy::{StrategyConfig, StrategyKind};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub paths: PathsConfig,
    pub pipeline: PipelineSettings,
    pub ollama: OllamaConfig,
    pub indexer: IndexerSettings,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `CHUNKLAB_PROFILE`. When set (e.g. `BENCH`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("CHUNKLAB_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            paths: PathsConfig::from_env_profiled(p),
            pipeline: PipelineSettings::from_env_profiled(p),
            ollama: OllamaConfig::from_env_profiled(p),
            indexer: IndexerSettings::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  paths:     processed={}, chunks={}, index={}",
            self.paths.processed_dir.display(),
            self.paths.chunks_dir.display(),
            self.paths.index_dir.display());
        tracing::info!("  pipeline:  max_workers={}, chunking_config={}",
            self.pipeline.max_workers,
            self.pipeline.chunking_config.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "(defaults)".into()));
        tracing::info!("  ollama:    url={}, model={}", self.ollama.url, self.ollama.embedding_model);
        tracing::info!("  indexer:   prefix={}, batch_size={}",
            self.indexer.collection_prefix.as_deref().unwrap_or("(none)"),
            self.indexer.batch_size);
    }
}

// ── Paths ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    /// Extracted documents, one subdirectory per extraction method.
    pub processed_dir: PathBuf,
    /// Chunk artifacts.
    pub chunks_dir: PathBuf,
    /// JSONL collections for the search engine.
    pub index_dir: PathBuf,
}

impl PathsConfig {
    fn from_env_profiled(p: &str) -> Self {
        let data_dir = PathBuf::from(profiled_env_or(p, "DATA_DIR", "data"));
        let sub = |key: &str, name: &str| {
            profiled_env_opt(p, key)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(name))
        };
        Self {
            processed_dir: sub("PROCESSED_DIR", "processed"),
            chunks_dir: sub("CHUNKS_DIR", "chunks"),
            index_dir: sub("INDEX_DIR", "index"),
            data_dir,
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub max_workers: usize,
    /// Optional strategy config file (TOML, JSON or YAML).
    pub chunking_config: Option<PathBuf>,
    /// Cap on documents per run or index batch.
    pub max_documents: Option<usize>,
}

impl PipelineSettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_workers: profiled_env_usize(p, "CHUNK_MAX_WORKERS", 4),
            chunking_config: profiled_env_opt(p, "CHUNKING_CONFIG").map(PathBuf::from),
            max_documents: profiled_env_opt(p, "MAX_DOCUMENTS").and_then(|v| v.parse().ok()),
        }
    }
}

// ── Ollama (semantic strategy embeddings) ─────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub embedding_model: String,
    pub dimensions: usize,
}

impl OllamaConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "OLLAMA_URL", "http://localhost:11434"),
            embedding_model: profiled_env_or(p, "OLLAMA_EMBEDDING_MODEL", "all-minilm"),
            dimensions: profiled_env_usize(p, "EMBEDDING_DIMENSIONS", 384),
        }
    }
}

// ── Indexer ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerSettings {
    pub collection_prefix: Option<String>,
    /// Records written per flush of a collection file.
    pub batch_size: usize,
}

impl IndexerSettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            collection_prefix: profiled_env_opt(p, "COLLECTION_PREFIX"),
            batch_size: profiled_env_usize(p, "INDEX_BATCH_SIZE", 100),
        }
    }

    /// `{prefix}_{method}_{strategy}`, or `{method}_{strategy}` without a prefix.
    pub fn collection_name(&self, extraction_method: &str, strategy: &str) -> String {
        match self.collection_prefix.as_deref() {
            Some(prefix) => format!("{prefix}_{extraction_method}_{strategy}"),
            None => format!("{extraction_method}_{strategy}"),
        }
    }
}

// ── Chunking run config (file based) ──────────────────────────

fn default_enabled() -> Vec<String> {
    StrategyKind::ALL.iter().map(|k| k.as_str().to_string()).collect()
}

fn default_max_workers() -> usize {
    4
}

/// Immutable configuration of one chunking run. Per-strategy parameter
/// overrides are merged over the strategy defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_enabled")]
    pub enabled_strategies: Vec<String>,
    #[serde(default)]
    pub strategy_configs: BTreeMap<String, Map<String, Value>>,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Skip units whose artifact already exists.
    #[serde(default)]
    pub skip_existing: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled_strategies: default_enabled(),
            strategy_configs: BTreeMap::new(),
            max_workers: default_max_workers(),
            skip_existing: false,
        }
    }
}

impl ChunkingConfig {
    /// Load from a `.toml`, `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let parse_err = |reason: String| ConfigError::Parse {
            path: path.display().to_string(),
            reason,
        };
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_err(e.to_string()))?
            }
            other => {
                return Err(parse_err(format!(
                    "unsupported config format: {}",
                    other.unwrap_or("(none)")
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_strategies(mut self, strategies: &[StrategyKind]) -> Self {
        self.enabled_strategies = strategies.iter().map(|k| k.as_str().to_string()).collect();
        self
    }

    pub fn with_override(mut self, kind: StrategyKind, key: &str, value: impl Into<Value>) -> Self {
        self.strategy_configs
            .entry(kind.as_str().to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be at least 1".into()));
        }
        if self.enabled_strategies.is_empty() {
            return Err(ConfigError::Invalid("no strategies enabled".into()));
        }
        let mut seen = BTreeSet::new();
        for name in &self.enabled_strategies {
            name.parse::<StrategyKind>()?;
            if !seen.insert(name) {
                return Err(ConfigError::Invalid(format!("strategy {name} enabled twice")));
            }
        }
        for name in self.strategy_configs.keys() {
            name.parse::<StrategyKind>()?;
        }
        Ok(())
    }

    /// Defaults for `kind` with this config's overrides applied.
    pub fn strategy_config(&self, kind: StrategyKind) -> StrategyConfig {
        let mut config = StrategyConfig::new(kind);
        if let Some(overrides) = self.strategy_configs.get(kind.as_str()) {
            for (key, value) in overrides {
                config.parameters.insert(key.clone(), value.clone());
            }
        }
        config
    }

    /// Resolved configs of every enabled strategy, in the order they were enabled.
    pub fn enabled(&self) -> Result<Vec<StrategyConfig>, ConfigError> {
        self.validate()?;
        self.enabled_strategies
            .iter()
            .map(|name| Ok(self.strategy_config(name.parse()?)))
            .collect()
    }
}
