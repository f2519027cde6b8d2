use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use chunklab_core::config::{ChunkingConfig, PipelineSettings};
use chunklab_core::StrategyKind;

use crate::cli::ChunkArgs;

/// Resolve the run config: the explicit `--config` file, else the
/// `CHUNKING_CONFIG` file from settings, else built-in defaults with the
/// env worker count. Command-line flags are applied last.
pub fn resolve_chunking_config(
    explicit: Option<&Path>,
    settings: &PipelineSettings,
    args: &ChunkArgs,
) -> Result<ChunkingConfig> {
    let mut config = match explicit.or(settings.chunking_config.as_deref()) {
        Some(path) => {
            debug!(path = %path.display(), "loading chunking config");
            ChunkingConfig::load(path)
                .with_context(|| format!("failed to load chunking config {}", path.display()))?
        }
        None => ChunkingConfig {
            max_workers: settings.max_workers,
            ..ChunkingConfig::default()
        },
    };

    if !args.strategies.is_empty() {
        let kinds = args
            .strategies
            .iter()
            .map(|s| s.trim().parse::<StrategyKind>())
            .collect::<Result<Vec<_>, _>>()
            .context("invalid --strategies")?;
        config = config.with_strategies(&kinds);
    }
    if let Some(workers) = args.workers {
        config.max_workers = workers;
    }
    if args.skip_existing {
        config.skip_existing = true;
    }

    config.validate().context("invalid chunking config")?;
    Ok(config)
}

/// Model the semantic strategy asks for, falling back to the env default.
pub fn semantic_model(config: &ChunkingConfig, default: &str) -> String {
    config
        .strategy_config(StrategyKind::Semantic)
        .str_param("embedding_model")
        .unwrap_or(default)
        .to_string()
}
