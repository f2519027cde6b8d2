use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use chunklab_chunker::embedding::{CachedEmbedder, Embedder, OllamaEmbedder};
use chunklab_chunker::pipeline::load_documents;
use chunklab_chunker::ChunkingPipeline;
use chunklab_core::config::Config;
use chunklab_core::{IndexableRecord, StrategyKind};
use chunklab_indexer::{
    ArtifactDataProcessor, BatchReport, JsonlCollection, Objective, PerformanceAnalyzer,
};

use crate::cli::{AnalyzeCommand, ChunkArgs, IndexArgs};
use crate::config::{resolve_chunking_config, semantic_model};

const EMBEDDING_CACHE_CAPACITY: usize = 10_000;

fn processor(config: &Config) -> ArtifactDataProcessor {
    ArtifactDataProcessor::new(&config.paths.processed_dir, &config.paths.chunks_dir)
}

// ── list ────────────────────────────────────────────────────────────────────

pub fn list(config: &Config) -> Result<()> {
    let processor = processor(config);
    let methods = processor.available_extraction_methods();
    if methods.is_empty() {
        println!("No chunk artifacts under {}", config.paths.chunks_dir.display());
        return Ok(());
    }
    for method in methods {
        let strategies: Vec<&str> = processor
            .available_strategies_for_method(&method)
            .into_iter()
            .map(|k| k.as_str())
            .collect();
        println!("{method}: {}", strategies.join(", "));
    }
    Ok(())
}

// ── chunk ───────────────────────────────────────────────────────────────────

pub async fn chunk(config: &Config, explicit_config: Option<&Path>, args: &ChunkArgs) -> Result<()> {
    let chunking = resolve_chunking_config(explicit_config, &config.pipeline, args)?;

    let embedder: Option<Arc<dyn Embedder>> = if chunking
        .enabled_strategies
        .iter()
        .any(|s| s == StrategyKind::Semantic.as_str())
    {
        let ollama = OllamaEmbedder::new(
            config.ollama.url.clone(),
            semantic_model(&chunking, &config.ollama.embedding_model),
            config.ollama.dimensions,
        );
        let cached: Arc<dyn Embedder> =
            Arc::new(CachedEmbedder::new(Arc::new(ollama), EMBEDDING_CACHE_CAPACITY));
        Some(cached)
    } else {
        None
    };

    let pipeline = ChunkingPipeline::new(chunking, &config.paths.chunks_dir, embedder)
        .context("failed to build chunking pipeline")?;

    let methods = (!args.extraction_methods.is_empty()).then_some(args.extraction_methods.as_slice());
    let max_documents = args.max_documents.or(config.pipeline.max_documents);
    let documents = load_documents(&config.paths.processed_dir, methods, max_documents);
    if documents.is_empty() {
        warn!(dir = %config.paths.processed_dir.display(), "no extracted documents found");
        return Ok(());
    }
    info!(
        documents = documents.len(),
        strategies = pipeline.strategies().count(),
        "starting chunking run"
    );

    let stop = pipeline.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight units");
            stop.store(true, Ordering::Relaxed);
        }
    });

    let report = pipeline.run(documents).await;
    report.log_summary();
    println!(
        "{} succeeded, {} failed, {} skipped, {} cancelled",
        report.succeeded(),
        report.failed(),
        report.skipped(),
        report.cancelled()
    );
    if report.cancelled() > 0 {
        bail!("run interrupted");
    }
    Ok(())
}

// ── index ───────────────────────────────────────────────────────────────────

pub fn index(config: &Config, args: &IndexArgs) -> Result<()> {
    let processor = processor(config);
    let combinations: Vec<(String, StrategyKind)> = if args.all {
        processor.available_combinations().into_iter().collect()
    } else {
        let (Some(method), Some(strategy)) = (&args.extraction_method, &args.chunking_strategy) else {
            bail!("--extraction-method and --chunking-strategy are required without --all");
        };
        let kind: StrategyKind = strategy.parse().context("invalid --chunking-strategy")?;
        vec![(method.clone(), kind)]
    };
    if combinations.is_empty() {
        warn!(dir = %config.paths.chunks_dir.display(), "nothing to index");
        return Ok(());
    }

    let max_documents = args.max_documents.or(config.pipeline.max_documents);
    let mut total = BatchReport::default();
    for (method, kind) in combinations {
        let batch = processor.prepare_records(&method, kind, max_documents);
        for missing in &batch.missing {
            warn!("{missing}");
        }

        let name = config.indexer.collection_name(&method, kind.as_str());
        let collection = JsonlCollection::open(
            &config.paths.index_dir,
            &name,
            config.indexer.batch_size,
            args.force_recreate,
        )
        .with_context(|| format!("failed to open collection {name}"))?;
        let written = collection
            .write(&batch.records)
            .with_context(|| format!("failed to write collection {name}"))?;

        println!(
            "{name}: {} records written, {} already indexed ({} succeeded, {} failed, {} skipped)",
            written.written,
            written.already_indexed,
            batch.report.succeeded,
            batch.report.failed,
            batch.report.skipped
        );
        total.merge(batch.report);
    }

    info!(
        succeeded = total.succeeded,
        failed = total.failed,
        skipped = total.skipped,
        "indexing complete"
    );
    Ok(())
}

// ── analyze ─────────────────────────────────────────────────────────────────

fn collect_records(config: &Config, extraction_method: Option<&str>) -> Vec<IndexableRecord> {
    let processor = processor(config);
    processor
        .available_combinations()
        .into_iter()
        .filter(|(method, _)| extraction_method.map_or(true, |m| m == method))
        .flat_map(|(method, kind)| processor.prepare_records(&method, kind, None).records)
        .collect()
}

pub fn analyze(config: &Config, command: &AnalyzeCommand) -> Result<()> {
    let method = match command {
        AnalyzeCommand::Summary { extraction_method }
        | AnalyzeCommand::Compare { extraction_method, .. }
        | AnalyzeCommand::Optimal { extraction_method, .. } => extraction_method.as_deref(),
    };
    let analyzer = PerformanceAnalyzer::from_records(&collect_records(config, method));
    if analyzer.unit_count() == 0 {
        bail!("no chunk artifacts to analyse under {}", config.paths.chunks_dir.display());
    }

    let output = match command {
        AnalyzeCommand::Summary { .. } => serde_json::to_string_pretty(&analyzer.summarize())?,
        AnalyzeCommand::Compare {
            strategy_a,
            strategy_b,
            ..
        } => {
            let Some(report) = analyzer.compare(strategy_a, strategy_b) else {
                bail!("no telemetry for {strategy_a} or {strategy_b}");
            };
            serde_json::to_string_pretty(&report)?
        }
        AnalyzeCommand::Optimal { objective, .. } => {
            let objective: Objective = (*objective).into();
            let best = analyzer.find_optimal(objective);
            serde_json::to_string_pretty(&serde_json::json!({
                "objective": objective,
                "strategy": best,
            }))?
        }
    };
    println!("{output}");
    Ok(())
}
