//! Runs every enabled strategy over every document and persists one
//! artifact per (document, extraction method, strategy) unit.

mod sampler;
mod stats;
mod writer;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use chunklab_core::{
    ArtifactKey, ChunkArtifact, ChunkStatistics, ChunkingConfig, ChunkingResult, DocumentChunk,
    ExtractedDocument, StrategyConfig, StrategyKind,
};

use crate::embedding::Embedder;
use crate::error::{ChunkError, PipelineError};
use crate::strategies::ChunkingStrategy;

pub use sampler::{measure, NoopSampler, ProcSampler, ResourceSample, ResourceSampler};
pub use stats::{RunStatistics, StrategyStatistics};
pub use writer::ArtifactWriter;

/// Extraction method recorded for documents that do not name one.
pub const UNKNOWN_METHOD: &str = "unknown";

// ── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum UnitStatus {
    Succeeded,
    /// Chunking or persistence failed; the artifact (if written) carries the error.
    Failed(String),
    /// Artifact already present and `skip_existing` is set.
    Skipped,
    /// The stop flag was raised before the unit started.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub key: ArtifactKey,
    pub status: UnitStatus,
    pub path: Option<PathBuf>,
}

/// Everything a run produced, ordered by artifact key.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<UnitOutcome>,
    pub results: Vec<ChunkingResult>,
    pub statistics: RunStatistics,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&UnitStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| *s == UnitStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| *s == UnitStatus::Skipped)
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| *s == UnitStatus::Cancelled)
    }

    /// Log the per-unit summary and the strategy comparison table.
    pub fn log_summary(&self) {
        info!(
            succeeded = self.succeeded(),
            failed = self.failed(),
            skipped = self.skipped(),
            cancelled = self.cancelled(),
            "chunking run finished"
        );
        for (strategy, s) in &self.statistics.by_strategy {
            info!(
                "  {:<22} docs={:<4} ok={:<4} failed={:<3} skipped={:<3} success={:>5.1}% chunks/doc={:>6.1} avg_time={:.3}s avg_chars={:.0} avg_tokens={:.1} quality={:.2}",
                strategy.as_str(),
                s.documents,
                s.succeeded,
                s.failed,
                s.skipped,
                s.success_rate() * 100.0,
                s.avg_chunks_per_document(),
                s.avg_processing_time,
                s.avg_chunk_size,
                s.avg_token_count,
                s.avg_quality,
            );
        }
    }
}

// ── Pipeline ────────────────────────────────────────────────────────────────

struct StrategyUnit {
    config: StrategyConfig,
    strategy: Arc<ChunkingStrategy>,
}

pub struct ChunkingPipeline {
    config: ChunkingConfig,
    units: Vec<StrategyUnit>,
    writer: ArtifactWriter,
    sampler: Arc<dyn ResourceSampler>,
    stop: Arc<AtomicBool>,
}

impl ChunkingPipeline {
    /// Build every enabled strategy up front so configuration errors abort
    /// before any document is processed.
    pub fn new(
        config: ChunkingConfig,
        output_dir: impl Into<PathBuf>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self, PipelineError> {
        let units = config
            .enabled()?
            .into_iter()
            .map(|config| {
                let strategy = ChunkingStrategy::from_config(&config, embedder.clone())?;
                Ok(StrategyUnit {
                    config,
                    strategy: Arc::new(strategy),
                })
            })
            .collect::<Result<Vec<_>, ChunkError>>()?;
        let writer = ArtifactWriter::new(output_dir)?;

        Ok(Self {
            config,
            units,
            writer,
            sampler: Arc::new(ProcSampler),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn ResourceSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Shared stop flag. Raising it stops the run before the next unit;
    /// units already running finish and keep their artifacts.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn output_dir(&self) -> &Path {
        self.writer.dir()
    }

    pub fn strategies(&self) -> impl Iterator<Item = StrategyKind> + '_ {
        self.units.iter().map(|u| u.strategy.kind())
    }

    pub async fn run(&self, documents: Vec<ExtractedDocument>) -> RunReport {
        let documents: Vec<Arc<ExtractedDocument>> = documents.into_iter().map(Arc::new).collect();
        let work: Vec<(Arc<ExtractedDocument>, &StrategyUnit)> = documents
            .iter()
            .flat_map(|doc| self.units.iter().map(move |unit| (Arc::clone(doc), unit)))
            .collect();

        info!(
            documents = documents.len(),
            strategies = self.units.len(),
            units = work.len(),
            workers = self.config.max_workers,
            "starting chunking run"
        );

        let mut finished: Vec<(UnitOutcome, Option<ChunkingResult>)> = stream::iter(work)
            .map(|(doc, unit)| self.run_unit(doc, unit))
            .buffer_unordered(self.config.max_workers)
            .collect()
            .await;
        finished.sort_by(|a, b| a.0.key.cmp(&b.0.key));

        let mut report = RunReport::default();
        for (outcome, result) in finished {
            match (&outcome.status, result) {
                (UnitStatus::Skipped, _) => report.statistics.entry(outcome.key.strategy).record_skipped(),
                (UnitStatus::Cancelled, _) => {}
                (_, Some(result)) if outcome.path.is_some() => {
                    report.statistics.entry(outcome.key.strategy).record(&result);
                    report.results.push(result);
                }
                (_, _) => {}
            }
            report.outcomes.push(outcome);
        }
        report
    }

    async fn run_unit(
        &self,
        doc: Arc<ExtractedDocument>,
        unit: &StrategyUnit,
    ) -> (UnitOutcome, Option<ChunkingResult>) {
        let method = extraction_method(&doc);
        let key = ArtifactKey::new(&doc.document_id, method, unit.strategy.kind());

        if self.stop.load(Ordering::Relaxed) {
            return (
                UnitOutcome {
                    key,
                    status: UnitStatus::Cancelled,
                    path: None,
                },
                None,
            );
        }
        if self.config.skip_existing && self.writer.exists(&key) {
            info!(document_id = %key.document_id, strategy = %key.strategy, "artifact exists, skipping");
            let path = Some(self.writer.path_for(&key));
            return (
                UnitOutcome {
                    key,
                    status: UnitStatus::Skipped,
                    path,
                },
                None,
            );
        }

        let before = self.sampler.sample();
        let started = Instant::now();
        let chunks = segment(&unit.strategy, &doc).await;
        let mut metadata = measure(before, self.sampler.sample(), started.elapsed());

        let chunks = match chunks {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(
                    document_id = %doc.document_id,
                    strategy = %key.strategy,
                    error = %e,
                    "chunking failed"
                );
                metadata.error = Some(e.to_string());
                Vec::new()
            }
        };
        let result = ChunkingResult {
            strategy_name: unit.strategy.name().to_string(),
            document_id: doc.document_id.clone(),
            statistics: ChunkStatistics::from_chunks(&chunks),
            chunks,
            processing_metadata: metadata,
        };

        let artifact = ChunkArtifact::from_result(&doc, &unit.config, &result);
        let (status, path) = match self.writer.write(&key, &artifact) {
            Ok(path) => match &result.processing_metadata.error {
                None => (UnitStatus::Succeeded, Some(path)),
                Some(e) => (UnitStatus::Failed(e.clone()), Some(path)),
            },
            Err(e) => {
                error!(document_id = %key.document_id, strategy = %key.strategy, error = %e, "failed to write artifact");
                (UnitStatus::Failed(format!("write failed: {e}")), None)
            }
        };
        (UnitOutcome { key, status, path }, Some(result))
    }
}

/// Semantic units await their embedder; the rest are CPU-bound and run on
/// the blocking pool. A panic in either path fails only its own unit.
async fn segment(
    strategy: &Arc<ChunkingStrategy>,
    doc: &Arc<ExtractedDocument>,
) -> Result<Vec<DocumentChunk>, ChunkError> {
    let name = strategy.name();
    let aborted = |reason: String| ChunkError::ChunkingFailure {
        document_id: doc.document_id.clone(),
        strategy: name.to_string(),
        reason,
    };

    if strategy.kind() == StrategyKind::Semantic {
        return AssertUnwindSafe(strategy.segment(doc))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(aborted(format!("chunking task panicked: {}", panic_message(panic.as_ref()))))
            });
    }

    let strategy = Arc::clone(strategy);
    let task_doc = Arc::clone(doc);
    tokio::task::spawn_blocking(move || {
        strategy
            .segment_local(&task_doc)
            .unwrap_or_else(|| Ok(Vec::new()))
    })
    .await
    .unwrap_or_else(|e| Err(aborted(format!("chunking task aborted: {e}"))))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn extraction_method(doc: &ExtractedDocument) -> &str {
    let method = doc.preprocessing_method.trim();
    if method.is_empty() { UNKNOWN_METHOD } else { method }
}

// ── Document discovery ──────────────────────────────────────────────────────

/// Load extracted documents from `{processed_dir}/{method}/*.json`, sorted by
/// (method, file name). Documents missing a method take it from their
/// directory. Unreadable files are skipped with a warning.
pub fn load_documents(
    processed_dir: &Path,
    methods: Option<&[String]>,
    max_documents: Option<usize>,
) -> Vec<ExtractedDocument> {
    let mut files: Vec<(String, PathBuf)> = WalkDir::new(processed_dir)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && name.ends_with(".json")
        })
        .filter_map(|e| {
            let method = e.path().parent()?.file_name()?.to_string_lossy().into_owned();
            Some((method, e.into_path()))
        })
        .filter(|(method, _)| methods.map_or(true, |m| m.iter().any(|x| x == method)))
        .collect();
    files.sort();

    let mut documents = Vec::new();
    for (method, path) in files {
        if max_documents.is_some_and(|max| documents.len() >= max) {
            break;
        }
        match ExtractedDocument::load(&path) {
            Ok(mut doc) => {
                if doc.preprocessing_method.trim().is_empty() {
                    doc.preprocessing_method = method;
                }
                documents.push(doc);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable document"),
        }
    }
    info!(count = documents.len(), dir = %processed_dir.display(), "loaded extracted documents");
    documents
}
