//! Artifact discovery, validation and flattening.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use chunklab_core::{ArtifactKey, ChunkArtifact, ExtractedDocument, IndexableRecord, StrategyKind};

use crate::error::IndexError;

/// An artifact file and the identity parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArtifactLocation {
    pub key: ArtifactKey,
    pub path: PathBuf,
}

/// Per-unit outcome counts of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Artifacts flattened into records.
    pub succeeded: usize,
    /// Unreadable or malformed artifacts, and artifacts recording a
    /// chunking error.
    pub failed: usize,
    /// Processed documents with no artifact.
    pub skipped: usize,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Default)]
pub struct IndexBatch {
    pub records: Vec<IndexableRecord>,
    pub report: BatchReport,
    /// One `MissingArtifact` per processed document without an artifact.
    pub missing: Vec<IndexError>,
}

pub struct ArtifactDataProcessor {
    processed_dir: PathBuf,
    chunks_dir: PathBuf,
}

impl ArtifactDataProcessor {
    pub fn new(processed_dir: impl Into<PathBuf>, chunks_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: processed_dir.into(),
            chunks_dir: chunks_dir.into(),
        }
    }

    pub fn chunks_dir(&self) -> &Path {
        &self.chunks_dir
    }

    // ── Discovery ───────────────────────────────────────────────────

    /// Every artifact in the chunks directory, sorted by key. Hidden and
    /// temporary files, and names that do not parse, are ignored.
    pub fn scan(&self) -> Vec<ArtifactLocation> {
        if !self.chunks_dir.exists() {
            return Vec::new();
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(&self.chunks_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            match ArtifactKey::parse(&name) {
                Some(key) => found.push(ArtifactLocation {
                    key,
                    path: entry.path().to_path_buf(),
                }),
                None => debug!(file = %name, "not an artifact, ignoring"),
            }
        }
        found.sort();
        found
    }

    /// (extraction method, strategy) pairs that have at least one artifact.
    pub fn available_combinations(&self) -> BTreeSet<(String, StrategyKind)> {
        self.scan()
            .into_iter()
            .map(|l| (l.key.extraction_method, l.key.strategy))
            .collect()
    }

    pub fn available_extraction_methods(&self) -> BTreeSet<String> {
        self.scan().into_iter().map(|l| l.key.extraction_method).collect()
    }

    pub fn available_strategies_for_method(&self, extraction_method: &str) -> BTreeSet<StrategyKind> {
        self.scan()
            .into_iter()
            .filter(|l| l.key.extraction_method == extraction_method)
            .map(|l| l.key.strategy)
            .collect()
    }

    /// Artifacts for one combination, sorted by document id.
    pub fn discover(&self, extraction_method: &str, strategy: StrategyKind) -> Vec<ArtifactLocation> {
        let mut found: Vec<ArtifactLocation> = self
            .scan()
            .into_iter()
            .filter(|l| l.key.extraction_method == extraction_method && l.key.strategy == strategy)
            .collect();
        found.sort_by(|a, b| a.key.document_id.cmp(&b.key.document_id));
        found
    }

    /// Processed document files for a method, sorted by name and capped at
    /// `max_documents`.
    pub fn processed_documents(&self, extraction_method: &str, max_documents: Option<usize>) -> Vec<PathBuf> {
        let dir = self.processed_dir.join(extraction_method);
        if !dir.exists() {
            warn!(path = %dir.display(), "processed documents directory not found");
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.') && name.ends_with(".json")
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();
        if let Some(max) = max_documents {
            files.truncate(max);
        }
        files
    }

    // ── Loading ─────────────────────────────────────────────────────

    /// Read and validate one artifact. It needs a `results.chunks` array and
    /// either a `strategy_config` or a `processing_metadata` section.
    pub fn load(&self, location: &ArtifactLocation) -> Result<ChunkArtifact, IndexError> {
        let mismatch = |reason: String| IndexError::FormatMismatch {
            path: location.path.display().to_string(),
            reason,
        };
        let content = fs::read_to_string(&location.path).map_err(|e| mismatch(e.to_string()))?;
        let value: Value = serde_json::from_str(&content).map_err(|e| mismatch(e.to_string()))?;

        if !value
            .get("results")
            .and_then(|r| r.get("chunks"))
            .is_some_and(Value::is_array)
        {
            return Err(mismatch("missing results.chunks array".into()));
        }
        let present = |section: &str| value.get(section).is_some_and(|v| !v.is_null());
        if !present("strategy_config") && !present("processing_metadata") {
            return Err(mismatch(
                "needs a strategy_config or processing_metadata section".into(),
            ));
        }
        serde_json::from_value(value).map_err(|e| mismatch(e.to_string()))
    }

    /// One record per chunk of the artifact.
    pub fn flatten(&self, artifact: &ChunkArtifact, location: &ArtifactLocation) -> Vec<IndexableRecord> {
        let key = &location.key;
        let info = &artifact.document_info;
        let config = artifact.strategy_config.as_ref();
        let processing = artifact.processing_metadata.clone().unwrap_or_default();
        let chunk_size = config.and_then(|c| {
            c.u64_param(&["chunk_size", "max_chunk_size", "max_elements_per_chunk"])
        });
        let chunk_overlap = config.and_then(|c| c.u64_param(&["chunk_overlap", "overlap"]));
        let encoding_name = config.and_then(|c| c.str_param("encoding_name")).map(str::to_string);
        let preprocessing_method = if info.preprocessing_method.is_empty() {
            key.extraction_method.clone()
        } else {
            info.preprocessing_method.clone()
        };
        let total = artifact.total_chunks();

        artifact
            .results
            .chunks
            .iter()
            .map(|chunk| IndexableRecord {
                chunk_id: chunk.chunk_id.clone(),
                document_id: key.document_id.clone(),
                document_title: info.title.clone(),
                extraction_method: key.extraction_method.clone(),
                chunking_strategy: key.strategy.as_str().to_string(),
                strategy_name: if chunk.strategy_name.is_empty() {
                    key.strategy.as_str().to_string()
                } else {
                    chunk.strategy_name.clone()
                },
                content: chunk.content.clone(),
                chunk_index: chunk.chunk_index,
                token_count: chunk.token_count,
                total_chunks: chunk.metadata.total_chunks.unwrap_or(total),
                chunk_size,
                chunk_overlap,
                encoding_name: encoding_name.clone(),
                preprocessing_method: preprocessing_method.clone(),
                content_length: info.content_length,
                processing_time: processing.processing_time,
                memory_usage: processing.memory_usage,
                cpu_usage_percent: processing.cpu_usage_percent,
                gpu_usage_percent: processing.gpu_usage_percent,
                start_position: chunk.start_position,
                end_position: chunk.end_position,
                source_file: info.source_file.clone(),
            })
            .collect()
    }

    // ── Batches ─────────────────────────────────────────────────────

    /// Join the method's processed documents with their artifacts for
    /// `strategy`. When no processed documents exist the artifacts alone
    /// drive the batch.
    pub fn prepare_records(
        &self,
        extraction_method: &str,
        strategy: StrategyKind,
        max_documents: Option<usize>,
    ) -> IndexBatch {
        let artifacts: BTreeMap<String, ArtifactLocation> = self
            .discover(extraction_method, strategy)
            .into_iter()
            .map(|l| (l.key.document_id.clone(), l))
            .collect();
        let mut batch = IndexBatch::default();

        let processed = self.processed_documents(extraction_method, max_documents);
        let documents: Vec<(String, Option<String>)> = if processed.is_empty() {
            artifacts
                .keys()
                .take(max_documents.unwrap_or(usize::MAX))
                .map(|id| (id.clone(), None))
                .collect()
        } else {
            let mut docs = Vec::with_capacity(processed.len());
            for path in processed {
                match ExtractedDocument::load(&path) {
                    Ok(doc) if !doc.document_id.is_empty() => {
                        let title = (!doc.title.is_empty()).then_some(doc.title);
                        docs.push((doc.document_id, title));
                    }
                    Ok(_) => {
                        warn!(path = %path.display(), "processed document has no document_id");
                        batch.report.failed += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "unreadable processed document");
                        batch.report.failed += 1;
                    }
                }
            }
            docs
        };

        for (document_id, title) in documents {
            let Some(location) = artifacts.get(&document_id) else {
                warn!(document_id = %document_id, strategy = %strategy, "no artifact for document");
                batch.report.skipped += 1;
                batch.missing.push(IndexError::MissingArtifact {
                    document_id,
                    extraction_method: extraction_method.to_string(),
                    strategy: strategy.as_str().to_string(),
                });
                continue;
            };
            let artifact = match self.load(location) {
                Ok(artifact) => artifact,
                Err(e) => {
                    warn!(error = %e, "skipping artifact");
                    batch.report.failed += 1;
                    continue;
                }
            };
            if let Some(error) = &artifact.results.error {
                warn!(document_id = %document_id, strategy = %strategy, error = %error, "artifact records a chunking failure");
                batch.report.failed += 1;
                continue;
            }

            let mut records = self.flatten(&artifact, location);
            if let Some(title) = title {
                for record in &mut records {
                    record.document_title = title.clone();
                }
            }
            batch.records.extend(records);
            batch.report.succeeded += 1;
        }

        info!(
            extraction_method,
            strategy = %strategy,
            records = batch.records.len(),
            succeeded = batch.report.succeeded,
            failed = batch.report.failed,
            skipped = batch.report.skipped,
            "prepared records"
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: &Value) {
        fs::write(dir.join(name), serde_json::to_vec(value).unwrap()).unwrap();
    }

    fn artifact_json(doc: &str, strategy: &str, chunks: usize) -> Value {
        let chunks: Vec<Value> = (0..chunks)
            .map(|i| {
                json!({
                    "chunk_id": format!("{doc}_{strategy}_{i:03}"),
                    "document_id": doc,
                    "strategy_name": strategy,
                    "content": format!("Chunk {i} of {doc}."),
                    "chunk_index": i,
                    "start_position": i * 10,
                    "end_position": i * 10 + 10,
                    "token_count": 5,
                    "metadata": { "position_unit": "chars", "total_chunks": chunks }
                })
            })
            .collect();
        json!({
            "document_info": {
                "document_id": doc,
                "title": format!("About {doc}"),
                "content_length": 100,
                "source_file": format!("{doc}.pdf"),
                "preprocessing_method": "pypdf"
            },
            "strategy_config": {
                "strategy_name": strategy,
                "parameters": { "chunk_size": 512, "overlap": 32, "encoding_name": "cl100k_base" }
            },
            "results": { "chunks": chunks },
            "processing_metadata": {
                "timestamp": "2025-01-01T00:00:00Z",
                "processing_time": 2.0,
                "memory_usage": 12.5,
                "cpu_usage_percent": 80.0,
                "gpu_usage_percent": 0.0,
                "gpu_memory_usage": 0.0
            }
        })
    }

    fn location(dir: &Path, name: &str) -> ArtifactLocation {
        ArtifactLocation {
            key: ArtifactKey::parse(name).unwrap(),
            path: dir.join(name),
        }
    }

    #[test]
    fn load_rejects_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let p = ArtifactDataProcessor::new(dir.path(), dir.path());

        write(dir.path(), "a_pypdf_fixed_size.json", &json!({ "results": {} }));
        let err = p.load(&location(dir.path(), "a_pypdf_fixed_size.json")).unwrap_err();
        assert!(matches!(err, IndexError::FormatMismatch { .. }));

        write(
            dir.path(),
            "b_pypdf_fixed_size.json",
            &json!({ "document_info": {}, "results": { "chunks": [] } }),
        );
        let err = p.load(&location(dir.path(), "b_pypdf_fixed_size.json")).unwrap_err();
        assert!(err.to_string().contains("strategy_config"));

        fs::write(dir.path().join("c_pypdf_fixed_size.json"), "{ truncated").unwrap();
        assert!(p.load(&location(dir.path(), "c_pypdf_fixed_size.json")).is_err());

        let missing = location(dir.path(), "d_pypdf_fixed_size.json");
        assert!(matches!(p.load(&missing), Err(IndexError::FormatMismatch { .. })));
    }

    #[test]
    fn legacy_strategy_keyed_artifact_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let p = ArtifactDataProcessor::new(dir.path(), dir.path());
        write(
            dir.path(),
            "a_pypdf_semantic.json",
            &json!({ "document_info": {}, "results": { "semantic": { "chunks": [] } } }),
        );
        assert!(p.load(&location(dir.path(), "a_pypdf_semantic.json")).is_err());
    }

    #[test]
    fn flatten_joins_chunk_document_and_telemetry() {
        let dir = tempfile::tempdir().unwrap();
        let p = ArtifactDataProcessor::new(dir.path(), dir.path());
        write(dir.path(), "doc_1_pypdf_fixed_size.json", &artifact_json("doc_1", "fixed_size", 3));

        let loc = location(dir.path(), "doc_1_pypdf_fixed_size.json");
        let artifact = p.load(&loc).unwrap();
        let records = p.flatten(&artifact, &loc);

        assert_eq!(records.len(), 3);
        let r = &records[2];
        assert_eq!(r.chunk_id, "doc_1_fixed_size_002");
        assert_eq!(r.document_id, "doc_1");
        assert_eq!(r.document_title, "About doc_1");
        assert_eq!(r.extraction_method, "pypdf");
        assert_eq!(r.chunking_strategy, "fixed_size");
        assert_eq!(r.chunk_index, 2);
        assert_eq!(r.total_chunks, 3);
        assert_eq!(r.chunk_size, Some(512));
        assert_eq!(r.chunk_overlap, Some(32));
        assert_eq!(r.encoding_name.as_deref(), Some("cl100k_base"));
        assert_eq!(r.processing_time, 2.0);
        assert_eq!(r.memory_usage, 12.5);
        assert_eq!((r.start_position, r.end_position), (20, 30));
        assert_eq!(r.source_file.as_deref(), Some("doc_1.pdf"));
    }

    #[test]
    fn scan_ignores_temp_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let p = ArtifactDataProcessor::new(dir.path(), dir.path());
        write(dir.path(), "b_pypdf_semantic.json", &artifact_json("b", "semantic", 1));
        write(dir.path(), "a_pypdf_semantic.json", &artifact_json("a", "semantic", 1));
        write(dir.path(), ".c_pypdf_semantic.json.tmp", &json!({}));
        write(dir.path(), "summary.json", &json!({}));

        let ids: Vec<String> = p.scan().into_iter().map(|l| l.key.document_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn combinations_are_ordered_sets() {
        let dir = tempfile::tempdir().unwrap();
        let p = ArtifactDataProcessor::new(dir.path(), dir.path());
        for name in [
            "x_docling_semantic.json",
            "x_pypdf_semantic.json",
            "y_pypdf_fixed_size.json",
            "x_pypdf_fixed_size.json",
        ] {
            write(dir.path(), name, &json!({}));
        }

        let combos: Vec<(String, StrategyKind)> = p.available_combinations().into_iter().collect();
        assert_eq!(
            combos,
            vec![
                ("docling".to_string(), StrategyKind::Semantic),
                ("pypdf".to_string(), StrategyKind::FixedSize),
                ("pypdf".to_string(), StrategyKind::Semantic),
            ]
        );
        assert_eq!(
            p.available_extraction_methods().into_iter().collect::<Vec<_>>(),
            vec!["docling", "pypdf"]
        );
        assert!(p.available_strategies_for_method("marker").is_empty());
    }
}
