//! JSON Lines collections: the records a search engine ingests, one file
//! per (extraction method, strategy), plus a schema file beside it.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use chunklab_core::{collection_schema, IndexableRecord};

use crate::error::IndexError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkReport {
    pub written: usize,
    /// Records whose `chunk_id` was already in the collection.
    pub already_indexed: usize,
}

pub struct JsonlCollection {
    name: String,
    path: PathBuf,
    batch_size: usize,
}

impl JsonlCollection {
    /// Open (or create) `{index_dir}/{name}.jsonl`. With `force_recreate`
    /// any existing collection is removed first.
    pub fn open(
        index_dir: &Path,
        name: &str,
        batch_size: usize,
        force_recreate: bool,
    ) -> Result<Self, IndexError> {
        fs::create_dir_all(index_dir)?;
        let path = index_dir.join(format!("{name}.jsonl"));
        if force_recreate && path.exists() {
            info!(collection = name, "deleting existing collection");
            fs::remove_file(&path)?;
        }

        let schema_path = index_dir.join(format!("{name}.schema.json"));
        fs::write(&schema_path, serde_json::to_vec_pretty(&collection_schema(name))?)?;

        Ok(Self {
            name: name.to_string(),
            path,
            batch_size: batch_size.max(1),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `chunk_id`s already present. Lines that do not parse are ignored.
    pub fn existing_ids(&self) -> Result<HashSet<String>, IndexError> {
        let mut ids = HashSet::new();
        if !self.path.exists() {
            return Ok(ids);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        for line in reader.lines() {
            let line = line?;
            match serde_json::from_str::<serde_json::Value>(&line) {
                Ok(v) => {
                    if let Some(id) = v.get("chunk_id").and_then(|id| id.as_str()) {
                        ids.insert(id.to_string());
                    }
                }
                Err(e) => warn!(collection = %self.name, error = %e, "unparseable line in collection"),
            }
        }
        Ok(ids)
    }

    /// Append records not yet in the collection, flushing every
    /// `batch_size` records.
    pub fn write(&self, records: &[IndexableRecord]) -> Result<SinkReport, IndexError> {
        let existing = self.existing_ids()?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut out = BufWriter::new(file);
        let mut report = SinkReport::default();

        for batch in records.chunks(self.batch_size) {
            for record in batch {
                if existing.contains(&record.chunk_id) {
                    report.already_indexed += 1;
                    continue;
                }
                serde_json::to_writer(&mut out, record)?;
                out.write_all(b"\n")?;
                report.written += 1;
            }
            out.flush()?;
        }

        info!(
            collection = %self.name,
            written = report.written,
            already_indexed = report.already_indexed,
            "indexed records"
        );
        Ok(report)
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        Ok(self.existing_ids()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> IndexableRecord {
        IndexableRecord {
            chunk_id: id.into(),
            document_id: "d".into(),
            document_title: String::new(),
            extraction_method: "pypdf".into(),
            chunking_strategy: "semantic".into(),
            strategy_name: "semantic".into(),
            content: "text".into(),
            chunk_index: 0,
            token_count: 1,
            total_chunks: 1,
            chunk_size: None,
            chunk_overlap: None,
            encoding_name: None,
            preprocessing_method: "pypdf".into(),
            content_length: 4,
            processing_time: 0.0,
            memory_usage: 0.0,
            cpu_usage_percent: 0.0,
            gpu_usage_percent: 0.0,
            start_position: 0,
            end_position: 4,
            source_file: None,
        }
    }

    #[test]
    fn incremental_writes_skip_known_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let c = JsonlCollection::open(dir.path(), "pypdf_semantic", 2, false).unwrap();
        let first = c.write(&[record("a"), record("b"), record("c")]).unwrap();
        assert_eq!(first.written, 3);

        let c = JsonlCollection::open(dir.path(), "pypdf_semantic", 2, false).unwrap();
        let second = c.write(&[record("b"), record("d")]).unwrap();
        assert_eq!(second, SinkReport { written: 1, already_indexed: 1 });
        assert_eq!(c.count().unwrap(), 4);
        assert!(dir.path().join("pypdf_semantic.schema.json").exists());
    }

    #[test]
    fn force_recreate_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let c = JsonlCollection::open(dir.path(), "x", 10, false).unwrap();
        c.write(&[record("a"), record("b")]).unwrap();

        let c = JsonlCollection::open(dir.path(), "x", 10, true).unwrap();
        assert_eq!(c.count().unwrap(), 0);
        c.write(&[record("a")]).unwrap();
        let content = fs::read_to_string(c.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
