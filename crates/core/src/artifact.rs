//! On-disk chunk artifacts: one JSON file per
//! (document, extraction method, strategy).

use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkStatistics, ChunkingResult, DocumentChunk, ProcessingMetadata};
use crate::document::ExtractedDocument;
use crate::strategy::{StrategyConfig, StrategyKind};

// ── Naming convention ───────────────────────────────────────────────────────

/// Identity of one artifact, encoded in its filename as
/// `{document_id}_{extraction_method}_{strategy}.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub document_id: String,
    pub extraction_method: String,
    pub strategy: StrategyKind,
}

impl ArtifactKey {
    pub fn new(document_id: &str, extraction_method: &str, strategy: StrategyKind) -> Self {
        Self {
            document_id: document_id.to_string(),
            extraction_method: extraction_method.to_string(),
            strategy,
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.json",
            self.document_id, self.extraction_method, self.strategy
        )
    }

    /// Parse a filename right to left: the strategy suffix is matched against
    /// the known strategy names, the extraction method is the segment before
    /// it and everything left over is the document id (which may itself
    /// contain underscores). Hidden files are never artifacts.
    pub fn parse(file_name: &str) -> Option<Self> {
        if file_name.starts_with('.') {
            return None;
        }
        let stem = file_name.strip_suffix(".json")?;
        StrategyKind::ALL.into_iter().find_map(|strategy| {
            let rest = stem.strip_suffix(strategy.as_str())?.strip_suffix('_')?;
            let (document_id, method) = rest.rsplit_once('_')?;
            if document_id.is_empty() || method.is_empty() {
                return None;
            }
            Some(Self::new(document_id, method, strategy))
        })
    }
}

// ── Artifact body ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentInfo {
    pub document_id: String,
    pub title: String,
    pub content_length: usize,
    pub source_file: Option<String>,
    pub preprocessing_method: String,
}

impl From<&ExtractedDocument> for DocumentInfo {
    fn from(doc: &ExtractedDocument) -> Self {
        Self {
            document_id: doc.document_id.clone(),
            title: doc.title.clone(),
            content_length: doc.content_length(),
            source_file: doc.source_file.clone(),
            preprocessing_method: doc.preprocessing_method.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactResults {
    #[serde(default)]
    pub chunks: Vec<DocumentChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<ChunkStatistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The persisted form of a [`ChunkingResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkArtifact {
    pub document_info: DocumentInfo,
    #[serde(default)]
    pub strategy_config: Option<StrategyConfig>,
    pub results: ArtifactResults,
    #[serde(default)]
    pub processing_metadata: Option<ProcessingMetadata>,
}

impl ChunkArtifact {
    pub fn from_result(
        doc: &ExtractedDocument,
        config: &StrategyConfig,
        result: &ChunkingResult,
    ) -> Self {
        Self {
            document_info: DocumentInfo::from(doc),
            strategy_config: Some(config.clone()),
            results: ArtifactResults {
                chunks: result.chunks.clone(),
                statistics: Some(result.statistics.clone()),
                error: result.processing_metadata.error.clone(),
            },
            processing_metadata: Some(result.processing_metadata.clone()),
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.results.chunks.len()
    }
}
