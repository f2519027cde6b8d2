//! Chunking strategies.
//!
//! The strategy set is closed: fixed-size token windows, recursive
//! separator-based splitting, element-group sliding windows and
//! embedding-driven semantic grouping. Every strategy produces chunks in
//! document order with deterministic ids.

mod element_based;
mod fixed_size;
mod hierarchical;
mod semantic;

use std::sync::Arc;

use serde_json::Value;

use chunklab_core::{
    ChunkMetadata, ConfigError, DocumentChunk, ExtractedDocument, StrategyConfig, StrategyKind,
};

use crate::embedding::Embedder;
use crate::error::ChunkError;
use crate::text::normalize;

pub use element_based::{ElementBasedChunker, ElementBasedParams};
pub use fixed_size::{FixedSizeChunker, FixedSizeParams};
pub use hierarchical::{HierarchicalChunker, HierarchicalParams, KeepSeparator};
pub use semantic::{BreakpointMode, SemanticChunker, SemanticParams};

#[cfg(test)]
mod tests;

// ── Draft chunks ────────────────────────────────────────────────────────────

/// A chunk before ids and indices are assigned.
#[derive(Debug, Clone)]
pub(crate) struct ChunkDraft {
    pub content: String,
    pub start: usize,
    pub end: usize,
    pub token_count: usize,
    pub metadata: ChunkMetadata,
}

impl ChunkDraft {
    pub(crate) fn flag(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.extra.insert(key.to_string(), value.into());
    }
}

/// Assign indices, ids and `total_chunks`.
fn finalize(document_id: &str, strategy_name: &str, drafts: Vec<ChunkDraft>) -> Vec<DocumentChunk> {
    let total = drafts.len();
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            let mut metadata = draft.metadata;
            metadata.total_chunks = Some(total);
            DocumentChunk {
                chunk_id: DocumentChunk::make_id(document_id, strategy_name, index),
                document_id: document_id.to_string(),
                strategy_name: strategy_name.to_string(),
                content: draft.content,
                chunk_index: index,
                start_position: draft.start,
                end_position: draft.end,
                token_count: draft.token_count,
                metadata,
            }
        })
        .collect()
}

pub(crate) fn invalid(kind: StrategyKind, parameter: &str, reason: impl Into<String>) -> ChunkError {
    ChunkError::Config(ConfigError::InvalidParameter {
        strategy: kind.as_str().to_string(),
        parameter: parameter.to_string(),
        reason: reason.into(),
    })
}

// ── Strategy dispatch ───────────────────────────────────────────────────────

pub enum ChunkingStrategy {
    FixedSize(FixedSizeChunker),
    Hierarchical(HierarchicalChunker),
    ElementBased(ElementBasedChunker),
    Semantic(SemanticChunker),
}

impl ChunkingStrategy {
    /// Build a strategy from its config. Parameter problems surface here,
    /// before any document is touched. The semantic strategy needs an
    /// embedder.
    pub fn from_config(
        config: &StrategyConfig,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self, ChunkError> {
        Ok(match config.kind()? {
            StrategyKind::FixedSize => Self::FixedSize(FixedSizeChunker::from_config(config)?),
            StrategyKind::Hierarchical => {
                Self::Hierarchical(HierarchicalChunker::from_config(config)?)
            }
            StrategyKind::ElementBased => {
                Self::ElementBased(ElementBasedChunker::from_config(config)?)
            }
            StrategyKind::Semantic => {
                let embedder = embedder.ok_or_else(|| ConfigError::MissingParameter {
                    strategy: config.strategy_name.clone(),
                    parameter: "embedder".to_string(),
                })?;
                Self::Semantic(SemanticChunker::from_config(config, embedder)?)
            }
        })
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::FixedSize(_) => StrategyKind::FixedSize,
            Self::Hierarchical(_) => StrategyKind::Hierarchical,
            Self::ElementBased(_) => StrategyKind::ElementBased,
            Self::Semantic(_) => StrategyKind::Semantic,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Segment without awaiting anything. `None` for the semantic strategy,
    /// which has to call its embedder.
    pub fn segment_local(
        &self,
        doc: &ExtractedDocument,
    ) -> Option<Result<Vec<DocumentChunk>, ChunkError>> {
        if let Err(e) = self.check_document(doc) {
            return Some(Err(e));
        }
        let drafts = match self {
            Self::FixedSize(c) => c.segment(&normalize(&doc.full_text)),
            Self::Hierarchical(c) => Ok(c.segment(&normalize(&doc.full_text))),
            Self::ElementBased(c) => Ok(c.segment(doc)),
            Self::Semantic(_) => return None,
        };
        Some(drafts.map(|d| finalize(&doc.document_id, self.name(), d)))
    }

    pub async fn segment(&self, doc: &ExtractedDocument) -> Result<Vec<DocumentChunk>, ChunkError> {
        match self {
            Self::Semantic(c) => {
                self.check_document(doc)?;
                let drafts = c.segment(&normalize(&doc.full_text)).await?;
                Ok(finalize(&doc.document_id, self.name(), drafts))
            }
            _ => self
                .segment_local(doc)
                .unwrap_or_else(|| Ok(Vec::new())),
        }
    }

    fn check_document(&self, doc: &ExtractedDocument) -> Result<(), ChunkError> {
        if doc.document_id.trim().is_empty() {
            return Err(ChunkError::ChunkingFailure {
                document_id: doc.document_id.clone(),
                strategy: self.name().to_string(),
                reason: "document has no id".to_string(),
            });
        }
        Ok(())
    }
}
