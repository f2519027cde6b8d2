//! Chunk and per-unit result types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Chunk metadata ──────────────────────────────────────────────────────────

/// Whether token counts came from the real BPE encoder or the 4-chars-per-token
/// estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerMode {
    Exact,
    Approximate,
}

/// Unit of `start_position` / `end_position`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionUnit {
    #[default]
    Chars,
    Tokens,
    Elements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMetadata {
    pub position_unit: PositionUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<TokenizerMode>,
    /// Element types the chunk was assembled from (element-based strategy).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_elements: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub page_numbers: Vec<u32>,
    /// Similarity across the chunk's trailing boundary (semantic strategy).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ChunkMetadata {
    pub fn with_unit(position_unit: PositionUnit) -> Self {
        Self {
            position_unit,
            ..Default::default()
        }
    }
}

// ── Chunk ───────────────────────────────────────────────────────────────────

/// One retrievable unit of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: String,
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub strategy_name: String,
    pub content: String,
    pub chunk_index: usize,
    /// Half-open span `[start_position, end_position)` in `metadata.position_unit`.
    #[serde(default)]
    pub start_position: usize,
    #[serde(default)]
    pub end_position: usize,
    #[serde(default)]
    pub token_count: usize,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    /// Deterministic id: `{document_id}_{strategy}_{index:03}`.
    pub fn make_id(document_id: &str, strategy_name: &str, index: usize) -> String {
        format!("{document_id}_{strategy_name}_{index:03}")
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

// ── Result ──────────────────────────────────────────────────────────────────

/// Size statistics over one result's chunks (sizes in characters).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkStatistics {
    pub total_chunks: usize,
    pub avg_chunk_size: f64,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub avg_token_count: f64,
    pub min_token_count: usize,
    pub max_token_count: usize,
}

impl ChunkStatistics {
    pub fn from_chunks(chunks: &[DocumentChunk]) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }
        let sizes: Vec<usize> = chunks.iter().map(DocumentChunk::char_len).collect();
        let tokens: Vec<usize> = chunks.iter().map(|c| c.token_count).collect();
        let n = chunks.len() as f64;
        Self {
            total_chunks: chunks.len(),
            avg_chunk_size: sizes.iter().sum::<usize>() as f64 / n,
            min_chunk_size: sizes.iter().copied().min().unwrap_or(0),
            max_chunk_size: sizes.iter().copied().max().unwrap_or(0),
            avg_token_count: tokens.iter().sum::<usize>() as f64 / n,
            min_token_count: tokens.iter().copied().min().unwrap_or(0),
            max_token_count: tokens.iter().copied().max().unwrap_or(0),
        }
    }
}

/// Timing and resource telemetry for one (document, strategy) unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingMetadata {
    /// RFC 3339 time the unit finished.
    pub timestamp: String,
    /// Wall-clock seconds.
    pub processing_time: f64,
    /// Resident memory delta in MB.
    pub memory_usage: f64,
    pub cpu_usage_percent: f64,
    pub gpu_usage_percent: f64,
    pub gpu_memory_usage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Chunks plus telemetry for one (document, strategy) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingResult {
    pub strategy_name: String,
    pub document_id: String,
    pub chunks: Vec<DocumentChunk>,
    pub statistics: ChunkStatistics,
    pub processing_metadata: ProcessingMetadata,
}

impl ChunkingResult {
    pub fn is_success(&self) -> bool {
        self.processing_metadata.error.is_none()
    }
}
