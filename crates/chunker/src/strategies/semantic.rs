use std::ops::Range;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use chunklab_core::{ChunkMetadata, PositionUnit, StrategyConfig, StrategyKind};

use super::{invalid, ChunkDraft};
use crate::embedding::{cosine_similarity, embed_in_batches, Embedder};
use crate::error::ChunkError;
use crate::text::{sentence_spans, CharOffsets};
use crate::tokenizer::{TokenCounter, DEFAULT_ENCODING};

/// How similarity scores between neighbouring sentences become breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointMode {
    /// Break wherever similarity drops below `similarity_threshold`.
    Threshold,
    /// Break where the cosine distance reaches the `breakpoint_percentile`
    /// of all distances in the document.
    Percentile,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SemanticParams {
    #[serde(default = "default_model")]
    pub embedding_model: String,
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_mode")]
    pub breakpoint_mode: BreakpointMode,
    #[serde(default = "default_percentile")]
    pub breakpoint_percentile: f32,
    #[serde(default = "default_encoding")]
    pub encoding_name: String,
}

fn default_model() -> String {
    "all-minilm".to_string()
}

fn default_threshold() -> f32 {
    0.8
}

fn default_min_chunk_size() -> usize {
    200
}

fn default_max_chunk_size() -> usize {
    2000
}

fn default_batch_size() -> usize {
    32
}

fn default_mode() -> BreakpointMode {
    BreakpointMode::Threshold
}

fn default_percentile() -> f32 {
    0.95
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

/// Groups consecutive sentences whose embeddings stay similar. Group sizes
/// are measured in characters.
pub struct SemanticChunker {
    params: SemanticParams,
    embedder: Arc<dyn Embedder>,
    counter: TokenCounter,
}

impl SemanticChunker {
    pub fn from_config(config: &StrategyConfig, embedder: Arc<dyn Embedder>) -> Result<Self, ChunkError> {
        let params: SemanticParams = config.params()?;
        let counter = TokenCounter::for_encoding(&params.encoding_name);
        Self::new(params, embedder, counter)
    }

    pub fn new(
        params: SemanticParams,
        embedder: Arc<dyn Embedder>,
        counter: TokenCounter,
    ) -> Result<Self, ChunkError> {
        let kind = StrategyKind::Semantic;
        if !(0.0..=1.0).contains(&params.similarity_threshold) {
            return Err(invalid(kind, "similarity_threshold", "must lie in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&params.breakpoint_percentile) {
            return Err(invalid(kind, "breakpoint_percentile", "must lie in [0, 1]"));
        }
        if params.min_chunk_size >= params.max_chunk_size {
            return Err(invalid(
                kind,
                "min_chunk_size",
                format!(
                    "min_chunk_size {} must be smaller than max_chunk_size {}",
                    params.min_chunk_size, params.max_chunk_size
                ),
            ));
        }
        if params.batch_size == 0 {
            return Err(invalid(kind, "batch_size", "must be greater than 0"));
        }
        Ok(Self {
            params,
            embedder,
            counter,
        })
    }

    pub(crate) async fn segment(&self, text: &str) -> Result<Vec<ChunkDraft>, ChunkError> {
        let spans = sentence_spans(text);
        if spans.is_empty() {
            return Ok(Vec::new());
        }

        let similarities = if spans.len() > 1 {
            let sentences: Vec<&str> = spans.iter().map(|r| &text[r.clone()]).collect();
            let vectors = embed_in_batches(self.embedder.as_ref(), &sentences, self.params.batch_size).await?;
            vectors
                .windows(2)
                .map(|pair| cosine_similarity(&pair[0], &pair[1]))
                .collect::<Result<Vec<f32>, _>>()?
        } else {
            Vec::new()
        };

        let mut offsets = CharOffsets::new(text);
        let char_spans: Vec<Range<usize>> = spans
            .iter()
            .map(|r| offsets.char_offset(r.start)..offsets.char_offset(r.end))
            .collect();
        let groups = self.group(&char_spans, &similarities);
        debug!(sentences = spans.len(), chunks = groups.len(), "semantic grouping done");
        Ok(self.drafts(text, &spans, &similarities, groups))
    }

    /// Sentence-index ranges of the final chunks. `spans` are the sentences'
    /// char ranges.
    pub(crate) fn group(&self, spans: &[Range<usize>], similarities: &[f32]) -> Vec<Range<usize>> {
        let breaks = self.breakpoints(similarities);
        let mut groups = Vec::with_capacity(breaks.len() + 1);
        let mut start = 0;
        for b in breaks {
            groups.push(start..b + 1);
            start = b + 1;
        }
        groups.push(start..spans.len());

        let merged = self.merge_small(spans, groups);
        let mut out = Vec::with_capacity(merged.len());
        for group in merged {
            self.split_large(spans, similarities, group, &mut out);
        }
        out
    }

    /// Indices `i` such that a chunk ends after sentence `i`.
    fn breakpoints(&self, similarities: &[f32]) -> Vec<usize> {
        match self.params.breakpoint_mode {
            BreakpointMode::Threshold => similarities
                .iter()
                .enumerate()
                .filter(|(_, &s)| s < self.params.similarity_threshold)
                .map(|(i, _)| i)
                .collect(),
            BreakpointMode::Percentile => {
                if similarities.is_empty() {
                    return Vec::new();
                }
                let distances: Vec<f32> = similarities.iter().map(|s| 1.0 - s).collect();
                let mut sorted = distances.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let idx = ((sorted.len() - 1) as f32 * self.params.breakpoint_percentile).round() as usize;
                let cutoff = sorted[idx.min(sorted.len() - 1)];
                distances
                    .iter()
                    .enumerate()
                    .filter(|(_, &d)| d > 0.0 && d >= cutoff)
                    .map(|(i, _)| i)
                    .collect()
            }
        }
    }

    /// Fold groups shorter than `min_chunk_size` into their predecessor (the
    /// first group absorbs its successor instead).
    fn merge_small(&self, spans: &[Range<usize>], groups: Vec<Range<usize>>) -> Vec<Range<usize>> {
        let min = self.params.min_chunk_size;
        let len = |g: &Range<usize>| spans[g.end - 1].end - spans[g.start].start;
        let mut merged: Vec<Range<usize>> = Vec::with_capacity(groups.len());
        for group in groups {
            let absorb = merged
                .last()
                .is_some_and(|last| len(last) < min || len(&group) < min);
            match merged.last_mut() {
                Some(last) if absorb => last.end = group.end,
                _ => merged.push(group),
            }
        }
        merged
    }

    /// Split a group longer than `max_chunk_size` at its weakest internal
    /// similarity, recursively, until it fits or is a single sentence.
    fn split_large(
        &self,
        spans: &[Range<usize>],
        similarities: &[f32],
        group: Range<usize>,
        out: &mut Vec<Range<usize>>,
    ) {
        let len = spans[group.end - 1].end - spans[group.start].start;
        if len <= self.params.max_chunk_size || group.len() < 2 {
            out.push(group);
            return;
        }
        let weakest = (group.start..group.end - 1)
            .min_by(|&a, &b| similarities[a].total_cmp(&similarities[b]))
            .unwrap_or(group.start);
        self.split_large(spans, similarities, group.start..weakest + 1, out);
        self.split_large(spans, similarities, weakest + 1..group.end, out);
    }

    fn drafts(
        &self,
        text: &str,
        spans: &[Range<usize>],
        similarities: &[f32],
        groups: Vec<Range<usize>>,
    ) -> Vec<ChunkDraft> {
        let mut offsets = CharOffsets::new(text);
        groups
            .into_iter()
            .map(|group| {
                let byte_start = spans[group.start].start;
                let byte_end = spans[group.end - 1].end;
                let content = &text[byte_start..byte_end];
                let start = offsets.char_offset(byte_start);
                let end = offsets.char_offset(byte_end);

                let mut metadata = ChunkMetadata::with_unit(PositionUnit::Chars);
                metadata.tokenizer = Some(self.counter.mode());
                metadata.semantic_score = similarities.get(group.end - 1).copied();
                metadata.extra.insert("sentence_count".into(), group.len().into());

                ChunkDraft {
                    content: content.to_string(),
                    start,
                    end,
                    token_count: self.counter.count(content),
                    metadata,
                }
            })
            .collect()
    }
}
