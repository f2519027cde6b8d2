use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::debug;

use chunklab_core::{
    ChunkMetadata, Element, ExtractedDocument, PositionUnit, StrategyConfig, StrategyKind,
};

use super::hierarchical::{HierarchicalChunker, HierarchicalParams};
use super::{invalid, ChunkDraft};
use crate::error::ChunkError;
use crate::text::normalize;
use crate::tokenizer::{TokenCounter, DEFAULT_ENCODING};

/// Sizes used when a document has no elements and plain text is split instead.
const FALLBACK_CHUNK_SIZE: usize = 1000;
const FALLBACK_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ElementBasedParams {
    #[serde(default = "default_max_elements")]
    pub max_elements_per_chunk: usize,
    #[serde(default = "default_overlap_percentage")]
    pub overlap_percentage: f64,
    #[serde(default = "default_priority_types")]
    pub priority_element_types: Vec<String>,
    #[serde(default = "default_encoding")]
    pub encoding_name: String,
}

fn default_max_elements() -> usize {
    10
}

fn default_overlap_percentage() -> f64 {
    0.2
}

fn default_priority_types() -> Vec<String> {
    ["Title", "Header", "NarrativeText"].iter().map(|s| s.to_string()).collect()
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

/// Sliding windows over the extractor's structural elements.
#[derive(Debug, Clone)]
pub struct ElementBasedChunker {
    params: ElementBasedParams,
    counter: TokenCounter,
    fallback: HierarchicalChunker,
}

impl ElementBasedChunker {
    pub fn from_config(config: &StrategyConfig) -> Result<Self, ChunkError> {
        let params: ElementBasedParams = config.params()?;
        let counter = TokenCounter::for_encoding(&params.encoding_name);
        Self::new(params, counter)
    }

    pub fn new(params: ElementBasedParams, counter: TokenCounter) -> Result<Self, ChunkError> {
        if params.max_elements_per_chunk == 0 {
            return Err(invalid(
                StrategyKind::ElementBased,
                "max_elements_per_chunk",
                "must be greater than 0",
            ));
        }
        if !(0.0..1.0).contains(&params.overlap_percentage) {
            return Err(invalid(
                StrategyKind::ElementBased,
                "overlap_percentage",
                format!("{} is outside [0, 1)", params.overlap_percentage),
            ));
        }
        let fallback = HierarchicalChunker::new(
            HierarchicalParams::sized(FALLBACK_CHUNK_SIZE, FALLBACK_CHUNK_OVERLAP),
            counter,
        )?;
        Ok(Self {
            params,
            counter,
            fallback,
        })
    }

    /// Elements shared between consecutive chunks: `round(p * max)`, at least
    /// one when `p > 0`, always fewer than `max`.
    pub fn overlap_count(&self) -> usize {
        let max = self.params.max_elements_per_chunk;
        let p = self.params.overlap_percentage;
        let mut count = (p * max as f64).round() as usize;
        if p > 0.0 {
            count = count.max(1);
        }
        count.min(max - 1)
    }

    fn is_priority(&self, element: &Element) -> bool {
        self.params
            .priority_element_types
            .iter()
            .any(|t| t == &element.element_type)
    }

    /// Inclusive element ranges covered by each chunk.
    pub fn windows(&self, elements: &[Element]) -> Vec<(usize, usize)> {
        let n = elements.len();
        let max = self.params.max_elements_per_chunk;
        let overlap = self.overlap_count();
        let mut windows = Vec::new();
        if n == 0 {
            return windows;
        }

        let mut start = 0;
        loop {
            let end = (start + max).min(n) - 1;
            windows.push((start, end));
            if end == n - 1 {
                break;
            }
            let candidate = end + 1 - overlap;
            let mut next = candidate;
            if !self.is_priority(&elements[candidate]) {
                // Pull the start back onto a nearby priority element, never
                // past the overlap region or onto the previous start.
                let floor = candidate.saturating_sub(overlap).max(start + 1);
                if let Some(anchor) = (floor..candidate).rev().find(|&i| self.is_priority(&elements[i])) {
                    next = anchor;
                }
            }
            start = next;
        }
        windows
    }

    pub(crate) fn segment(&self, doc: &ExtractedDocument) -> Vec<ChunkDraft> {
        if !doc.has_elements() {
            debug!(document_id = %doc.document_id, "no elements, falling back to text splitting");
            let mut drafts = self.fallback.segment(&normalize(&doc.full_text));
            for draft in &mut drafts {
                draft.flag("fallback", StrategyKind::Hierarchical.as_str());
            }
            return drafts;
        }

        self.windows(&doc.elements)
            .into_iter()
            .map(|(start, end)| self.draft(&doc.elements[start..=end], start, end))
            .filter(|draft| !draft.content.is_empty())
            .collect()
    }

    fn draft(&self, group: &[Element], start: usize, end: usize) -> ChunkDraft {
        let content = group
            .iter()
            .map(|e| e.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        let pages: BTreeSet<u32> = group.iter().filter_map(Element::page).collect();

        let mut metadata = ChunkMetadata::with_unit(PositionUnit::Elements);
        metadata.tokenizer = Some(self.counter.mode());
        metadata.source_elements = group.iter().map(|e| e.element_type.clone()).collect();
        metadata.page_numbers = pages.into_iter().collect();
        metadata.extra.insert("element_count".into(), group.len().into());

        ChunkDraft {
            token_count: self.counter.count(&content),
            content,
            start,
            end: end + 1,
            metadata,
        }
    }
}
