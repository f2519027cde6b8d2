use serde::Deserialize;
use tracing::debug;

use chunklab_core::{ChunkMetadata, PositionUnit, StrategyConfig, StrategyKind};

use super::{invalid, ChunkDraft};
use crate::error::ChunkError;
use crate::tokenizer::{approximate_count, TokenCounter, CHARS_PER_TOKEN, DEFAULT_ENCODING};

/// Tokens a window may grow by to avoid splitting a multi-byte character.
const MAX_BOUNDARY_NUDGE: usize = 3;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FixedSizeParams {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub chunk_overlap: usize,
    #[serde(default = "default_encoding")]
    pub encoding_name: String,
}

fn default_chunk_size() -> usize {
    512
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

/// Exact token windows of `chunk_size`, sliding by `chunk_size - chunk_overlap`.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    params: FixedSizeParams,
    counter: TokenCounter,
}

impl FixedSizeChunker {
    pub fn from_config(config: &StrategyConfig) -> Result<Self, ChunkError> {
        let params: FixedSizeParams = config.params()?;
        let counter = TokenCounter::for_encoding(&params.encoding_name);
        Self::new(params, counter)
    }

    pub fn new(params: FixedSizeParams, counter: TokenCounter) -> Result<Self, ChunkError> {
        if params.chunk_size == 0 {
            return Err(invalid(StrategyKind::FixedSize, "chunk_size", "must be greater than 0"));
        }
        if params.chunk_overlap >= params.chunk_size {
            return Err(invalid(
                StrategyKind::FixedSize,
                "chunk_overlap",
                format!(
                    "overlap {} must be smaller than chunk_size {}",
                    params.chunk_overlap, params.chunk_size
                ),
            ));
        }
        Ok(Self { params, counter })
    }

    pub fn counter(&self) -> TokenCounter {
        self.counter
    }

    pub(crate) fn segment(&self, text: &str) -> Result<Vec<ChunkDraft>, ChunkError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        match self.counter {
            TokenCounter::Exact { .. } => self.segment_tokens(text),
            TokenCounter::Approximate => Ok(self.segment_chars(text)),
        }
    }

    fn segment_tokens(&self, text: &str) -> Result<Vec<ChunkDraft>, ChunkError> {
        let tokens = self.counter.encode(text)?;
        let n = tokens.len();
        let size = self.params.chunk_size;
        let overlap = self.params.chunk_overlap;
        let mut drafts = Vec::with_capacity(n.div_ceil(size - overlap));

        let mut start = 0;
        while start < n {
            let end = (start + size).min(n);
            let (decoded, s, e) = self.decode_window(&tokens, start, end)?;
            // Stored untrimmed so the content re-encodes to exactly `e - s` tokens.
            if !decoded.trim().is_empty() {
                let mut metadata = ChunkMetadata::with_unit(PositionUnit::Tokens);
                metadata.tokenizer = Some(self.counter.mode());
                let mut draft = ChunkDraft {
                    content: decoded,
                    start: s,
                    end: e,
                    token_count: e - s,
                    metadata,
                };
                if (s, e) != (start, end) {
                    debug!(start, end, adjusted_start = s, adjusted_end = e, "window moved off a character split");
                    draft.flag("boundary_adjusted", true);
                }
                drafts.push(draft);
            }
            if e >= n {
                break;
            }
            start = e.saturating_sub(overlap).max(s + 1);
        }
        Ok(drafts)
    }

    /// Decode `tokens[start..end]`, nudging either edge forward by a few
    /// tokens when the run would cut a multi-byte character.
    fn decode_window(
        &self,
        tokens: &[u32],
        start: usize,
        end: usize,
    ) -> Result<(String, usize, usize), ChunkError> {
        let n = tokens.len();
        let mut last_err = None;
        for ds in 0..=MAX_BOUNDARY_NUDGE {
            for de in 0..=MAX_BOUNDARY_NUDGE {
                let s = start + ds;
                let e = (end + de).min(n);
                if s >= e {
                    break;
                }
                match self.counter.decode(&tokens[s..e]) {
                    Ok(text) => return Ok((text, s, e)),
                    Err(err) => last_err = Some(err),
                }
                if e == n {
                    break;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ChunkError::Decode(format!("empty window {start}..{end}"))))
    }

    /// Same windowing over characters at 4 chars per token.
    fn segment_chars(&self, text: &str) -> Vec<ChunkDraft> {
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let size = self.params.chunk_size * CHARS_PER_TOKEN;
        let overlap = self.params.chunk_overlap * CHARS_PER_TOKEN;
        let mut drafts = Vec::new();

        let mut start = 0;
        while start < n {
            let end = (start + size).min(n);
            let window: String = chars[start..end].iter().collect();
            if !window.trim().is_empty() {
                let mut metadata = ChunkMetadata::with_unit(PositionUnit::Chars);
                metadata.tokenizer = Some(self.counter.mode());
                let token_count = approximate_count(&window);
                drafts.push(ChunkDraft {
                    content: window,
                    start,
                    end,
                    token_count,
                    metadata,
                });
            }
            if end >= n {
                break;
            }
            start = end - overlap;
        }
        drafts
    }
}
