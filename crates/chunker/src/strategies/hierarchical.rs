use std::collections::VecDeque;

use serde::{Deserialize, Deserializer};
use tracing::debug;

use chunklab_core::{ChunkMetadata, PositionUnit, StrategyConfig, StrategyKind};

use super::{invalid, ChunkDraft};
use crate::error::ChunkError;
use crate::text::{byte_offset, CharOffsets};
use crate::tokenizer::{TokenCounter, DEFAULT_ENCODING};

/// Where a separator ends up once the text is split on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepSeparator {
    /// Dropped; pieces are re-joined with it when merged.
    None,
    /// Prefixed to the following piece.
    Start,
    /// Appended to the preceding piece.
    End,
}

/// Accepts `"none" | "start" | "end"` as well as a boolean (`true` = start).
fn keep_separator_compat<'de, D: Deserializer<'de>>(d: D) -> Result<KeepSeparator, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Flag(bool),
        Mode(KeepSeparator),
    }
    Ok(match Repr::deserialize(d)? {
        Repr::Flag(true) => KeepSeparator::Start,
        Repr::Flag(false) => KeepSeparator::None,
        Repr::Mode(mode) => mode,
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HierarchicalParams {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
    #[serde(default = "default_keep_separator", deserialize_with = "keep_separator_compat")]
    pub keep_separator: KeepSeparator,
    #[serde(default = "default_encoding")]
    pub encoding_name: String,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ". ", " ", ""].iter().map(|s| s.to_string()).collect()
}

fn default_keep_separator() -> KeepSeparator {
    KeepSeparator::End
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

impl HierarchicalParams {
    pub fn sized(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: default_separators(),
            keep_separator: default_keep_separator(),
            encoding_name: default_encoding(),
        }
    }
}

/// Recursive separator splitting with character-length merging. Pieces are
/// split on the first separator present, oversized pieces recurse with the
/// remaining separators, and small pieces are merged back up to `chunk_size`
/// carrying up to `chunk_overlap` characters into the next chunk.
#[derive(Debug, Clone)]
pub struct HierarchicalChunker {
    params: HierarchicalParams,
    counter: TokenCounter,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl HierarchicalChunker {
    pub fn from_config(config: &StrategyConfig) -> Result<Self, ChunkError> {
        let params: HierarchicalParams = config.params()?;
        let counter = TokenCounter::for_encoding(&params.encoding_name);
        Self::new(params, counter)
    }

    pub fn new(params: HierarchicalParams, counter: TokenCounter) -> Result<Self, ChunkError> {
        if params.chunk_size == 0 {
            return Err(invalid(StrategyKind::Hierarchical, "chunk_size", "must be greater than 0"));
        }
        if params.chunk_overlap >= params.chunk_size {
            return Err(invalid(
                StrategyKind::Hierarchical,
                "chunk_overlap",
                format!(
                    "overlap {} must be smaller than chunk_size {}",
                    params.chunk_overlap, params.chunk_size
                ),
            ));
        }
        if params.separators.is_empty() {
            return Err(invalid(StrategyKind::Hierarchical, "separators", "must not be empty"));
        }
        Ok(Self { params, counter })
    }

    pub(crate) fn segment(&self, text: &str) -> Vec<ChunkDraft> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let pieces = self.split_text(text, &self.params.separators);
        self.locate(text, pieces)
    }

    /// Recursive split, returning chunk strings in document order.
    pub fn split_text(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits = split_on(text, separator, self.params.keep_separator);
        let merge_separator = match self.params.keep_separator {
            KeepSeparator::None => separator,
            _ => "",
        };

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in splits {
            if char_len(piece) < self.params.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge_splits(&small, merge_separator));
                small.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_text(piece, remaining));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge_splits(&small, merge_separator));
        }
        chunks
    }

    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let size = self.params.chunk_size;
        let overlap = self.params.chunk_overlap;
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            let joined_len = |current: &VecDeque<&str>, total: usize| {
                total + len + if current.is_empty() { 0 } else { sep_len }
            };
            if joined_len(&current, total) > size {
                if total > size {
                    debug!(total, chunk_size = size, "merged chunk exceeds chunk_size");
                }
                if !current.is_empty() {
                    if let Some(doc) = join(&current, separator) {
                        docs.push(doc);
                    }
                    while total > overlap || (joined_len(&current, total) > size && total > 0) {
                        let Some(first) = current.pop_front() else {
                            break;
                        };
                        let sep = if current.is_empty() { 0 } else { sep_len };
                        total = total.saturating_sub(char_len(first) + sep);
                    }
                }
            }
            current.push_back(piece);
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }
        if let Some(doc) = join(&current, separator) {
            docs.push(doc);
        }
        docs
    }

    /// Find each chunk in the source to assign char positions, searching
    /// forward from where the previous chunk's overlap could begin.
    fn locate(&self, text: &str, pieces: Vec<String>) -> Vec<ChunkDraft> {
        let mut offsets = CharOffsets::new(text);
        let mut previous: Option<(usize, usize)> = None;
        let mut drafts = Vec::with_capacity(pieces.len());

        for content in pieces {
            let len = char_len(&content);
            let from_char = previous
                .map(|(start, len)| (start + len).saturating_sub(self.params.chunk_overlap).max(start + 1))
                .unwrap_or(0);
            let from_byte = byte_offset(text, from_char);
            let found = text[from_byte..]
                .find(content.as_str())
                .map(|rel| from_byte + rel)
                .or_else(|| text.find(content.as_str()));
            let start = match found {
                Some(byte) => offsets.char_offset(byte),
                None => {
                    debug!(from_char, "chunk not found verbatim in source");
                    from_char
                }
            };

            let mut metadata = ChunkMetadata::with_unit(PositionUnit::Chars);
            metadata.tokenizer = Some(self.counter.mode());
            drafts.push(ChunkDraft {
                token_count: self.counter.count(&content),
                content,
                start,
                end: start + len,
                metadata,
            });
            previous = Some((start, len));
        }
        drafts
    }
}

fn join(pieces: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split on a literal separator, keeping it on the chosen side. An empty
/// separator splits into characters. Empty pieces are dropped.
fn split_on<'a>(text: &'a str, separator: &str, keep: KeepSeparator) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let pieces: Vec<&str> = match keep {
        KeepSeparator::None => text.split(separator).collect(),
        KeepSeparator::End => text.split_inclusive(separator).collect(),
        KeepSeparator::Start => {
            let mut out = Vec::new();
            let mut last = 0;
            for (idx, _) in text.match_indices(separator) {
                out.push(&text[last..idx]);
                last = idx;
            }
            out.push(&text[last..]);
            out
        }
    };
    pieces.into_iter().filter(|p| !p.is_empty()).collect()
}
