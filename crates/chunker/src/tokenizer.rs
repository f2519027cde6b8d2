//! BPE token counting with an explicit approximate fallback.

use std::fmt;
use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;
use tracing::warn;

use chunklab_core::TokenizerMode;

use crate::error::ChunkError;

pub const DEFAULT_ENCODING: &str = "cl100k_base";

/// Characters per token assumed when no encoder is available.
pub const CHARS_PER_TOKEN: usize = 4;

/// Token counter shared by all strategies. Encoders are loaded once per
/// process and reused.
#[derive(Clone, Copy)]
pub enum TokenCounter {
    Exact {
        encoding: &'static str,
        bpe: &'static CoreBPE,
    },
    Approximate,
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenCounter::Exact { encoding, .. } => write!(f, "TokenCounter::Exact({encoding})"),
            TokenCounter::Approximate => f.write_str("TokenCounter::Approximate"),
        }
    }
}

fn load_encoder(name: &str) -> Result<(&'static str, &'static CoreBPE), ChunkError> {
    static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
    static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();
    static P50K: OnceLock<Option<CoreBPE>> = OnceLock::new();
    static P50K_EDIT: OnceLock<Option<CoreBPE>> = OnceLock::new();
    static R50K: OnceLock<Option<CoreBPE>> = OnceLock::new();

    let (encoding, bpe) = match name {
        "cl100k_base" => ("cl100k_base", CL100K.get_or_init(|| tiktoken_rs::cl100k_base().ok())),
        "o200k_base" => ("o200k_base", O200K.get_or_init(|| tiktoken_rs::o200k_base().ok())),
        "p50k_base" => ("p50k_base", P50K.get_or_init(|| tiktoken_rs::p50k_base().ok())),
        "p50k_edit" => ("p50k_edit", P50K_EDIT.get_or_init(|| tiktoken_rs::p50k_edit().ok())),
        "r50k_base" | "gpt2" => ("r50k_base", R50K.get_or_init(|| tiktoken_rs::r50k_base().ok())),
        other => {
            return Err(ChunkError::EncoderUnavailable(format!("unknown encoding `{other}`")))
        }
    };
    bpe.as_ref()
        .map(|bpe| (encoding, bpe))
        .ok_or_else(|| ChunkError::EncoderUnavailable(format!("failed to load `{encoding}`")))
}

impl TokenCounter {
    /// Exact counter for `encoding_name`, or `EncoderUnavailable`.
    pub fn exact(encoding_name: &str) -> Result<Self, ChunkError> {
        let (encoding, bpe) = load_encoder(encoding_name)?;
        Ok(TokenCounter::Exact { encoding, bpe })
    }

    /// Exact counter when the encoding loads, approximate otherwise.
    pub fn for_encoding(encoding_name: &str) -> Self {
        match Self::exact(encoding_name) {
            Ok(counter) => counter,
            Err(e) => {
                warn!(error = %e, encoding = encoding_name, "falling back to approximate token counting");
                TokenCounter::Approximate
            }
        }
    }

    pub fn mode(&self) -> TokenizerMode {
        match self {
            TokenCounter::Exact { .. } => TokenizerMode::Exact,
            TokenCounter::Approximate => TokenizerMode::Approximate,
        }
    }

    pub fn encoding(&self) -> Option<&'static str> {
        match self {
            TokenCounter::Exact { encoding, .. } => Some(encoding),
            TokenCounter::Approximate => None,
        }
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u32>, ChunkError> {
        match self {
            TokenCounter::Exact { bpe, .. } => Ok(bpe
                .encode_ordinary(text)
                .into_iter()
                .map(|t| t as u32)
                .collect()),
            TokenCounter::Approximate => Err(ChunkError::EncoderUnavailable(
                "approximate counter cannot encode".into(),
            )),
        }
    }

    /// Decode a token run. Fails when the run starts or ends inside a
    /// multi-byte character.
    pub fn decode(&self, tokens: &[u32]) -> Result<String, ChunkError> {
        match self {
            TokenCounter::Exact { bpe, .. } => bpe
                .decode(tokens.iter().map(|&t| t as _).collect())
                .map_err(|e| ChunkError::Decode(e.to_string())),
            TokenCounter::Approximate => Err(ChunkError::EncoderUnavailable(
                "approximate counter cannot decode".into(),
            )),
        }
    }

    pub fn count(&self, text: &str) -> usize {
        match self {
            TokenCounter::Exact { bpe, .. } => bpe.encode_ordinary(text).len(),
            TokenCounter::Approximate => approximate_count(text),
        }
    }

    /// Re-encode `content` and compare against the recorded token count.
    pub fn verify_round_trip(&self, content: &str, expected: usize) -> Result<(), ChunkError> {
        let actual = self.count(content);
        if actual == expected {
            Ok(())
        } else {
            Err(ChunkError::EncodingRoundTripDrift { expected, actual })
        }
    }
}

pub fn approximate_count(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}
