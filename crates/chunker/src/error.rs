use thiserror::Error;

use chunklab_core::ConfigError;

use crate::embedding::EmbeddingError;

#[derive(Error, Debug)]
pub enum ChunkError {
    /// The requested BPE encoding could not be loaded. Strategies recover by
    /// switching to approximate counting.
    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("chunking failed for {document_id} ({strategy}): {reason}")]
    ChunkingFailure {
        document_id: String,
        strategy: String,
        reason: String,
    },

    #[error("token decode failed: {0}")]
    Decode(String),

    #[error("token count drift: chunk reports {expected} tokens, re-encoding gives {actual}")]
    EncodingRoundTripDrift { expected: usize, actual: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
