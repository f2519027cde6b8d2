//! Sentence embeddings for the semantic strategy.

pub mod batcher;
pub mod cache;
pub mod ollama;
pub mod traits;

pub use batcher::embed_in_batches;
pub use cache::CachedEmbedder;
pub use ollama::OllamaEmbedder;
pub use traits::{cosine_similarity, Embedder, EmbeddingError};
