//! Chunking engine: four segmentation strategies, the embedding backends the
//! semantic strategy needs, and the pipeline that runs every
//! (document, strategy) unit and persists its artifact.

pub mod embedding;
pub mod error;
pub mod pipeline;
pub mod quality;
pub mod strategies;
pub mod text;
pub mod tokenizer;

pub use error::{ChunkError, PipelineError};
pub use pipeline::{ChunkingPipeline, RunReport};
pub use strategies::ChunkingStrategy;
pub use tokenizer::TokenCounter;
