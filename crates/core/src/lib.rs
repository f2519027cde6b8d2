pub mod artifact;
pub mod chunk;
pub mod config;
pub mod document;
pub mod error;
pub mod record;
pub mod strategy;

pub use artifact::*;
pub use chunk::*;
pub use config::{ChunkingConfig, Config};
pub use document::*;
pub use error::*;
pub use record::*;
pub use strategy::*;
