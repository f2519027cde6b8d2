//! Turns chunk artifacts into flat search-engine records and analyses the
//! processing telemetry they carry.

pub mod analyzer;
pub mod error;
pub mod processor;
pub mod sink;

pub use analyzer::{
    ComparisonReport, GroupStats, MetricSummary, Objective, PerformanceAnalyzer, PerformanceSummary,
};
pub use error::IndexError;
pub use processor::{ArtifactDataProcessor, ArtifactLocation, BatchReport, IndexBatch};
pub use sink::{JsonlCollection, SinkReport};
