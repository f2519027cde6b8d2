use std::collections::BTreeMap;

use serde::Serialize;

use chunklab_core::{ChunkingResult, StrategyKind};

use crate::quality;

/// Per-strategy outcome counts and running averages for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StrategyStatistics {
    pub documents: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_chunks: usize,
    /// Mean wall-clock seconds over processed (not skipped) documents.
    pub avg_processing_time: f64,
    /// Mean chunk length in characters over all chunks.
    pub avg_chunk_size: f64,
    pub avg_token_count: f64,
    /// Mean heuristic quality score over all chunks.
    pub avg_quality: f64,
}

impl StrategyStatistics {
    pub fn success_rate(&self) -> f64 {
        let processed = self.succeeded + self.failed;
        if processed == 0 {
            0.0
        } else {
            self.succeeded as f64 / processed as f64
        }
    }

    pub fn avg_chunks_per_document(&self) -> f64 {
        if self.succeeded == 0 {
            0.0
        } else {
            self.total_chunks as f64 / self.succeeded as f64
        }
    }

    /// Fold one processed result into the running figures.
    pub fn record(&mut self, result: &ChunkingResult) {
        self.documents += 1;
        if !result.is_success() {
            self.failed += 1;
        } else {
            self.succeeded += 1;
        }

        // Incremental mean: new_avg = prev_avg + (x - prev_avg) / count
        let processed = (self.succeeded + self.failed) as f64;
        let time = result.processing_metadata.processing_time;
        self.avg_processing_time += (time - self.avg_processing_time) / processed;

        for chunk in &result.chunks {
            self.total_chunks += 1;
            let n = self.total_chunks as f64;
            self.avg_chunk_size += (chunk.char_len() as f64 - self.avg_chunk_size) / n;
            self.avg_token_count += (chunk.token_count as f64 - self.avg_token_count) / n;
            let score = quality::score_chunk(chunk).score;
            self.avg_quality += (score - self.avg_quality) / n;
        }
    }

    pub fn record_skipped(&mut self) {
        self.documents += 1;
        self.skipped += 1;
    }
}

/// Statistics for every strategy touched by a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStatistics {
    pub by_strategy: BTreeMap<StrategyKind, StrategyStatistics>,
}

impl RunStatistics {
    pub fn entry(&mut self, strategy: StrategyKind) -> &mut StrategyStatistics {
        self.by_strategy.entry(strategy).or_default()
    }

    pub fn get(&self, strategy: StrategyKind) -> Option<&StrategyStatistics> {
        self.by_strategy.get(&strategy)
    }

    pub fn total_chunks(&self) -> usize {
        self.by_strategy.values().map(|s| s.total_chunks).sum()
    }

    pub fn failed(&self) -> usize {
        self.by_strategy.values().map(|s| s.failed).sum()
    }
}
