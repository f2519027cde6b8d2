//! Performance aggregation over persisted processing telemetry.
//!
//! Records carry their unit's telemetry on every chunk, so the analyzer
//! first collapses them back into one entry per
//! (document, extraction method, strategy) unit. Nothing here re-runs
//! chunking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use chunklab_core::IndexableRecord;

// ── Units ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct UnitTelemetry {
    extraction_method: String,
    strategy: String,
    processing_time: f64,
    memory_usage: f64,
    cpu_usage_percent: f64,
    gpu_usage_percent: f64,
    chunks: usize,
}

impl UnitTelemetry {
    fn chunks_per_second(&self) -> Option<f64> {
        (self.processing_time > 0.0).then(|| self.chunks as f64 / self.processing_time)
    }
}

// ── Summaries ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl MetricSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        Some(Self {
            min: sorted[0],
            max: sorted[n - 1],
            mean: sorted.iter().sum::<f64>() / n as f64,
            median,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub units: usize,
    pub total_chunks: usize,
    pub avg_chunks_per_unit: f64,
    pub processing_time: MetricSummary,
    pub memory_usage: MetricSummary,
    pub cpu_usage_percent: MetricSummary,
    pub gpu_usage_percent: MetricSummary,
    /// Absent when no unit recorded a positive processing time.
    pub chunks_per_second: Option<MetricSummary>,
}

impl GroupStats {
    fn from_units(units: &[&UnitTelemetry]) -> Option<Self> {
        let metric = |f: fn(&UnitTelemetry) -> f64| {
            MetricSummary::from_values(&units.iter().map(|u| f(u)).collect::<Vec<_>>())
        };
        let rates: Vec<f64> = units.iter().filter_map(|u| u.chunks_per_second()).collect();
        let total_chunks: usize = units.iter().map(|u| u.chunks).sum();
        Some(Self {
            units: units.len(),
            total_chunks,
            avg_chunks_per_unit: total_chunks as f64 / units.len().max(1) as f64,
            processing_time: metric(|u| u.processing_time)?,
            memory_usage: metric(|u| u.memory_usage)?,
            cpu_usage_percent: metric(|u| u.cpu_usage_percent)?,
            gpu_usage_percent: metric(|u| u.gpu_usage_percent)?,
            chunks_per_second: MetricSummary::from_values(&rates),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub total_units: usize,
    pub by_strategy: BTreeMap<String, GroupStats>,
    pub by_extraction_method: BTreeMap<String, GroupStats>,
}

/// `b - a` deltas of mean figures, plus the winner on each axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub strategy_a: String,
    pub strategy_b: String,
    pub stats_a: GroupStats,
    pub stats_b: GroupStats,
    pub processing_time_delta: f64,
    /// `b / a` mean processing time; absent when `a` took no time.
    pub processing_time_ratio: Option<f64>,
    pub memory_usage_delta: f64,
    pub chunks_per_unit_delta: f64,
    pub faster_strategy: String,
    pub more_memory_efficient: String,
    pub denser_strategy: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    MinimizeTime,
    MinimizeMemory,
    /// Most chunks per document.
    MaximizeChunkDensity,
}

// ── Analyzer ────────────────────────────────────────────────────────────────

pub struct PerformanceAnalyzer {
    units: Vec<UnitTelemetry>,
}

impl PerformanceAnalyzer {
    pub fn from_records(records: &[IndexableRecord]) -> Self {
        let mut units: BTreeMap<(&str, &str, &str), UnitTelemetry> = BTreeMap::new();
        for r in records {
            let key = (
                r.document_id.as_str(),
                r.extraction_method.as_str(),
                r.chunking_strategy.as_str(),
            );
            let unit = units.entry(key).or_insert_with(|| UnitTelemetry {
                extraction_method: r.extraction_method.clone(),
                strategy: r.chunking_strategy.clone(),
                processing_time: r.processing_time,
                memory_usage: r.memory_usage,
                cpu_usage_percent: r.cpu_usage_percent,
                gpu_usage_percent: r.gpu_usage_percent,
                chunks: 0,
            });
            unit.chunks = unit.chunks.max(r.total_chunks).max(r.chunk_index + 1);
        }
        Self {
            units: units.into_values().collect(),
        }
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    fn group_by<'a>(&'a self, key: impl Fn(&'a UnitTelemetry) -> &'a str) -> BTreeMap<String, GroupStats> {
        let mut groups: BTreeMap<&str, Vec<&UnitTelemetry>> = BTreeMap::new();
        for unit in &self.units {
            groups.entry(key(unit)).or_default().push(unit);
        }
        groups
            .into_iter()
            .filter_map(|(name, units)| Some((name.to_string(), GroupStats::from_units(&units)?)))
            .collect()
    }

    pub fn summarize(&self) -> PerformanceSummary {
        PerformanceSummary {
            total_units: self.units.len(),
            by_strategy: self.group_by(|u| u.strategy.as_str()),
            by_extraction_method: self.group_by(|u| u.extraction_method.as_str()),
        }
    }

    pub fn strategy_stats(&self, strategy: &str) -> Option<GroupStats> {
        let units: Vec<&UnitTelemetry> = self.units.iter().filter(|u| u.strategy == strategy).collect();
        GroupStats::from_units(&units)
    }

    /// Compare two strategies; `None` if either has no telemetry.
    pub fn compare(&self, strategy_a: &str, strategy_b: &str) -> Option<ComparisonReport> {
        let a = self.strategy_stats(strategy_a)?;
        let b = self.strategy_stats(strategy_b)?;

        // equal figures go to the lexicographically first name
        let pick = |a_wins: bool, b_wins: bool| -> String {
            let first = strategy_a.min(strategy_b);
            if a_wins {
                strategy_a.to_string()
            } else if b_wins {
                strategy_b.to_string()
            } else {
                first.to_string()
            }
        };
        let (ta, tb) = (a.processing_time.mean, b.processing_time.mean);
        let (ma, mb) = (a.memory_usage.mean, b.memory_usage.mean);
        let (da, db) = (a.avg_chunks_per_unit, b.avg_chunks_per_unit);

        Some(ComparisonReport {
            strategy_a: strategy_a.to_string(),
            strategy_b: strategy_b.to_string(),
            processing_time_delta: tb - ta,
            processing_time_ratio: (ta > 0.0).then(|| tb / ta),
            memory_usage_delta: mb - ma,
            chunks_per_unit_delta: db - da,
            faster_strategy: pick(ta < tb, tb < ta),
            more_memory_efficient: pick(ma < mb, mb < ma),
            denser_strategy: pick(da > db, db > da),
            stats_a: a,
            stats_b: b,
        })
    }

    /// Best strategy for `objective`; ties resolve to the lexicographically
    /// first name.
    pub fn find_optimal(&self, objective: Objective) -> Option<String> {
        let summary = self.summarize();
        let score = |s: &GroupStats| match objective {
            Objective::MinimizeTime => s.processing_time.mean,
            Objective::MinimizeMemory => s.memory_usage.mean,
            Objective::MaximizeChunkDensity => -s.avg_chunks_per_unit,
        };
        let mut best: Option<(&String, f64)> = None;
        for (name, stats) in &summary.by_strategy {
            let value = score(stats);
            if best.map_or(true, |(_, b)| value < b) {
                best = Some((name, value));
            }
        }
        best.map(|(name, _)| name.clone())
    }
}
