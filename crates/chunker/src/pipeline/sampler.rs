//! Process resource sampling around each chunking unit.
//!
//! Readings are process-wide: with several units in flight, one unit's
//! numbers include its neighbours' work.

use std::fs;
use std::sync::OnceLock;
use std::time::Duration;

use chunklab_core::ProcessingMetadata;

/// Used when the auxiliary vector cannot be read.
const DEFAULT_CLOCK_TICKS_PER_SEC: u64 = 100;

/// `AT_CLKTCK`: the kernel's `sysconf(_SC_CLK_TCK)` value.
const AT_CLKTCK: usize = 17;
const AT_NULL: usize = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSample {
    /// Resident set size in MB.
    pub rss_mb: f64,
    /// User + system CPU time consumed so far.
    pub cpu_time_secs: f64,
    pub gpu_percent: f64,
    pub gpu_memory_mb: f64,
}

pub trait ResourceSampler: Send + Sync {
    fn sample(&self) -> ResourceSample;
}

/// Reads `/proc/self`. Fields that cannot be read come back as zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcSampler;

impl ResourceSampler for ProcSampler {
    fn sample(&self) -> ResourceSample {
        ResourceSample {
            rss_mb: read_rss_mb().unwrap_or(0.0),
            cpu_time_secs: read_cpu_secs().unwrap_or(0.0),
            ..Default::default()
        }
    }
}

/// Always zero. Used in tests and where `/proc` is unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSampler;

impl ResourceSampler for NoopSampler {
    fn sample(&self) -> ResourceSample {
        ResourceSample::default()
    }
}

fn read_rss_mb() -> Option<f64> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / 1024.0)
}

fn read_cpu_secs() -> Option<f64> {
    let stat = fs::read_to_string("/proc/self/stat").ok()?;
    // comm may contain spaces; fields restart after the closing paren
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // utime and stime are fields 14 and 15 overall, 12 and 13 after comm
    let utime: f64 = fields.get(11)?.parse().ok()?;
    let stime: f64 = fields.get(12)?.parse().ok()?;
    Some((utime + stime) / clock_ticks_per_sec() as f64)
}

/// Kernel clock ticks per second, read once from `/proc/self/auxv`.
fn clock_ticks_per_sec() -> u64 {
    static TICKS: OnceLock<u64> = OnceLock::new();
    *TICKS.get_or_init(|| {
        fs::read("/proc/self/auxv")
            .ok()
            .and_then(|auxv| parse_clock_ticks(&auxv))
            .unwrap_or(DEFAULT_CLOCK_TICKS_PER_SEC)
    })
}

/// Find `AT_CLKTCK` in a native-endian auxiliary vector of word pairs.
fn parse_clock_ticks(auxv: &[u8]) -> Option<u64> {
    const WORD: usize = std::mem::size_of::<usize>();
    let mut words = auxv
        .chunks_exact(WORD)
        .map(|w| w.try_into().map(usize::from_ne_bytes));
    while let (Some(Ok(key)), Some(Ok(value))) = (words.next(), words.next()) {
        match key {
            AT_NULL => break,
            AT_CLKTCK if value > 0 => return Some(value as u64),
            _ => {}
        }
    }
    None
}

/// Build processing metadata from samples taken before and after a unit.
pub fn measure(before: ResourceSample, after: ResourceSample, elapsed: Duration) -> ProcessingMetadata {
    let wall = elapsed.as_secs_f64();
    let cpu_percent = if wall > 0.0 {
        ((after.cpu_time_secs - before.cpu_time_secs).max(0.0) / wall) * 100.0
    } else {
        0.0
    };
    ProcessingMetadata {
        timestamp: chrono::Utc::now().to_rfc3339(),
        processing_time: wall,
        memory_usage: (after.rss_mb - before.rss_mb).max(0.0),
        cpu_usage_percent: cpu_percent,
        gpu_usage_percent: after.gpu_percent,
        gpu_memory_usage: after.gpu_memory_mb,
        error: None,
    }
}
