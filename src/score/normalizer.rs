//! Score normalization
//!
//! Maps raw benchmark metrics onto [1,100] scores against the fixed baseline
//! table. A score of 50 means baseline parity; every component ratio is
//! capped before weighting so a single outlier cannot dominate. Scores are
//! never zero — downstream multiplicative factors divide by them.

use crate::bench::{BenchmarkResult, HardwareProfile};
use crate::score::baseline;
use serde::{Deserialize, Serialize};

/// Normalized performance scores, each in [1,100]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceScore {
    pub cpu_score: f64,
    pub memory_score: f64,
    pub disk_score: f64,
}

/// Clamp a component ratio into (0, RATIO_CAP]
fn capped_ratio(value: f64, baseline: f64) -> f64 {
    (value / baseline).clamp(0.0, baseline::RATIO_CAP)
}

/// Map a weighted composite ratio onto the [1,100] score scale
fn to_score(weighted_ratio: f64) -> f64 {
    (weighted_ratio * 50.0).clamp(1.0, 100.0)
}

/// Normalize raw metrics into per-resource scores
pub fn normalize(bench: &BenchmarkResult, hw: &HardwareProfile) -> PerformanceScore {
    let multi_baseline = baseline::CPU_SINGLE_EVENTS
        * hw.cpu_core_count.max(1) as f64
        * baseline::MULTI_THREAD_EFFICIENCY;

    let cpu_ratios = [
        capped_ratio(bench.cpu_events_single.value, baseline::CPU_SINGLE_EVENTS),
        capped_ratio(bench.cpu_events_multi.value, multi_baseline),
        capped_ratio(bench.cpu_int_mops.value, baseline::CPU_INT_MOPS),
        capped_ratio(bench.cpu_float_mops.value, baseline::CPU_FLOAT_MOPS),
    ];
    let cpu = weighted(&cpu_ratios, &baseline::CPU_WEIGHTS);

    let mem_ratios = [
        capped_ratio(bench.memory_read_mb_s.value, baseline::MEM_READ_MB_S),
        capped_ratio(bench.memory_write_mb_s.value, baseline::MEM_WRITE_MB_S),
        capped_ratio(bench.memory_random_mb_s.value, baseline::MEM_RANDOM_MB_S),
    ];
    let mem = weighted(&mem_ratios, &baseline::MEM_WEIGHTS);

    let disk_baseline = baseline::disk_baseline(hw.disk_class);
    let disk_ratios = [
        capped_ratio(bench.disk_seq_read_mb_s.value, disk_baseline.seq_read_mb_s),
        capped_ratio(bench.disk_seq_write_mb_s.value, disk_baseline.seq_write_mb_s),
        capped_ratio(bench.disk_rand_read_iops.value, disk_baseline.rand_read_iops),
        capped_ratio(bench.disk_rand_write_iops.value, disk_baseline.rand_write_iops),
    ];
    let disk = weighted(&disk_ratios, &disk_baseline.weights);

    PerformanceScore {
        cpu_score: to_score(cpu),
        memory_score: to_score(mem),
        disk_score: to_score(disk),
    }
}

fn weighted(ratios: &[f64], weights: &[f64]) -> f64 {
    ratios.iter().zip(weights).map(|(r, w)| r * w).sum()
}
