//! Baseline constants for score normalization
//!
//! One consistent table, chosen once: a component ratio of 1.0 means the
//! host matches the baseline, yielding a composite score of 50. Disk
//! baselines differ by media class and are selected through the hardware
//! profile's disk class.

use crate::bench::DiskClass;

/// Ratio cap applied to every normalized component before weighting, so one
/// outlier metric cannot dominate the composite score
pub const RATIO_CAP: f64 = 2.0;

/// Multi-thread scaling efficiency relative to a perfect linear speedup
pub const MULTI_THREAD_EFFICIENCY: f64 = 0.75;

/// CPU baselines
pub const CPU_SINGLE_EVENTS: f64 = 1000.0;
pub const CPU_INT_MOPS: f64 = 1200.0;
pub const CPU_FLOAT_MOPS: f64 = 800.0;

/// Memory baselines in MB/s
pub const MEM_READ_MB_S: f64 = 5000.0;
pub const MEM_WRITE_MB_S: f64 = 4000.0;
pub const MEM_RANDOM_MB_S: f64 = 1500.0;

/// Disk baselines for one media class
#[derive(Debug, Clone, Copy)]
pub struct DiskBaseline {
    pub seq_read_mb_s: f64,
    pub seq_write_mb_s: f64,
    pub rand_read_iops: f64,
    pub rand_write_iops: f64,
    /// Component weights: seq read, seq write, rand read, rand write
    pub weights: [f64; 4],
}

/// Baseline table entry for a disk class
///
/// On rotating media the random-IOPS weights exceed the sequential weights:
/// server workloads are IOPS-bound, and an HDD that seeks well matters more
/// than one that streams well.
pub fn disk_baseline(class: DiskClass) -> DiskBaseline {
    match class {
        DiskClass::Ssd => DiskBaseline {
            seq_read_mb_s: 500.0,
            seq_write_mb_s: 450.0,
            rand_read_iops: 40_000.0,
            rand_write_iops: 35_000.0,
            weights: [0.3, 0.2, 0.3, 0.2],
        },
        DiskClass::Hdd => DiskBaseline {
            seq_read_mb_s: 150.0,
            seq_write_mb_s: 120.0,
            rand_read_iops: 180.0,
            rand_write_iops: 160.0,
            weights: [0.15, 0.15, 0.40, 0.30],
        },
    }
}

/// CPU component weights: single, multi, integer, float
pub const CPU_WEIGHTS: [f64; 4] = [0.4, 0.4, 0.1, 0.1];

/// Memory component weights: read, write, random
pub const MEM_WEIGHTS: [f64; 3] = [0.4, 0.4, 0.2];

#[cfg(test)]
mod tests {
    use super::*;

    fn sums_to_one(weights: &[f64]) -> bool {
        (weights.iter().sum::<f64>() - 1.0).abs() < 1e-9
    }

    #[test]
    fn test_weights_sum_to_one() {
        assert!(sums_to_one(&CPU_WEIGHTS));
        assert!(sums_to_one(&MEM_WEIGHTS));
        assert!(sums_to_one(&disk_baseline(DiskClass::Ssd).weights));
        assert!(sums_to_one(&disk_baseline(DiskClass::Hdd).weights));
    }

    #[test]
    fn test_multi_thread_weight_ties_single() {
        assert!(CPU_WEIGHTS[1] >= CPU_WEIGHTS[0]);
    }

    #[test]
    fn test_hdd_random_weight_exceeds_sequential() {
        let hdd = disk_baseline(DiskClass::Hdd);
        assert!(hdd.weights[2] > hdd.weights[0]);
        assert!(hdd.weights[3] > hdd.weights[1]);
    }

    #[test]
    fn test_memory_read_write_weighted_at_least_random() {
        assert!(MEM_WEIGHTS[0] >= MEM_WEIGHTS[2]);
        assert!(MEM_WEIGHTS[1] >= MEM_WEIGHTS[2]);
    }
}
