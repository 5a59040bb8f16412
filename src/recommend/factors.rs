//! Swap sizing factors
//!
//! The swap base is a step function of RAM; three independent multiplicative
//! factors then scale it. Each factor is inversely related to the matching
//! resource score: a weak resource means the host will lean on swap harder,
//! so it gets more of it. The disk factor has the widest range because
//! random IOPS is the dominant constraint on swap usability.

/// Swap base size in MB as a step function of total RAM
///
/// Smaller hosts get a larger multiple of RAM; above 64 GiB the base
/// flattens to a fixed floor.
pub fn swap_base_mb(total_ram_mb: u64) -> u64 {
    match total_ram_mb {
        r if r < 1024 => r * 2,
        r if r < 2048 => r * 3 / 2,
        r if r < 4096 => r * 5 / 4,
        r if r < 8192 => r,
        r if r < 16384 => r * 3 / 4,
        r if r < 32768 => r / 2,
        r if r < 65536 => r / 4,
        r if r < 131072 => 8192,
        _ => 16384,
    }
}

/// CPU factor in [0.97, 1.15], inversely related to the CPU score
pub fn cpu_factor(cpu_score: f64) -> f64 {
    (1.15 - cpu_score / 100.0 * 0.18).clamp(0.97, 1.15)
}

/// Memory factor in [0.90, 1.10], inversely related to the memory score
pub fn memory_factor(memory_score: f64) -> f64 {
    (1.10 - memory_score / 100.0 * 0.20).clamp(0.90, 1.10)
}

/// Disk factor in [0.70, 1.45], tiered on random-read IOPS
///
/// Virtualized hosts behind an IOPS limiter take the top of the band: swap
/// on such storage is painful and needs the most headroom.
pub fn disk_factor(rand_read_iops: f64, virtualized_low_iops: bool) -> f64 {
    if virtualized_low_iops {
        return 1.45;
    }
    match rand_read_iops {
        i if i < 200.0 => 1.35,
        i if i < 1000.0 => 1.20,
        i if i < 5000.0 => 1.05,
        i if i < 20000.0 => 0.90,
        _ => 0.70,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_base_steps_down_with_ram() {
        assert_eq!(swap_base_mb(512), 1024);
        assert_eq!(swap_base_mb(1536), 2304);
        assert_eq!(swap_base_mb(4096), 4096);
        assert_eq!(swap_base_mb(16384), 8192);
        assert_eq!(swap_base_mb(65536), 8192);
        assert_eq!(swap_base_mb(262144), 16384);
    }

    #[test]
    fn test_factor_bands() {
        for score in [0.0, 1.0, 50.0, 100.0] {
            let c = cpu_factor(score);
            assert!((0.97..=1.15).contains(&c));
            let m = memory_factor(score);
            assert!((0.90..=1.10).contains(&m));
        }
        for iops in [0.0, 80.0, 500.0, 3000.0, 10_000.0, 200_000.0] {
            let d = disk_factor(iops, false);
            assert!((0.70..=1.45).contains(&d));
        }
    }

    #[test]
    fn test_factors_inverse_in_score() {
        assert!(cpu_factor(10.0) > cpu_factor(90.0));
        assert!(memory_factor(10.0) > memory_factor(90.0));
        assert!(disk_factor(100.0, false) > disk_factor(50_000.0, false));
    }

    #[test]
    fn test_virtualized_low_iops_takes_maximum() {
        assert!(disk_factor(80.0, true) >= 1.4);
        assert!(disk_factor(100_000.0, true) >= 1.4);
    }
}
