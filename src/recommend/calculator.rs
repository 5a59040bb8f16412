//! Recommendation calculator
//!
//! Pure multi-factor model turning hardware, raw metrics, and scores into
//! concrete tunable values. Two invariants are permanent, not defaults:
//! `vm.overcommit_memory` is never set to 2 (strict accounting once took a
//! small host down mid-provision), and `vm.min_free_kbytes` on sub-512 MB
//! hosts is pinned to its current value — lowering it there has caused
//! allocation failures in production.

use crate::bench::{BenchmarkResult, DiskClass, HardwareProfile};
use crate::kernel::{Tunable, VmState};
use crate::recommend::factors;
use crate::score::PerformanceScore;
use serde::{Deserialize, Serialize};

/// Target value for every managed tunable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub swap_size_mb: u64,
    pub swappiness: u64,
    pub vfs_cache_pressure: u64,
    pub dirty_ratio: u64,
    pub dirty_background_ratio: u64,
    pub dirty_expire_centisecs: u64,
    pub dirty_writeback_centisecs: u64,
    pub min_free_kbytes: u64,
    pub page_cluster: u64,
    pub overcommit_memory: u64,
    pub overcommit_ratio: u64,
}

impl RecommendationSet {
    /// Value of one tunable in this set
    pub fn value_of(&self, tunable: Tunable) -> u64 {
        match tunable {
            Tunable::SwapSizeMb => self.swap_size_mb,
            Tunable::Swappiness => self.swappiness,
            Tunable::VfsCachePressure => self.vfs_cache_pressure,
            Tunable::DirtyRatio => self.dirty_ratio,
            Tunable::DirtyBackgroundRatio => self.dirty_background_ratio,
            Tunable::DirtyExpireCentisecs => self.dirty_expire_centisecs,
            Tunable::DirtyWritebackCentisecs => self.dirty_writeback_centisecs,
            Tunable::MinFreeKbytes => self.min_free_kbytes,
            Tunable::PageCluster => self.page_cluster,
            Tunable::OvercommitMemory => self.overcommit_memory,
            Tunable::OvercommitRatio => self.overcommit_ratio,
        }
    }

    /// All sysctl keys with their target values, in persist order
    pub fn sysctl_pairs(&self) -> Vec<(&'static str, u64)> {
        Tunable::ALL
            .iter()
            .filter_map(|t| t.sysctl_key().map(|key| (key, self.value_of(*t))))
            .collect()
    }

    /// Sysctl pairs excluding the overcommit pair
    ///
    /// The first apply phase persists these; the overcommit keys join the
    /// drop-in only after the allocation probe has validated them.
    pub fn sysctl_pairs_without_overcommit(&self) -> Vec<(&'static str, u64)> {
        Tunable::ALL
            .iter()
            .filter(|t| !t.is_overcommit())
            .filter_map(|t| t.sysctl_key().map(|key| (key, self.value_of(*t))))
            .collect()
    }
}

/// Compute the recommendation set
///
/// `current` is consulted only for the min_free_kbytes small-memory rules;
/// everything else derives from the measured inputs. Deterministic: equal
/// inputs yield equal outputs.
pub fn recommend(
    hw: &HardwareProfile,
    bench: &BenchmarkResult,
    score: &PerformanceScore,
    current: &VmState,
) -> RecommendationSet {
    let ram = hw.total_ram_mb;
    let iops = bench.disk_rand_read_iops.value;
    let virt_low = hw.is_virtualized_low_iops();
    let ssd = hw.disk_class == DiskClass::Ssd;

    let dirty_ratio = dirty_ratio_for(hw, iops, virt_low);
    let (dirty_expire, dirty_writeback) = writeback_for(ssd, virt_low);
    let (overcommit_memory, overcommit_ratio) = overcommit_for(ram);

    RecommendationSet {
        swap_size_mb: swap_size_for(hw, iops, score, virt_low),
        swappiness: swappiness_for(ram, ssd, iops, virt_low, score),
        vfs_cache_pressure: cache_pressure_for(ssd, iops, score.disk_score),
        dirty_ratio,
        dirty_background_ratio: (dirty_ratio / 4).max(3),
        dirty_expire_centisecs: dirty_expire,
        dirty_writeback_centisecs: dirty_writeback,
        min_free_kbytes: min_free_for(ram, hw.cpu_core_count, current.min_free_kbytes),
        page_cluster: if ssd { 0 } else { 3 },
        overcommit_memory,
        overcommit_ratio,
    }
}

/// Swap size: RAM-tier base scaled by the three resource factors
fn swap_size_for(
    hw: &HardwareProfile,
    iops: f64,
    score: &PerformanceScore,
    virt_low: bool,
) -> u64 {
    let ram = hw.total_ram_mb;
    let base = factors::swap_base_mb(ram) as f64;
    let scaled = base
        * factors::cpu_factor(score.cpu_score)
        * factors::memory_factor(score.memory_score)
        * factors::disk_factor(iops, virt_low);

    let lo = 256.0f64.max(ram as f64 * 0.10);
    let hi = (ram as f64 * 2.0).min(16384.0);
    // Degenerate on very small hosts where the floor exceeds 2x RAM.
    let lo = lo.min(hi);
    scaled.clamp(lo, hi).round() as u64
}

/// Swappiness: RAM-tier base, pushed down by slow or throttled storage
fn swappiness_for(
    ram: u64,
    ssd: bool,
    iops: f64,
    virt_low: bool,
    score: &PerformanceScore,
) -> u64 {
    let base: i64 = match ram {
        r if r < 1024 => 70,
        r if r < 2048 => 60,
        r if r < 4096 => 50,
        r if r < 8192 => 40,
        r if r < 16384 => 25,
        r if r < 32768 => 15,
        r if r < 65536 => 10,
        _ => 1,
    };

    // Most specific storage condition wins; swap thrashing on throttled
    // storage is the worst case, so it gets the deepest cut.
    let disk_adjust: i64 = if virt_low {
        -20
    } else if iops < 500.0 {
        -12
    } else if !ssd {
        -8
    } else {
        -2
    };

    let headroom: i64 = if score.cpu_score >= 70.0 && score.memory_score >= 70.0 {
        -5
    } else {
        0
    };

    (base + disk_adjust + headroom).clamp(1, 100) as u64
}

fn cache_pressure_for(ssd: bool, iops: f64, disk_score: f64) -> u64 {
    match (ssd, iops) {
        (true, _) if disk_score >= 70.0 => 150,
        (true, _) => 100,
        (false, i) if i < 500.0 => 50,
        (false, _) => 75,
    }
}

/// Dirty ratio: generous on SSD, tightened with falling IOPS on HDD, and
/// capped hard on small-memory hosts where dirty pages crowd out everything
fn dirty_ratio_for(hw: &HardwareProfile, iops: f64, virt_low: bool) -> u64 {
    let ram = hw.total_ram_mb;
    let base: u64 = if hw.disk_class == DiskClass::Ssd {
        35
    } else if virt_low {
        8
    } else if iops < 200.0 {
        10
    } else if iops < 1000.0 {
        15
    } else {
        20
    };

    let capped = if ram < 1024 {
        base.min(8)
    } else if ram < 2048 {
        base.min(10)
    } else {
        base
    };
    capped.max(5)
}

fn writeback_for(ssd: bool, virt_low: bool) -> (u64, u64) {
    if ssd {
        (1500, 200)
    } else if virt_low {
        // Longest expiry on the lowest-IOPS path to maximize coalescing.
        (4000, 500)
    } else {
        (3000, 500)
    }
}

/// min_free_kbytes: ~0.5% of RAM scaled mildly with core count, with the
/// small-memory pinning rules applied against the current value
fn min_free_for(ram_mb: u64, cores: usize, current_kb: u64) -> u64 {
    if ram_mb <= 512 {
        return current_kb;
    }

    let ram_kb = ram_mb * 1024;
    let target =
        (ram_kb as f64 * 0.005 * (1.0 + 0.02 * cores.min(16) as f64)).round() as u64;
    let target = target.clamp(4096, 262_144);

    if ram_mb < 1024 {
        let floor = current_kb * 8 / 10;
        return target.clamp(floor, current_kb.max(floor));
    }
    target
}

/// Overcommit policy by RAM tier; 2 (strict) is structurally unreachable
///
/// The small-host tier includes 512 MB exactly, matching the other
/// small-host rules.
fn overcommit_for(ram_mb: u64) -> (u64, u64) {
    if ram_mb <= 512 {
        // Always-allow: small hosts without swap yet must not fail forks.
        (1, 100)
    } else if ram_mb < 2048 {
        (0, 80)
    } else {
        (0, 50)
    }
}
