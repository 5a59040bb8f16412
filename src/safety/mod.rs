//! Pre-apply safety gate
//!
//! Every mutation passes through here first. The gate either rejects the run
//! outright (the host is too close to the edge to touch), or hands back an
//! adjusted recommendation with the unsafe parts neutralized and each
//! adjustment recorded for the report.

use crate::diff::ParameterDiff;
use crate::kernel::{self, Tunable, VmState};
use crate::recommend::RecommendationSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::System;
use tracing::warn;

/// Applying anything below this much available memory is not attempted.
const MIN_AVAILABLE_MB: u64 = 50;

/// Disk headroom multiple required before creating or resizing a swap file.
const SWAP_DISK_HEADROOM: u64 = 2;

/// Gate verdict: either a rejection with a reason, or an adjusted
/// recommendation safe to hand to the applier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub approved: bool,
    /// Rejection reason; None when approved
    pub reason: Option<String>,
    /// Recommendation with unsafe parts neutralized
    pub recommendation: RecommendationSet,
    /// Human-readable notes for every adjustment made
    pub adjustments: Vec<String>,
}

/// Pre-apply resource snapshot
///
/// Fields are plain values so tests can construct arbitrary host conditions
/// without a live system.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    pub available_memory_mb: u64,
    pub free_disk_mb: u64,
    pub current_swap_mb: u64,
    pub total_ram_mb: u64,
}

impl SafetyGate {
    /// Snapshot live resources; `swap_path` locates the filesystem that
    /// would hold the swap file
    pub fn probe(swap_path: &Path, total_ram_mb: u64) -> crate::error::Result<Self> {
        let available_memory_mb = available_memory_mb();

        let parent = swap_path.parent().unwrap_or_else(|| Path::new("/"));
        let free_disk_mb = kernel::available_disk_space(parent)
            .map(|b| b / (1024 * 1024))
            .unwrap_or(0);

        let current_swap_mb = kernel::swap::total_swap_mb()?;

        Ok(SafetyGate {
            available_memory_mb,
            free_disk_mb,
            current_swap_mb,
            total_ram_mb,
        })
    }

    /// Judge the recommendation against the live resource snapshot
    ///
    /// `diffs` carries the change decisions: the swap disk-headroom check
    /// only fires when the diff actually marks swap as changing, so a swap
    /// size inside the tolerance band never trips it.
    pub fn check(
        &self,
        rec: &RecommendationSet,
        current: &VmState,
        diffs: &[ParameterDiff],
    ) -> SafetyVerdict {
        let mut adjusted = rec.clone();
        let mut adjustments = Vec::new();

        if self.available_memory_mb < MIN_AVAILABLE_MB {
            return SafetyVerdict {
                approved: false,
                reason: Some(format!(
                    "only {} MB of memory available (minimum {} MB to apply safely)",
                    self.available_memory_mb, MIN_AVAILABLE_MB
                )),
                recommendation: adjusted,
                adjustments,
            };
        }

        // Swap resize needs headroom on the target filesystem: the new file
        // is fully allocated before the old one is released. No headroom
        // means the whole run is refused before anything mutates.
        let swap_changing = diffs
            .iter()
            .find(|d| d.tunable == Tunable::SwapSizeMb)
            .map(|d| d.changed)
            .unwrap_or(false);
        if swap_changing && self.free_disk_mb < adjusted.swap_size_mb * SWAP_DISK_HEADROOM {
            warn!(
                free_mb = self.free_disk_mb,
                target_mb = adjusted.swap_size_mb,
                "insufficient disk space for swap resize, refusing to apply"
            );
            return SafetyVerdict {
                approved: false,
                reason: Some(format!(
                    "{} MB free on the swap filesystem is below the {} MB needed for a {} MB swap file",
                    self.free_disk_mb,
                    adjusted.swap_size_mb * SWAP_DISK_HEADROOM,
                    adjusted.swap_size_mb
                )),
                recommendation: adjusted,
                adjustments,
            };
        }

        // A small host with no swap active cannot tolerate heuristic
        // accounting: force always-allow until swap exists.
        if self.total_ram_mb <= 512
            && self.current_swap_mb == 0
            && adjusted.overcommit_memory != 1
        {
            adjustments.push(
                "overcommit_memory forced to 1: at most 512 MB RAM with no active swap".to_string(),
            );
            adjusted.overcommit_memory = 1;
            adjusted.overcommit_ratio = 100;
        }

        // Overcommit mode 2 must never reach the kernel regardless of what
        // produced the recommendation.
        debug_assert_ne!(adjusted.overcommit_memory, 2);
        if adjusted.overcommit_memory == 2 {
            adjustments.push("overcommit_memory 2 replaced with 0".to_string());
            adjusted.overcommit_memory = 0;
        }

        // min_free_kbytes never moves from current on small hosts.
        if self.total_ram_mb <= 512 && adjusted.min_free_kbytes != current.min_free_kbytes {
            adjustments.push(format!(
                "min_free_kbytes pinned to current {} on a small-memory host",
                current.min_free_kbytes
            ));
            adjusted.min_free_kbytes = current.min_free_kbytes;
        }

        SafetyVerdict {
            approved: true,
            reason: None,
            recommendation: adjusted,
            adjustments,
        }
    }
}

/// Read the amount of memory currently available from the kernel
///
/// Uses `/proc/meminfo` MemAvailable via procfs where present, falling back
/// to the sysinfo view.
#[cfg(target_os = "linux")]
pub fn available_memory_mb() -> u64 {
    use procfs::Current;

    if let Ok(meminfo) = procfs::Meminfo::current() {
        if let Some(avail) = meminfo.mem_available {
            return avail / (1024 * 1024);
        }
    }
    let mut sys = System::new();
    sys.refresh_memory();
    sys.available_memory() / (1024 * 1024)
}

#[cfg(not(target_os = "linux"))]
pub fn available_memory_mb() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.available_memory() / (1024 * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff;

    fn rec() -> RecommendationSet {
        RecommendationSet {
            swap_size_mb: 4096,
            swappiness: 25,
            vfs_cache_pressure: 150,
            dirty_ratio: 35,
            dirty_background_ratio: 8,
            dirty_expire_centisecs: 1500,
            dirty_writeback_centisecs: 200,
            min_free_kbytes: 65536,
            page_cluster: 0,
            overcommit_memory: 0,
            overcommit_ratio: 50,
        }
    }

    fn current() -> VmState {
        VmState {
            swap_size_mb: 0,
            swappiness: 60,
            vfs_cache_pressure: 100,
            dirty_ratio: 20,
            dirty_background_ratio: 10,
            dirty_expire_centisecs: 3000,
            dirty_writeback_centisecs: 500,
            min_free_kbytes: 45000,
            page_cluster: 3,
            overcommit_memory: 0,
            overcommit_ratio: 50,
        }
    }

    fn diffs_for(state: &VmState, rec: &RecommendationSet, ram_mb: u64) -> Vec<ParameterDiff> {
        diff::diff(state, rec, ram_mb)
    }

    #[test]
    fn test_rejects_under_memory_floor() {
        let gate = SafetyGate {
            available_memory_mb: 30,
            free_disk_mb: 100_000,
            current_swap_mb: 0,
            total_ram_mb: 16384,
        };
        let state = current();
        let verdict = gate.check(&rec(), &state, &diffs_for(&state, &rec(), 16384));
        assert!(!verdict.approved);
        assert!(verdict.reason.unwrap().contains("30 MB"));
    }

    #[test]
    fn test_approves_healthy_host() {
        let gate = SafetyGate {
            available_memory_mb: 8000,
            free_disk_mb: 100_000,
            current_swap_mb: 0,
            total_ram_mb: 16384,
        };
        let state = current();
        let verdict = gate.check(&rec(), &state, &diffs_for(&state, &rec(), 16384));
        assert!(verdict.approved);
        assert!(verdict.adjustments.is_empty());
        assert_eq!(verdict.recommendation, rec());
    }

    #[test]
    fn test_rejects_when_disk_lacks_swap_headroom() {
        // 4096 MB target needs 8192 MB free; the run must refuse, not
        // quietly keep the old swap.
        let gate = SafetyGate {
            available_memory_mb: 8000,
            free_disk_mb: 1000,
            current_swap_mb: 0,
            total_ram_mb: 16384,
        };
        let state = current();
        let verdict = gate.check(&rec(), &state, &diffs_for(&state, &rec(), 16384));
        assert!(!verdict.approved);
        assert!(verdict.adjustments.is_empty());
        let reason = verdict.reason.unwrap();
        assert!(reason.contains("8192 MB"));
        assert!(reason.contains("4096 MB"));
    }

    #[test]
    fn test_forces_overcommit_on_tiny_swapless_host() {
        let gate = SafetyGate {
            available_memory_mb: 200,
            free_disk_mb: 50_000,
            current_swap_mb: 0,
            total_ram_mb: 384,
        };
        let state = current();
        let verdict = gate.check(&rec(), &state, &diffs_for(&state, &rec(), 384));
        assert!(verdict.approved);
        assert_eq!(verdict.recommendation.overcommit_memory, 1);
        assert_eq!(verdict.recommendation.overcommit_ratio, 100);
        // min_free also pinned on a small-memory host.
        assert_eq!(
            verdict.recommendation.min_free_kbytes,
            current().min_free_kbytes
        );
    }

    #[test]
    fn test_swap_unchanged_needs_no_disk_headroom() {
        let gate = SafetyGate {
            available_memory_mb: 8000,
            free_disk_mb: 100,
            current_swap_mb: 4096,
            total_ram_mb: 16384,
        };
        let mut state = current();
        state.swap_size_mb = 4096;
        let verdict = gate.check(&rec(), &state, &diffs_for(&state, &rec(), 16384));
        assert!(verdict.approved);
        assert!(verdict.adjustments.is_empty());
    }

    #[test]
    fn test_swap_within_tolerance_band_passes_disk_check() {
        // 4400 MB active swap vs a 4096 MB target sits inside the 20% band,
        // so the diff marks swap unchanged and the headroom check stays out
        // of the way even with almost no free disk.
        let gate = SafetyGate {
            available_memory_mb: 8000,
            free_disk_mb: 100,
            current_swap_mb: 4400,
            total_ram_mb: 16384,
        };
        let mut state = current();
        state.swap_size_mb = 4400;
        let verdict = gate.check(&rec(), &state, &diffs_for(&state, &rec(), 16384));
        assert!(verdict.approved);
        assert!(verdict.adjustments.is_empty());
    }
}
