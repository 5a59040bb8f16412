//! Current-versus-recommended comparison
//!
//! Compares the live [`VmState`] against a [`RecommendationSet`] and marks
//! which tunables actually need to change. Discrete sysctls compare exactly;
//! swap size uses a relative tolerance band so a swap file a few percent off
//! target is left alone rather than rebuilt.

use crate::kernel::{Tunable, VmState};
use crate::recommend::RecommendationSet;
use serde::{Deserialize, Serialize};

/// One tunable's current and recommended values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDiff {
    pub tunable: Tunable,
    pub current: u64,
    pub recommended: u64,
    pub changed: bool,
}

/// Compare live state against the recommendation, one entry per tunable
///
/// `total_ram_mb` selects the swap tolerance band; it has no effect on the
/// discrete sysctls.
pub fn diff(current: &VmState, rec: &RecommendationSet, total_ram_mb: u64) -> Vec<ParameterDiff> {
    Tunable::ALL
        .iter()
        .map(|&t| {
            let cur = current.value_of(t);
            let target = rec.value_of(t);
            let changed = match t {
                Tunable::SwapSizeMb => swap_needs_change(cur, target, total_ram_mb),
                _ => cur != target,
            };
            ParameterDiff {
                tunable: t,
                current: cur,
                recommended: target,
                changed,
            }
        })
        .collect()
}

/// Swap is only rebuilt when outside the tolerance band around the target
///
/// No swap at all is always a change. The band is 10% on hosts under 2 GB
/// where absolute differences matter, 20% elsewhere — resizing swap means a
/// swapoff, which stalls the host, so it is not done for marginal gains.
fn swap_needs_change(current_mb: u64, target_mb: u64, total_ram_mb: u64) -> bool {
    if current_mb == 0 {
        return target_mb > 0;
    }
    let band = if total_ram_mb < 2048 { 0.10 } else { 0.20 };
    let delta = (current_mb as f64 - target_mb as f64).abs();
    delta > target_mb as f64 * band
}

/// True when at least one tunable needs to change
pub fn any_changed(diffs: &[ParameterDiff]) -> bool {
    diffs.iter().any(|d| d.changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec_matching(state: &VmState) -> RecommendationSet {
        RecommendationSet {
            swap_size_mb: state.swap_size_mb,
            swappiness: state.swappiness,
            vfs_cache_pressure: state.vfs_cache_pressure,
            dirty_ratio: state.dirty_ratio,
            dirty_background_ratio: state.dirty_background_ratio,
            dirty_expire_centisecs: state.dirty_expire_centisecs,
            dirty_writeback_centisecs: state.dirty_writeback_centisecs,
            min_free_kbytes: state.min_free_kbytes,
            page_cluster: state.page_cluster,
            overcommit_memory: state.overcommit_memory,
            overcommit_ratio: state.overcommit_ratio,
        }
    }

    fn state() -> VmState {
        VmState {
            swap_size_mb: 4096,
            swappiness: 60,
            vfs_cache_pressure: 100,
            dirty_ratio: 20,
            dirty_background_ratio: 10,
            dirty_expire_centisecs: 3000,
            dirty_writeback_centisecs: 500,
            min_free_kbytes: 67584,
            page_cluster: 3,
            overcommit_memory: 0,
            overcommit_ratio: 50,
        }
    }

    #[test]
    fn test_identity_diff_has_no_changes() {
        let s = state();
        let diffs = diff(&s, &rec_matching(&s), 16384);
        assert_eq!(diffs.len(), Tunable::ALL.len());
        assert!(!any_changed(&diffs));
    }

    #[test]
    fn test_discrete_tunables_compare_exactly() {
        let s = state();
        let mut rec = rec_matching(&s);
        rec.swappiness = 61;
        let diffs = diff(&s, &rec, 16384);
        let sw = diffs
            .iter()
            .find(|d| d.tunable == Tunable::Swappiness)
            .unwrap();
        assert!(sw.changed);
        assert_eq!(diffs.iter().filter(|d| d.changed).count(), 1);
    }

    #[test]
    fn test_swap_within_band_unchanged() {
        let s = state();
        let mut rec = rec_matching(&s);
        // 4096 current vs 4500 target: 9% off, inside the 20% band.
        rec.swap_size_mb = 4500;
        let diffs = diff(&s, &rec, 16384);
        let swap = diffs
            .iter()
            .find(|d| d.tunable == Tunable::SwapSizeMb)
            .unwrap();
        assert!(!swap.changed);
    }

    #[test]
    fn test_swap_outside_band_changed() {
        let s = state();
        let mut rec = rec_matching(&s);
        rec.swap_size_mb = 8192;
        let diffs = diff(&s, &rec, 16384);
        let swap = diffs
            .iter()
            .find(|d| d.tunable == Tunable::SwapSizeMb)
            .unwrap();
        assert!(swap.changed);
    }

    #[test]
    fn test_zero_swap_always_changed() {
        let mut s = state();
        s.swap_size_mb = 0;
        let mut rec = rec_matching(&s);
        rec.swap_size_mb = 1024;
        let diffs = diff(&s, &rec, 16384);
        let swap = diffs
            .iter()
            .find(|d| d.tunable == Tunable::SwapSizeMb)
            .unwrap();
        assert!(swap.changed);
    }

    #[test]
    fn test_small_memory_band_is_tighter() {
        let mut s = state();
        s.swap_size_mb = 1024;
        let mut rec = rec_matching(&s);
        // 12% off target: inside the 20% band but outside the 10% one.
        rec.swap_size_mb = 1160;
        let large = diff(&s, &rec, 4096);
        let small = diff(&s, &rec, 1024);
        let pick = |d: &[ParameterDiff]| {
            d.iter()
                .find(|p| p.tunable == Tunable::SwapSizeMb)
                .unwrap()
                .changed
        };
        assert!(!pick(&large));
        assert!(pick(&small));
    }
}
