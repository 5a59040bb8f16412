//! Apply plan
//!
//! Splits the changed tunables into the three ordered phases the applier
//! executes: safe sysctls first, then the swap resize, and only then the
//! overcommit pair. Overcommit last means the allocation probe runs with
//! the new swap already active.

use crate::diff::ParameterDiff;
use serde::{Deserialize, Serialize};

/// Ordered work list for one apply run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPlan {
    /// Phase 1: sysctls that cannot destabilize the host
    pub safe: Vec<ParameterDiff>,
    /// Phase 2: target swap size in MB, when swap needs to change
    pub swap_target_mb: Option<u64>,
    /// Phase 3: overcommit tunables, applied after swap exists
    pub overcommit: Vec<ParameterDiff>,
}

impl ApplyPlan {
    /// Build the plan from a diff, keeping only entries that need a change
    pub fn from_diffs(diffs: &[ParameterDiff]) -> Self {
        let mut safe = Vec::new();
        let mut swap_target_mb = None;
        let mut overcommit = Vec::new();

        for d in diffs.iter().filter(|d| d.changed) {
            if d.tunable == crate::kernel::Tunable::SwapSizeMb {
                swap_target_mb = Some(d.recommended);
            } else if d.tunable.is_overcommit() {
                overcommit.push(d.clone());
            } else {
                safe.push(d.clone());
            }
        }

        ApplyPlan {
            safe,
            swap_target_mb,
            overcommit,
        }
    }

    /// True when the plan has no work at all
    pub fn is_empty(&self) -> bool {
        self.safe.is_empty() && self.swap_target_mb.is_none() && self.overcommit.is_empty()
    }

    /// Number of individual changes across all phases
    pub fn change_count(&self) -> usize {
        self.safe.len() + usize::from(self.swap_target_mb.is_some()) + self.overcommit.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Tunable;

    fn entry(tunable: Tunable, current: u64, recommended: u64, changed: bool) -> ParameterDiff {
        ParameterDiff {
            tunable,
            current,
            recommended,
            changed,
        }
    }

    #[test]
    fn test_phases_are_partitioned() {
        let diffs = vec![
            entry(Tunable::SwapSizeMb, 0, 2048, true),
            entry(Tunable::Swappiness, 60, 25, true),
            entry(Tunable::DirtyRatio, 20, 20, false),
            entry(Tunable::OvercommitMemory, 0, 1, true),
            entry(Tunable::OvercommitRatio, 50, 100, true),
        ];
        let plan = ApplyPlan::from_diffs(&diffs);

        assert_eq!(plan.safe.len(), 1);
        assert_eq!(plan.swap_target_mb, Some(2048));
        assert_eq!(plan.overcommit.len(), 2);
        assert_eq!(plan.change_count(), 4);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_unchanged_diffs_yield_empty_plan() {
        let diffs = vec![
            entry(Tunable::SwapSizeMb, 2048, 2048, false),
            entry(Tunable::Swappiness, 25, 25, false),
        ];
        let plan = ApplyPlan::from_diffs(&diffs);
        assert!(plan.is_empty());
        assert_eq!(plan.change_count(), 0);
    }
}
