//! Staged applier
//!
//! Executes an [`ApplyPlan`] in three phases, in order:
//!
//! 1. Safe sysctls: live writes plus one persisted drop-in block that holds
//!    everything except the overcommit pair. A persist failure downgrades
//!    the run to live-only; it never blocks live writes.
//! 2. Swap resize through [`SwapFile`]. A failure here stops the run before
//!    the overcommit phase, since overcommit targets assume the new swap.
//! 3. Overcommit pair, followed by an allocation probe. The overcommit keys
//!    join the drop-in only once the probe passes; a failed probe rolls
//!    overcommit back to the heuristic default, live and persisted. An
//!    aborted run therefore never leaves unvalidated overcommit targets
//!    waiting to go live at next boot.

use super::plan::ApplyPlan;
use crate::error::Result;
use crate::kernel::{write_sysctl, PersistedConfig, SwapFile};
use crate::recommend::RecommendationSet;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Bytes the post-overcommit allocation probe requests and touches.
const PROBE_BYTES: usize = 32 * 1024 * 1024;

/// Outcome of one apply run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    /// Sysctl keys written live, in order
    pub applied: Vec<String>,
    /// Failures as (what, why); the run continues past individual sysctls
    pub failed: Vec<(String, String)>,
    /// Drop-in file the configuration was persisted to
    pub persisted_to: Option<PathBuf>,
    /// Backup of the previous drop-in, when one existed
    pub backup: Option<PathBuf>,
    /// New swap size in MB when phase 2 ran successfully
    pub swap_resized_mb: Option<u64>,
    /// True when the overcommit phase was rolled back
    pub rolled_back: bool,
    pub rollback_reason: Option<String>,
}

impl ApplyReport {
    /// True when every planned change landed and nothing was rolled back
    pub fn fully_applied(&self) -> bool {
        self.failed.is_empty() && !self.rolled_back
    }

    /// First failure of the run as (phase, message), rollback included
    pub fn first_failure(&self) -> Option<(String, String)> {
        if let Some((what, why)) = self.failed.first() {
            return Some((what.clone(), why.clone()));
        }
        if self.rolled_back {
            let reason = self
                .rollback_reason
                .clone()
                .unwrap_or_else(|| "allocation probe failed".to_string());
            return Some(("overcommit".to_string(), reason));
        }
        None
    }
}

/// Executes apply plans against the live kernel and the drop-in file
pub struct StagedApplier {
    persist: PersistedConfig,
    swap: SwapFile,
}

impl StagedApplier {
    pub fn new(sysctl_conf: impl Into<PathBuf>, swap_file: impl Into<PathBuf>) -> Self {
        StagedApplier {
            persist: PersistedConfig::new(sysctl_conf),
            swap: SwapFile::new(swap_file),
        }
    }

    /// Run the plan; `rec` is the gate-adjusted recommendation the persisted
    /// block is written from
    pub fn apply(&self, plan: ApplyPlan, rec: &RecommendationSet) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        self.apply_safe(&plan, &mut report);
        self.persist_block(rec, &mut report);

        if let Some(target_mb) = plan.swap_target_mb {
            info!(target_mb, "resizing swap");
            match self.swap.resize(target_mb) {
                Ok(()) => report.swap_resized_mb = Some(target_mb),
                Err(e) => {
                    error!(error = %e, "swap resize failed, skipping overcommit phase");
                    report
                        .failed
                        .push(("swap resize".to_string(), e.to_string()));
                    // Overcommit values assume the new swap is active.
                    return Ok(report);
                }
            }
        }

        self.apply_overcommit(&plan, rec, &mut report);
        Ok(report)
    }

    /// Phase 1: live writes for the safe sysctls, collecting failures
    fn apply_safe(&self, plan: &ApplyPlan, report: &mut ApplyReport) {
        for d in &plan.safe {
            let key = match d.tunable.sysctl_key() {
                Some(k) => k,
                None => continue,
            };
            match write_sysctl(key, d.recommended) {
                Ok(()) => {
                    info!(key, value = d.recommended, "sysctl applied");
                    report.applied.push(key.to_string());
                }
                Err(e) => {
                    warn!(key, error = %e, "sysctl write failed");
                    report.failed.push((key.to_string(), e.to_string()));
                }
            }
        }
    }

    /// Write the phase-1 drop-in block, everything except overcommit;
    /// failure downgrades to live-only
    fn persist_block(&self, rec: &RecommendationSet, report: &mut ApplyReport) {
        match self.persist.write_block(&rec.sysctl_pairs_without_overcommit()) {
            Ok(backup) => {
                report.persisted_to = Some(self.persist.path.clone());
                report.backup = backup;
            }
            Err(e) => {
                warn!(error = %e, "could not persist configuration, changes are live-only");
                report.failed.push(("persist".to_string(), e.to_string()));
            }
        }
    }

    /// Phase 3: overcommit writes, then the allocation probe
    fn apply_overcommit(&self, plan: &ApplyPlan, rec: &RecommendationSet, report: &mut ApplyReport) {
        if plan.overcommit.is_empty() {
            return;
        }

        for d in &plan.overcommit {
            let key = match d.tunable.sysctl_key() {
                Some(k) => k,
                None => continue,
            };
            match write_sysctl(key, d.recommended) {
                Ok(()) => {
                    info!(key, value = d.recommended, "sysctl applied");
                    report.applied.push(key.to_string());
                }
                Err(e) => {
                    warn!(key, error = %e, "sysctl write failed");
                    report.failed.push((key.to_string(), e.to_string()));
                }
            }
        }

        if allocation_probe() {
            // Probe passed; the overcommit pair is now validated and may
            // join the persisted block.
            if let Err(e) = self.persist.rewrite_block(&rec.sysctl_pairs()) {
                warn!(error = %e, "could not persist overcommit keys, they are live-only");
                report
                    .failed
                    .push(("persist overcommit".to_string(), e.to_string()));
            }
            return;
        }

        // The new overcommit policy broke a plain allocation: revert to the
        // heuristic default live and in the drop-in before anything else on
        // the host hits the same wall.
        error!("allocation probe failed under new overcommit policy, rolling back");
        report.rolled_back = true;
        report.rollback_reason =
            Some(format!("{} byte allocation probe failed", PROBE_BYTES));

        if let Err(e) = write_sysctl("vm.overcommit_memory", 0) {
            report
                .failed
                .push(("overcommit rollback".to_string(), e.to_string()));
        }

        let mut reverted = rec.clone();
        reverted.overcommit_memory = 0;
        if let Err(e) = self.persist.rewrite_block(&reverted.sysctl_pairs()) {
            report
                .failed
                .push(("overcommit rollback persist".to_string(), e.to_string()));
        }
    }
}

/// Allocate and touch a buffer under the new overcommit policy
///
/// Touching every page forces real backing; a null return or inability to
/// allocate means the policy is too strict for this host right now.
fn allocation_probe() -> bool {
    unsafe {
        let ptr = libc::malloc(PROBE_BYTES) as *mut u8;
        if ptr.is_null() {
            return false;
        }
        let page = 4096;
        let mut off = 0;
        while off < PROBE_BYTES {
            std::ptr::write_volatile(ptr.add(off), 0xa5);
            off += page;
        }
        libc::free(ptr as *mut libc::c_void);
    }
    true
}
