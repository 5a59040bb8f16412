//! Tuning engine
//!
//! Drives the pipeline: collect metrics, normalize scores, compute the
//! recommendation, diff against the live kernel state, and (for apply runs)
//! gate and stage the changes. The engine owns sequencing; rendering and
//! exit codes live with the caller.

use crate::apply::{ApplyPlan, ApplyReport, StagedApplier};
use crate::bench::{BenchmarkResult, Collector, HardwareProfile};
use crate::config::TuneConfig;
use crate::diff::{self, ParameterDiff};
use crate::error::Result;
use crate::kernel::{self, swap::SwapDevice, VmState};
use crate::recommend::{self, RecommendationSet};
use crate::safety::{SafetyGate, SafetyVerdict};
use crate::score::{self, PerformanceScore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// Analysis only, nothing was going to be applied
    Analyzed,
    /// Every tunable already matches the recommendation
    NoChangesNeeded,
    /// The plan was shown but not executed
    DryRun,
    /// The safety gate refused to apply
    SafetyRejected,
    /// Changes were applied (see the apply report for partial failures)
    Applied,
}

/// Everything the analysis half of the pipeline produces
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub hardware: HardwareProfile,
    pub bench: BenchmarkResult,
    pub score: PerformanceScore,
    pub recommendation: RecommendationSet,
    pub current: VmState,
    /// Active swap areas at analysis time, from /proc/swaps
    pub swap_devices: Vec<SwapDevice>,
    pub diffs: Vec<ParameterDiff>,
}

impl Analysis {
    /// True when no tunable needs to change
    pub fn converged(&self) -> bool {
        !diff::any_changed(&self.diffs)
    }
}

/// Full run record, serialized as-is for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct TuneReport {
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub outcome: RunOutcome,
    #[serde(flatten)]
    pub analysis: Analysis,
    /// Gate adjustments and rejection reason, present for apply runs
    pub safety: Option<SafetyVerdict>,
    pub apply: Option<ApplyReport>,
}

/// Pipeline driver
pub struct TuneEngine {
    config: TuneConfig,
}

impl TuneEngine {
    pub fn new(config: TuneConfig) -> Self {
        Self { config }
    }

    /// Collect the hardware profile and benchmark metrics
    ///
    /// With `--skip-bench` the benchmarks are replaced by conservative
    /// defaults for the detected disk class; classification of the I/O
    /// profile still runs on whatever values are in play.
    pub fn collect(&self) -> Result<(HardwareProfile, BenchmarkResult)> {
        if self.config.skip_bench {
            let mut hw = HardwareProfile::detect();
            let bench = BenchmarkResult::conservative(hw.disk_class, hw.cpu_core_count);
            hw.classify_io(bench.disk_seq_read_mb_s.value, bench.disk_rand_read_iops.value);
            info!("benchmarks skipped, using conservative defaults");
            return Ok((hw, bench));
        }

        let collector = Collector {
            bench_secs: self.config.bench_secs,
            target_dir: self.config.target_dir.clone(),
            quiet: self.config.quiet,
        };
        collector.collect()
    }

    /// Run the analysis half of the pipeline
    pub fn analyze(&self) -> Result<Analysis> {
        let (hardware, bench) = self.collect()?;
        let score = score::normalize(&bench, &hardware);
        info!(
            cpu = score.cpu_score,
            memory = score.memory_score,
            disk = score.disk_score,
            "scores normalized"
        );

        let current = VmState::read_current()?;
        // Listing failures (container, non-Linux) degrade to an empty list;
        // the total is already captured in `current.swap_size_mb`.
        let swap_devices = kernel::swap::active_swaps().unwrap_or_default();
        let recommendation = recommend::recommend(&hardware, &bench, &score, &current);
        let diffs = diff::diff(&current, &recommendation, hardware.total_ram_mb);

        Ok(Analysis {
            hardware,
            bench,
            score,
            recommendation,
            current,
            swap_devices,
            diffs,
        })
    }

    /// Gate the analysis for application
    pub fn gate(&self, analysis: &Analysis) -> Result<SafetyVerdict> {
        let gate = SafetyGate::probe(&self.config.swap_file, analysis.hardware.total_ram_mb)?;
        Ok(gate.check(&analysis.recommendation, &analysis.current, &analysis.diffs))
    }

    /// Execute the gated changes in stages
    ///
    /// Refuses an unapproved verdict; the plan is rebuilt from the
    /// gate-adjusted recommendation so that anything the gate neutralized
    /// drops out of the work list.
    pub fn execute(&self, analysis: &Analysis, verdict: &SafetyVerdict) -> Result<ApplyReport> {
        if !verdict.approved {
            return Err(crate::error::VmTuneError::SafetyRejected(
                verdict
                    .reason
                    .clone()
                    .unwrap_or_else(|| "no changes made".to_string()),
            ));
        }

        let diffs = diff::diff(
            &analysis.current,
            &verdict.recommendation,
            analysis.hardware.total_ram_mb,
        );
        let plan = ApplyPlan::from_diffs(&diffs);
        info!(changes = plan.change_count(), "executing apply plan");

        let applier = StagedApplier::new(
            self.config.sysctl_conf.clone(),
            self.config.swap_file.clone(),
        );
        applier.apply(plan, &verdict.recommendation)
    }

    /// Assemble the final report
    pub fn report(
        &self,
        started: Instant,
        outcome: RunOutcome,
        analysis: Analysis,
        safety: Option<SafetyVerdict>,
        apply: Option<ApplyReport>,
    ) -> TuneReport {
        TuneReport {
            timestamp: Utc::now(),
            duration_secs: started.elapsed().as_secs_f64(),
            outcome,
            analysis,
            safety,
            apply,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use std::path::PathBuf;

    fn config() -> TuneConfig {
        TuneConfig {
            bench_secs: 1,
            target_dir: PathBuf::from("/var/tmp"),
            skip_bench: true,
            sysctl_conf: PathBuf::from("/tmp/vmtune-test.conf"),
            swap_file: PathBuf::from("/tmp/vmtune-test-swap"),
            dry_run: true,
            assume_yes: false,
            format: OutputFormat::Text,
            quiet: true,
        }
    }

    #[test]
    fn test_collect_with_skip_bench_uses_defaults() {
        let engine = TuneEngine::new(config());
        let (hw, bench) = engine.collect().unwrap();
        assert!(hw.cpu_core_count > 0);
        assert_eq!(bench.fallback_fields().len(), 12);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_analyze_produces_full_diff() {
        let engine = TuneEngine::new(config());
        let analysis = engine.analyze().unwrap();
        assert_eq!(analysis.diffs.len(), crate::kernel::Tunable::ALL.len());
        assert!(analysis.recommendation.overcommit_memory != 2);

        // Swap areas and memory headroom travel with the analysis report.
        let json = serde_json::to_value(&analysis).unwrap();
        assert!(json.get("swap_devices").is_some());
        assert!(json["hardware"].get("available_ram_mb").is_some());
    }

    #[test]
    fn test_execute_refuses_unapproved_verdict() {
        let engine = TuneEngine::new(config());
        let (hardware, bench) = engine.collect().unwrap();
        let score = crate::score::normalize(&bench, &hardware);
        let current = VmState {
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
        };
        let recommendation = recommend::recommend(&hardware, &bench, &score, &current);
        let diffs = diff::diff(&current, &recommendation, hardware.total_ram_mb);
        let analysis = Analysis {
            hardware,
            bench,
            score,
            recommendation: recommendation.clone(),
            current,
            swap_devices: Vec::new(),
            diffs,
        };
        let verdict = SafetyVerdict {
            approved: false,
            reason: Some("only 30 MB of memory available".to_string()),
            recommendation,
            adjustments: Vec::new(),
        };

        let err = engine.execute(&analysis, &verdict).unwrap_err();
        assert!(matches!(
            err,
            crate::error::VmTuneError::SafetyRejected(_)
        ));
    }
}
