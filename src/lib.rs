//! # vmtune - Benchmark-Driven Linux VM Tuning
//!
//! vmtune measures what a host can actually do — CPU, memory, and disk —
//! and derives kernel virtual-memory settings from the measurements instead
//! of from RAM size alone. A point-in-time run: benchmark, score, recommend,
//! diff against the live kernel, and optionally apply in safe stages.
//!
//! ## Pipeline
//!
//! - **Collect**: short fixed-window benchmarks through sysbench and fio,
//!   with in-process native probes when the tools are absent
//! - **Normalize**: raw metrics become [1,100] scores against fixed
//!   baselines (50 = baseline parity)
//! - **Recommend**: scores, raw IOPS, and the hardware profile drive a
//!   multi-factor model producing targets for swap size and ten `vm.*`
//!   sysctls
//! - **Diff**: targets are compared to the live kernel state; only real
//!   changes survive
//! - **Apply**: a safety gate neutralizes anything risky, then changes land
//!   in three stages with an allocation-probe rollback guarding overcommit
//!
//! ## Quick Start
//!
//! ```no_run
//! use vmtune::config::{OutputFormat, TuneConfig};
//! use vmtune::core::TuneEngine;
//! use std::path::PathBuf;
//!
//! let config = TuneConfig {
//!     bench_secs: 5,
//!     target_dir: PathBuf::from("/var/tmp"),
//!     skip_bench: false,
//!     sysctl_conf: PathBuf::from("/etc/sysctl.d/99-vmtune.conf"),
//!     swap_file: PathBuf::from("/swapfile"),
//!     dry_run: true,
//!     assume_yes: false,
//!     format: OutputFormat::Text,
//!     quiet: false,
//! };
//!
//! let engine = TuneEngine::new(config);
//! let analysis = engine.analyze().unwrap();
//! println!("disk score: {:.1}", analysis.score.disk_score);
//! ```
//!
//! ## Safety model
//!
//! Two rules hold no matter what the measurements say:
//! `vm.overcommit_memory` is never set to 2, and `vm.min_free_kbytes` on a
//! host under 512 MB of RAM is never moved from its current value.

pub mod apply;
pub mod bench;
pub mod config;
pub mod core;
pub mod diff;
pub mod error;
pub mod kernel;
pub mod recommend;
pub mod report;
pub mod safety;
pub mod score;

pub use error::{Result, VmTuneError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::bench::{BenchmarkResult, DiskClass, HardwareProfile, IoProfile, Metric};
    pub use crate::config::{CliArgs, OutputFormat, TuneConfig};
    pub use crate::core::{Analysis, RunOutcome, TuneEngine, TuneReport};
    pub use crate::diff::ParameterDiff;
    pub use crate::error::{Result, VmTuneError};
    pub use crate::kernel::{Tunable, VmState};
    pub use crate::recommend::RecommendationSet;
    pub use crate::score::PerformanceScore;
}
