//! Configuration settings for vmtune
//!
//! Defines all CLI arguments, subcommands, and the resolved run
//! configuration handed to the engine.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// vmtune - Benchmark-driven Linux virtual-memory tuning
#[derive(Parser, Debug, Clone)]
#[command(name = "vmtune")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Benchmark-driven kernel VM tuning for Linux hosts")]
#[command(long_about = r#"
vmtune benchmarks the host (CPU, memory, disk), scores the results against
fixed baselines, and derives recommended values for the kernel's vm.*
tunables and swap size. Changes are applied in safe stages with a pre-apply
safety gate and an automatic overcommit rollback.

Examples:
  vmtune analyze                   # Benchmark and show recommendations
  vmtune bench --bench-secs 10     # Run the benchmarks only
  vmtune recommend --format json   # Machine-readable recommendation
  vmtune apply --dry-run           # Show what would change
  sudo vmtune apply --yes          # Apply without prompting
"#)]
pub struct CliArgs {
    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Output format for reports
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Per-benchmark duration in seconds
    #[arg(long, default_value = "5", value_name = "SECS", global = true)]
    pub bench_secs: u64,

    /// Directory for disk benchmark working files
    #[arg(long, default_value = "/var/tmp", value_name = "DIR", global = true)]
    pub target_dir: PathBuf,

    /// Skip benchmarks and use conservative defaults
    #[arg(long, global = true)]
    pub skip_bench: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Benchmark, score, recommend, and diff against the live state
    #[command(name = "analyze")]
    Analyze,

    /// Run the benchmarks and print raw metrics
    #[command(name = "bench")]
    Bench,

    /// Print the recommended tunable values
    #[command(name = "recommend")]
    Recommend,

    /// Apply recommended changes in stages
    #[command(name = "apply")]
    Apply {
        /// Apply without the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        /// Show what would change without touching the system
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Persisted sysctl drop-in path
        #[arg(long, default_value = "/etc/sysctl.d/99-vmtune.conf", value_name = "PATH")]
        sysctl_conf: PathBuf,

        /// Swap file path
        #[arg(long, default_value = "/swapfile", value_name = "PATH")]
        swap_file: PathBuf,
    },
}

/// Report output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Machine-readable JSON
    Json,
}

/// Resolved run configuration
#[derive(Debug, Clone)]
pub struct TuneConfig {
    pub bench_secs: u64,
    pub target_dir: PathBuf,
    pub skip_bench: bool,
    pub sysctl_conf: PathBuf,
    pub swap_file: PathBuf,
    pub dry_run: bool,
    pub assume_yes: bool,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl TuneConfig {
    /// Build the run configuration from parsed CLI arguments
    pub fn from_args(args: &CliArgs) -> Self {
        let (dry_run, assume_yes, sysctl_conf, swap_file) = match &args.command {
            Some(Commands::Apply {
                yes,
                dry_run,
                sysctl_conf,
                swap_file,
            }) => (*dry_run, *yes, sysctl_conf.clone(), swap_file.clone()),
            _ => (
                false,
                false,
                PathBuf::from("/etc/sysctl.d/99-vmtune.conf"),
                PathBuf::from("/swapfile"),
            ),
        };

        TuneConfig {
            bench_secs: args.bench_secs.max(1),
            target_dir: args.target_dir.clone(),
            skip_bench: args.skip_bench,
            sysctl_conf,
            swap_file,
            dry_run,
            assume_yes,
            format: args.format,
            quiet: args.quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["vmtune", "analyze"]);
        let config = TuneConfig::from_args(&args);
        assert_eq!(config.bench_secs, 5);
        assert!(!config.skip_bench);
        assert!(!config.dry_run);
        assert_eq!(config.format, OutputFormat::Text);
    }

    #[test]
    fn test_apply_flags() {
        let args = CliArgs::parse_from([
            "vmtune",
            "apply",
            "--yes",
            "--dry-run",
            "--swap-file",
            "/mnt/swapfile",
        ]);
        let config = TuneConfig::from_args(&args);
        assert!(config.assume_yes);
        assert!(config.dry_run);
        assert_eq!(config.swap_file, PathBuf::from("/mnt/swapfile"));
        assert_eq!(
            config.sysctl_conf,
            PathBuf::from("/etc/sysctl.d/99-vmtune.conf")
        );
    }

    #[test]
    fn test_bench_secs_floor() {
        let args = CliArgs::parse_from(["vmtune", "--bench-secs", "0", "bench"]);
        let config = TuneConfig::from_args(&args);
        assert_eq!(config.bench_secs, 1);
    }
}
