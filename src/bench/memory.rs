//! Memory benchmark
//!
//! Runs `sysbench memory` over fixed working sets: 1 MiB blocks / 10 GiB
//! total for the sequential read and write passes, 4 KiB blocks / 1 GiB for
//! the random-access pass, all with a thread count equal to the core count.
//! Degrades to a rayon memcpy probe when the tool is absent and to
//! documented defaults when its output is unusable.

use crate::bench::metric::{FallbackReason, Metric};
use crate::error::{Result, VmTuneError};
use rayon::prelude::*;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Conservative defaults in MB/s when measurement fails
const DEFAULT_READ_MB_S: f64 = 2000.0;
const DEFAULT_WRITE_MB_S: f64 = 1800.0;
const DEFAULT_RANDOM_MB_S: f64 = 800.0;

/// Memory metrics produced by the collector
#[derive(Debug, Clone)]
pub struct MemoryMetrics {
    /// Sequential read bandwidth in MB/s
    pub read_mb_s: Metric,
    /// Sequential write bandwidth in MB/s
    pub write_mb_s: Metric,
    /// Random-access bandwidth in MB/s
    pub random_mb_s: Metric,
}

/// One sysbench memory pass
#[derive(Debug, Clone, Copy)]
enum MemoryPass {
    SeqRead,
    SeqWrite,
    Random,
}

impl MemoryPass {
    fn args(&self) -> [&'static str; 4] {
        match self {
            MemoryPass::SeqRead => [
                "--memory-block-size=1M",
                "--memory-total-size=10G",
                "--memory-oper=read",
                "--memory-access-mode=seq",
            ],
            MemoryPass::SeqWrite => [
                "--memory-block-size=1M",
                "--memory-total-size=10G",
                "--memory-oper=write",
                "--memory-access-mode=seq",
            ],
            MemoryPass::Random => [
                "--memory-block-size=4K",
                "--memory-total-size=1G",
                "--memory-oper=read",
                "--memory-access-mode=rnd",
            ],
        }
    }

    fn default_mb_s(&self) -> f64 {
        match self {
            MemoryPass::SeqRead => DEFAULT_READ_MB_S,
            MemoryPass::SeqWrite => DEFAULT_WRITE_MB_S,
            MemoryPass::Random => DEFAULT_RANDOM_MB_S,
        }
    }
}

/// Memory benchmark runner
pub struct MemoryBench {
    /// Wall-clock window for each sysbench invocation
    pub duration_secs: u64,
    /// Window for the in-process probe
    pub probe_duration: Duration,
}

impl Default for MemoryBench {
    fn default() -> Self {
        Self {
            duration_secs: 10,
            probe_duration: Duration::from_secs(2),
        }
    }
}

impl MemoryBench {
    /// Run all three memory passes
    pub fn run(&self, threads: usize) -> MemoryMetrics {
        MemoryMetrics {
            read_mb_s: self.pass_metric(MemoryPass::SeqRead, threads),
            write_mb_s: self.pass_metric(MemoryPass::SeqWrite, threads),
            random_mb_s: self.pass_metric(MemoryPass::Random, threads),
        }
    }

    fn pass_metric(&self, pass: MemoryPass, threads: usize) -> Metric {
        match self.run_sysbench(pass, threads) {
            Ok(mb_s) => Metric::measured(mb_s),
            Err(VmTuneError::CommandFailed { message, .. })
                if message.contains("not found") =>
            {
                warn!(?pass, "sysbench not installed, using native memory probe");
                Metric::native(native_bandwidth_mb_s(threads, self.probe_duration))
            }
            Err(e) => {
                let reason = match e {
                    VmTuneError::BenchParse { .. } => FallbackReason::ParseFailed,
                    _ => FallbackReason::ToolFailed,
                };
                warn!(?pass, error = %e, "sysbench memory failed, using default");
                Metric::fallback(pass.default_mb_s(), reason)
            }
        }
    }

    fn run_sysbench(&self, pass: MemoryPass, threads: usize) -> Result<f64> {
        let time_arg = format!("--time={}", self.duration_secs);
        let threads_arg = format!("--threads={}", threads);
        let mut args = vec!["memory", time_arg.as_str(), threads_arg.as_str()];
        args.extend(pass.args());
        args.push("run");

        let output = Command::new("sysbench").args(&args).output().map_err(|e| {
            VmTuneError::CommandFailed {
                command: "sysbench memory".to_string(),
                message: if e.kind() == std::io::ErrorKind::NotFound {
                    "not found".to_string()
                } else {
                    e.to_string()
                },
            }
        })?;

        if !output.status.success() {
            return Err(VmTuneError::CommandFailed {
                command: "sysbench memory".to_string(),
                message: format!("exit status {}", output.status),
            });
        }

        parse_transfer_rate(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse the `NNN MiB transferred (MMM MiB/sec)` line from sysbench memory
/// output; the MiB/sec figure is returned as MB/s
pub fn parse_transfer_rate(output: &str) -> Result<f64> {
    for line in output.lines() {
        let trimmed = line.trim();
        if !trimmed.contains("transferred") {
            continue;
        }
        if let Some(open) = trimmed.find('(') {
            if let Some(num) = trimmed[open + 1..].trim_end().strip_suffix("MiB/sec)") {
                return num.trim().parse::<f64>().map_err(|_| {
                    VmTuneError::bench_parse("sysbench memory", trimmed.to_string())
                });
            }
        }
    }
    Err(VmTuneError::bench_parse(
        "sysbench memory",
        "no 'MiB/sec' transfer line",
    ))
}

/// Native probe: parallel memcpy over per-thread 64 MiB buffers
fn native_bandwidth_mb_s(threads: usize, window: Duration) -> f64 {
    const BUF_SIZE: usize = 64 * 1024 * 1024;
    debug!(threads, "running native memory probe");

    let bytes: u64 = (0..threads.max(1))
        .into_par_iter()
        .map(|_| {
            let src = vec![0x5au8; BUF_SIZE];
            let mut dst = vec![0u8; BUF_SIZE];
            let start = Instant::now();
            let mut copied = 0u64;
            while start.elapsed() < window {
                dst.copy_from_slice(&src);
                std::hint::black_box(&dst);
                copied += BUF_SIZE as u64;
            }
            copied
        })
        .sum();

    bytes as f64 / (1024.0 * 1024.0) / window.as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
Running memory speed test with the following options:
  block size: 1KiB
  total size: 102400MiB
  operation: read
  scope: global

Total operations: 46653566 (4665097.84 per second)

45560.12 MiB transferred (4556.02 MiB/sec)

General statistics:
    total time:                          10.0001s
"#;

    #[test]
    fn test_parse_transfer_rate() {
        let rate = parse_transfer_rate(SAMPLE).unwrap();
        assert!((rate - 4556.02).abs() < 1e-6);
    }

    #[test]
    fn test_parse_rejects_missing_line() {
        assert!(parse_transfer_rate("Total operations: 5 (0.5 per second)\n").is_err());
    }

    #[test]
    fn test_native_probe_positive() {
        let mb_s = native_bandwidth_mb_s(1, Duration::from_millis(50));
        assert!(mb_s > 0.0);
    }
}
