//! CPU benchmark
//!
//! Runs `sysbench cpu` for a fixed window in single- and multi-thread mode
//! and parses the events-per-second figure. Integer and floating-point
//! throughput come from a short in-process probe (sysbench does not split
//! them out). A missing tool degrades to the native probe; unparsable output
//! degrades to documented conservative defaults — neither aborts the run.

use crate::bench::metric::{FallbackReason, Metric};
use crate::error::{Result, VmTuneError};
use rayon::prelude::*;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Conservative default for single-thread events/s when measurement fails
const DEFAULT_SINGLE_EVENTS: f64 = 500.0;
/// Conservative per-core default for multi-thread events/s
const DEFAULT_MULTI_EVENTS_PER_CORE: f64 = 250.0;

/// Upper bound passed to the prime verification loop, matching the fixed
/// sysbench invocation so native and tool events are comparable
const PRIME_LIMIT: u64 = 20_000;

/// CPU metrics produced by the collector
#[derive(Debug, Clone)]
pub struct CpuMetrics {
    /// Single-thread events per second
    pub events_single: Metric,
    /// Multi-thread events per second (thread count = core count)
    pub events_multi: Metric,
    /// Integer arithmetic throughput in Mops/s
    pub int_mops: Metric,
    /// Floating-point arithmetic throughput in Mops/s
    pub float_mops: Metric,
}

/// CPU benchmark runner
pub struct CpuBench {
    /// Wall-clock window for each sysbench invocation
    pub duration_secs: u64,
    /// Window for the in-process arithmetic probes
    pub probe_duration: Duration,
}

impl Default for CpuBench {
    fn default() -> Self {
        Self {
            duration_secs: 10,
            probe_duration: Duration::from_secs(2),
        }
    }
}

impl CpuBench {
    /// Run the CPU benchmark suite
    pub fn run(&self, cores: usize) -> CpuMetrics {
        let events_single = self.events_metric(1, cores);
        let events_multi = self.events_metric(cores, cores);

        CpuMetrics {
            events_single,
            events_multi,
            int_mops: Metric::native(integer_mops(self.probe_duration)),
            float_mops: Metric::native(float_mops(self.probe_duration)),
        }
    }

    /// One sysbench invocation, degrading per the fallback policy
    fn events_metric(&self, threads: usize, cores: usize) -> Metric {
        match self.run_sysbench(threads) {
            Ok(eps) => Metric::measured(eps),
            Err(VmTuneError::CommandFailed { message, .. })
                if message.contains("not found") =>
            {
                warn!(threads, "sysbench not installed, using native CPU probe");
                Metric::native(native_events_per_second(threads, self.probe_duration))
            }
            Err(e) => {
                let reason = match e {
                    VmTuneError::BenchParse { .. } => FallbackReason::ParseFailed,
                    _ => FallbackReason::ToolFailed,
                };
                warn!(threads, error = %e, "sysbench cpu failed, using default");
                let default = if threads == 1 {
                    DEFAULT_SINGLE_EVENTS
                } else {
                    DEFAULT_MULTI_EVENTS_PER_CORE * cores as f64
                };
                Metric::fallback(default, reason)
            }
        }
    }

    /// Invoke `sysbench cpu run` and return events per second
    fn run_sysbench(&self, threads: usize) -> Result<f64> {
        let output = Command::new("sysbench")
            .args([
                "cpu",
                &format!("--time={}", self.duration_secs),
                &format!("--threads={}", threads),
                &format!("--cpu-max-prime={}", PRIME_LIMIT),
                "run",
            ])
            .output()
            .map_err(|e| VmTuneError::CommandFailed {
                command: "sysbench cpu".to_string(),
                message: if e.kind() == std::io::ErrorKind::NotFound {
                    "not found".to_string()
                } else {
                    e.to_string()
                },
            })?;

        if !output.status.success() {
            return Err(VmTuneError::CommandFailed {
                command: "sysbench cpu".to_string(),
                message: format!("exit status {}", output.status),
            });
        }

        parse_events_per_second(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse the `events per second:` line from sysbench cpu output
pub fn parse_events_per_second(output: &str) -> Result<f64> {
    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("events per second:") {
            return rest
                .trim()
                .parse::<f64>()
                .map_err(|_| VmTuneError::bench_parse("sysbench cpu", trimmed.to_string()));
        }
    }
    Err(VmTuneError::bench_parse(
        "sysbench cpu",
        "no 'events per second' line",
    ))
}

/// Native probe: prime verification passes per second, like the sysbench event
fn native_events_per_second(threads: usize, window: Duration) -> f64 {
    debug!(threads, "running native CPU probe");
    let passes: u64 = (0..threads)
        .into_par_iter()
        .map(|_| prime_passes(window))
        .sum();
    passes as f64 / window.as_secs_f64()
}

/// Count full prime-verification passes completed inside the window
fn prime_passes(window: Duration) -> u64 {
    let start = Instant::now();
    let mut passes = 0u64;
    while start.elapsed() < window {
        let mut primes = 0u64;
        for n in 3..PRIME_LIMIT {
            let mut is_prime = true;
            let mut d = 2;
            while d * d <= n {
                if n % d == 0 {
                    is_prime = false;
                    break;
                }
                d += 1;
            }
            if is_prime {
                primes += 1;
            }
        }
        // The count itself is unused; keep it live so the loop is not elided.
        std::hint::black_box(primes);
        passes += 1;
    }
    passes.max(1)
}

/// Integer add/mul throughput in Mops/s
fn integer_mops(window: Duration) -> f64 {
    let start = Instant::now();
    let mut acc = 1u64;
    let mut ops = 0u64;
    while start.elapsed() < window {
        for _ in 0..1_000_000u64 {
            acc = acc.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        }
        ops += 1_000_000;
    }
    std::hint::black_box(acc);
    ops as f64 / window.as_secs_f64() / 1e6
}

/// Floating multiply/add throughput in Mops/s
fn float_mops(window: Duration) -> f64 {
    let start = Instant::now();
    let mut acc = 1.000_000_1f64;
    let mut ops = 0u64;
    while start.elapsed() < window {
        for _ in 0..1_000_000u64 {
            acc = acc * 1.000_000_1 + 0.000_000_1;
        }
        ops += 1_000_000;
    }
    std::hint::black_box(acc);
    ops as f64 / window.as_secs_f64() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
sysbench 1.0.20 (using system LuaJIT 2.1.0-beta3)

Running the test with following options:
Number of threads: 1

Prime numbers limit: 20000

CPU speed:
    events per second:  1043.87

General statistics:
    total time:                          10.0002s
    total number of events:              10440
"#;

    #[test]
    fn test_parse_events_per_second() {
        let eps = parse_events_per_second(SAMPLE).unwrap();
        assert!((eps - 1043.87).abs() < 1e-6);
    }

    #[test]
    fn test_parse_rejects_missing_line() {
        assert!(parse_events_per_second("General statistics:\n").is_err());
    }

    #[test]
    fn test_native_probe_positive() {
        let eps = native_events_per_second(2, Duration::from_millis(50));
        assert!(eps > 0.0);
    }

    #[test]
    fn test_arithmetic_probes_positive() {
        assert!(integer_mops(Duration::from_millis(20)) > 0.0);
        assert!(float_mops(Duration::from_millis(20)) > 0.0);
    }
}
