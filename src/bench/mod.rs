//! Benchmark collector
//!
//! Measures host CPU, memory, and disk capability through short fixed-window
//! micro-benchmarks and identifies the hardware they ran on. External tools
//! (sysbench, fio) do the heavy lifting; every metric degrades locally to a
//! native probe or a documented default instead of failing the run.

pub mod cpu;
pub mod disk;
pub mod hardware;
pub mod memory;
pub mod metric;

pub use hardware::{DiskClass, HardwareProfile, IoProfile};
pub use metric::{FallbackReason, Metric, MetricSource};

use crate::error::Result;
use cpu::CpuBench;
use disk::DiskBench;
use indicatif::{ProgressBar, ProgressStyle};
use memory::MemoryBench;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Raw benchmark metrics, read-only input to scoring and recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Single-thread CPU events per second
    pub cpu_events_single: Metric,
    /// Multi-thread CPU events per second
    pub cpu_events_multi: Metric,
    /// Integer arithmetic throughput in Mops/s
    pub cpu_int_mops: Metric,
    /// Floating-point throughput in Mops/s
    pub cpu_float_mops: Metric,
    /// Sequential memory read bandwidth in MB/s
    pub memory_read_mb_s: Metric,
    /// Sequential memory write bandwidth in MB/s
    pub memory_write_mb_s: Metric,
    /// Random-access memory bandwidth in MB/s
    pub memory_random_mb_s: Metric,
    /// Sequential disk read throughput in MB/s
    pub disk_seq_read_mb_s: Metric,
    /// Sequential disk write throughput in MB/s
    pub disk_seq_write_mb_s: Metric,
    /// Random 4 KiB disk read IOPS
    pub disk_rand_read_iops: Metric,
    /// Random 4 KiB disk write IOPS
    pub disk_rand_write_iops: Metric,
    /// Average single-queue-depth disk latency in microseconds
    pub disk_latency_us: Metric,
}

impl BenchmarkResult {
    /// Conservative result used with `--skip-bench` — every metric is a
    /// documented default, marked as such
    pub fn conservative(class: DiskClass, cores: usize) -> Self {
        use metric::FallbackReason::ToolMissing;
        let f = |v| Metric::fallback(v, ToolMissing);
        let (sr, sw, rr, rw, lat) = match class {
            DiskClass::Ssd => (400.0, 350.0, 8000.0, 6000.0, 200.0),
            DiskClass::Hdd => (120.0, 100.0, 150.0, 130.0, 8000.0),
        };
        BenchmarkResult {
            cpu_events_single: f(500.0),
            cpu_events_multi: f(250.0 * cores as f64),
            cpu_int_mops: f(600.0),
            cpu_float_mops: f(400.0),
            memory_read_mb_s: f(2000.0),
            memory_write_mb_s: f(1800.0),
            memory_random_mb_s: f(800.0),
            disk_seq_read_mb_s: f(sr),
            disk_seq_write_mb_s: f(sw),
            disk_rand_read_iops: f(rr),
            disk_rand_write_iops: f(rw),
            disk_latency_us: f(lat),
        }
    }

    /// Names of metrics that fell back to defaults, for the report
    pub fn fallback_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let mut check = |name, m: &Metric| {
            if m.is_fallback() {
                fields.push(name);
            }
        };
        check("cpu_events_single", &self.cpu_events_single);
        check("cpu_events_multi", &self.cpu_events_multi);
        check("cpu_int_mops", &self.cpu_int_mops);
        check("cpu_float_mops", &self.cpu_float_mops);
        check("memory_read_mb_s", &self.memory_read_mb_s);
        check("memory_write_mb_s", &self.memory_write_mb_s);
        check("memory_random_mb_s", &self.memory_random_mb_s);
        check("disk_seq_read_mb_s", &self.disk_seq_read_mb_s);
        check("disk_seq_write_mb_s", &self.disk_seq_write_mb_s);
        check("disk_rand_read_iops", &self.disk_rand_read_iops);
        check("disk_rand_write_iops", &self.disk_rand_write_iops);
        check("disk_latency_us", &self.disk_latency_us);
        fields
    }
}

/// Runs the full benchmark suite and identifies the hardware
pub struct Collector {
    /// Fixed wall-clock window per benchmark invocation
    pub bench_secs: u64,
    /// Directory on the root filesystem for disk working files
    pub target_dir: PathBuf,
    /// Suppress the progress spinner
    pub quiet: bool,
}

impl Default for Collector {
    fn default() -> Self {
        Self {
            bench_secs: 10,
            target_dir: PathBuf::from("/var/tmp"),
            quiet: false,
        }
    }
}

impl Collector {
    /// Run every benchmark and return the hardware profile plus raw metrics
    ///
    /// The profile's I/O classification is finalized here, after the disk
    /// benchmark; the returned profile is immutable from then on.
    pub fn collect(&self) -> Result<(HardwareProfile, BenchmarkResult)> {
        let mut hw = HardwareProfile::detect();
        info!(
            cores = hw.cpu_core_count,
            ram_mb = hw.total_ram_mb,
            disk = %hw.disk_device,
            "hardware detected"
        );

        let spinner = self.spinner();

        spinner.set_message("benchmarking CPU...");
        let cpu = CpuBench {
            duration_secs: self.bench_secs,
            ..Default::default()
        }
        .run(hw.cpu_core_count);

        spinner.set_message("benchmarking memory...");
        let mem = MemoryBench {
            duration_secs: self.bench_secs,
            ..Default::default()
        }
        .run(hw.cpu_core_count);

        spinner.set_message("benchmarking disk...");
        let mut disk_bench = DiskBench::new(&self.target_dir);
        disk_bench.duration_secs = self.bench_secs;
        let disk = disk_bench.run(hw.disk_class);

        spinner.finish_and_clear();

        hw.classify_io(disk.seq_read_mb_s.value, disk.rand_read_iops.value);
        info!(io_profile = ?hw.io_profile, "storage path classified");

        let result = BenchmarkResult {
            cpu_events_single: cpu.events_single,
            cpu_events_multi: cpu.events_multi,
            cpu_int_mops: cpu.int_mops,
            cpu_float_mops: cpu.float_mops,
            memory_read_mb_s: mem.read_mb_s,
            memory_write_mb_s: mem.write_mb_s,
            memory_random_mb_s: mem.random_mb_s,
            disk_seq_read_mb_s: disk.seq_read_mb_s,
            disk_seq_write_mb_s: disk.seq_write_mb_s,
            disk_rand_read_iops: disk.rand_read_iops,
            disk_rand_write_iops: disk.rand_write_iops,
            disk_latency_us: disk.latency_us,
        };

        Ok((hw, result))
    }

    fn spinner(&self) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conservative_result_marks_every_metric() {
        let result = BenchmarkResult::conservative(DiskClass::Hdd, 4);
        assert_eq!(result.fallback_fields().len(), 12);
        assert!((result.cpu_events_multi.value - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_fallback_fields_empty_for_measured() {
        let m = Metric::measured(1.0);
        let result = BenchmarkResult {
            cpu_events_single: m,
            cpu_events_multi: m,
            cpu_int_mops: m,
            cpu_float_mops: m,
            memory_read_mb_s: m,
            memory_write_mb_s: m,
            memory_random_mb_s: m,
            disk_seq_read_mb_s: m,
            disk_seq_write_mb_s: m,
            disk_rand_read_iops: m,
            disk_rand_write_iops: m,
            disk_latency_us: m,
        };
        assert!(result.fallback_fields().is_empty());
    }
}
