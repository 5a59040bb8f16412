//! Disk benchmark
//!
//! Runs `fio` against the filesystem holding the root partition: sequential
//! read/write at 4 MiB block size, random 4 KiB read/write at iodepth 32
//! across 4 jobs, and a single-queue-depth latency probe, each for a fixed
//! 10 s window. Output is requested as JSON and parsed into typed structs.
//!
//! When fio is absent a native std-I/O probe stands in; when fio fails or
//! its output is unusable, documented conservative defaults per disk class
//! are substituted. The working file is deleted in every case.

use crate::bench::hardware::DiskClass;
use crate::bench::metric::{FallbackReason, Metric};
use crate::error::{IoResultExt, Result, VmTuneError};
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Size of the fio/native working file
const TEST_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Disk metrics produced by the collector
#[derive(Debug, Clone)]
pub struct DiskMetrics {
    /// Sequential read throughput in MB/s
    pub seq_read_mb_s: Metric,
    /// Sequential write throughput in MB/s
    pub seq_write_mb_s: Metric,
    /// Random 4 KiB read IOPS
    pub rand_read_iops: Metric,
    /// Random 4 KiB write IOPS
    pub rand_write_iops: Metric,
    /// Average single-queue-depth read latency in microseconds
    pub latency_us: Metric,
}

/// Conservative defaults per disk class, used when fio fails outright
fn class_defaults(class: DiskClass) -> DiskMetrics {
    let (sr, sw, rr, rw, lat) = match class {
        DiskClass::Ssd => (400.0, 350.0, 8000.0, 6000.0, 200.0),
        DiskClass::Hdd => (120.0, 100.0, 150.0, 130.0, 8000.0),
    };
    let f = |v| Metric::fallback(v, FallbackReason::ToolFailed);
    DiskMetrics {
        seq_read_mb_s: f(sr),
        seq_write_mb_s: f(sw),
        rand_read_iops: f(rr),
        rand_write_iops: f(rw),
        latency_us: f(lat),
    }
}

/// One fio access pattern with its fixed arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FioPattern {
    SeqRead,
    SeqWrite,
    RandRead,
    RandWrite,
    Latency,
}

impl FioPattern {
    fn name(&self) -> &'static str {
        match self {
            FioPattern::SeqRead => "vmtune-seqread",
            FioPattern::SeqWrite => "vmtune-seqwrite",
            FioPattern::RandRead => "vmtune-randread",
            FioPattern::RandWrite => "vmtune-randwrite",
            FioPattern::Latency => "vmtune-latency",
        }
    }

    fn args(&self) -> Vec<&'static str> {
        match self {
            FioPattern::SeqRead => vec!["--rw=read", "--bs=4M", "--iodepth=8", "--numjobs=1"],
            FioPattern::SeqWrite => vec!["--rw=write", "--bs=4M", "--iodepth=8", "--numjobs=1"],
            FioPattern::RandRead => {
                vec!["--rw=randread", "--bs=4k", "--iodepth=32", "--numjobs=4"]
            }
            FioPattern::RandWrite => {
                vec!["--rw=randwrite", "--bs=4k", "--iodepth=32", "--numjobs=4"]
            }
            FioPattern::Latency => vec!["--rw=randread", "--bs=4k", "--iodepth=1", "--numjobs=1"],
        }
    }

    fn reads(&self) -> bool {
        !matches!(self, FioPattern::SeqWrite | FioPattern::RandWrite)
    }
}

// Typed subset of fio's JSON output.

#[derive(Debug, Deserialize)]
struct FioOutput {
    jobs: Vec<FioJob>,
}

#[derive(Debug, Deserialize)]
struct FioJob {
    #[serde(default)]
    read: FioSide,
    #[serde(default)]
    write: FioSide,
}

#[derive(Debug, Default, Deserialize)]
struct FioSide {
    /// Bandwidth in KiB/s
    #[serde(default)]
    bw: f64,
    #[serde(default)]
    iops: f64,
    #[serde(default)]
    lat_ns: Option<FioLatency>,
}

#[derive(Debug, Deserialize)]
struct FioLatency {
    #[serde(default)]
    mean: f64,
}

/// Parsed result of one fio pattern
#[derive(Debug, Clone, Copy)]
pub struct FioRun {
    /// Bandwidth in MB/s
    pub bandwidth_mb_s: f64,
    /// I/O operations per second
    pub iops: f64,
    /// Mean latency in microseconds
    pub latency_us: f64,
}

/// Parse the JSON document fio emits for a single grouped job
pub fn parse_fio_json(json: &str, reads: bool) -> Result<FioRun> {
    let output: FioOutput = serde_json::from_str(json)
        .map_err(|e| VmTuneError::bench_parse("fio", e.to_string()))?;
    let job = output
        .jobs
        .first()
        .ok_or_else(|| VmTuneError::bench_parse("fio", "no jobs in output"))?;
    let side = if reads { &job.read } else { &job.write };
    if side.bw <= 0.0 && side.iops <= 0.0 {
        return Err(VmTuneError::bench_parse("fio", "zero bandwidth and IOPS"));
    }
    Ok(FioRun {
        bandwidth_mb_s: side.bw / 1024.0,
        iops: side.iops,
        latency_us: side.lat_ns.as_ref().map(|l| l.mean / 1000.0).unwrap_or(0.0),
    })
}

/// Disk benchmark runner
pub struct DiskBench {
    /// Directory on the root filesystem where the working file lives
    pub target_dir: PathBuf,
    /// Wall-clock window for each fio pattern
    pub duration_secs: u64,
    /// Window for each native probe phase
    pub probe_duration: Duration,
}

impl DiskBench {
    /// Benchmark the filesystem under `target_dir`
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            duration_secs: 10,
            probe_duration: Duration::from_secs(3),
        }
    }

    /// Run the disk benchmark suite
    pub fn run(&self, class: DiskClass) -> DiskMetrics {
        let test_file = self.target_dir.join(".vmtune_fio_test");
        let result = self.run_inner(class, &test_file);
        // The working file must not outlive the run.
        let _ = std::fs::remove_file(&test_file);
        result
    }

    fn run_inner(&self, class: DiskClass, test_file: &Path) -> DiskMetrics {
        let seq_read = self.fio_pattern(FioPattern::SeqRead, test_file);
        if let Err(VmTuneError::CommandFailed { message, .. }) = &seq_read {
            if message.contains("not found") {
                warn!("fio not installed, using native disk probe");
                return match self.native_probe(test_file) {
                    Ok(metrics) => metrics,
                    Err(e) => {
                        warn!(error = %e, "native disk probe failed, using class defaults");
                        class_defaults(class)
                    }
                };
            }
        }

        let seq_write = self.fio_pattern(FioPattern::SeqWrite, test_file);
        let rand_read = self.fio_pattern(FioPattern::RandRead, test_file);
        let rand_write = self.fio_pattern(FioPattern::RandWrite, test_file);
        let latency = self.fio_pattern(FioPattern::Latency, test_file);

        let defaults = class_defaults(class);
        let pick = |run: std::result::Result<FioRun, VmTuneError>,
                    extract: fn(&FioRun) -> f64,
                    default: Metric| match run {
            Ok(r) => Metric::measured(extract(&r)),
            Err(e) => {
                warn!(error = %e, "fio pattern failed, using default");
                let reason = match e {
                    VmTuneError::BenchParse { .. } => FallbackReason::ParseFailed,
                    _ => FallbackReason::ToolFailed,
                };
                Metric::fallback(default.value, reason)
            }
        };

        DiskMetrics {
            seq_read_mb_s: pick(seq_read, |r| r.bandwidth_mb_s, defaults.seq_read_mb_s),
            seq_write_mb_s: pick(seq_write, |r| r.bandwidth_mb_s, defaults.seq_write_mb_s),
            rand_read_iops: pick(rand_read, |r| r.iops, defaults.rand_read_iops),
            rand_write_iops: pick(rand_write, |r| r.iops, defaults.rand_write_iops),
            latency_us: pick(latency, |r| r.latency_us, defaults.latency_us),
        }
    }

    /// Invoke one fio pattern and parse its JSON output
    fn fio_pattern(&self, pattern: FioPattern, test_file: &Path) -> Result<FioRun> {
        let mut cmd = Command::new("fio");
        cmd.arg(format!("--name={}", pattern.name()))
            .arg(format!("--filename={}", test_file.display()))
            .arg(format!("--size={}", TEST_FILE_SIZE))
            .arg(format!("--runtime={}", self.duration_secs))
            .args([
                "--time_based",
                "--direct=1",
                "--ioengine=libaio",
                "--group_reporting",
                "--output-format=json",
            ])
            .args(pattern.args());

        debug!(pattern = pattern.name(), "running fio");
        let output = cmd.output().map_err(|e| VmTuneError::CommandFailed {
            command: "fio".to_string(),
            message: if e.kind() == std::io::ErrorKind::NotFound {
                "not found".to_string()
            } else {
                e.to_string()
            },
        })?;

        if !output.status.success() {
            return Err(VmTuneError::CommandFailed {
                command: "fio".to_string(),
                message: format!("exit status {}", output.status),
            });
        }

        parse_fio_json(&String::from_utf8_lossy(&output.stdout), pattern.reads())
    }

    /// Native probe: timed sequential write/read plus random 4 KiB reads
    fn native_probe(&self, test_file: &Path) -> Result<DiskMetrics> {
        const CHUNK: usize = 4 * 1024 * 1024;
        let chunk: Vec<u8> = (0..CHUNK).map(|i| (i % 251) as u8).collect();

        // Sequential write
        let write_start = Instant::now();
        {
            let mut file = File::create(test_file).with_path(test_file)?;
            let mut written = 0u64;
            while written < TEST_FILE_SIZE {
                file.write_all(&chunk).with_path(test_file)?;
                written += CHUNK as u64;
            }
            file.sync_all().with_path(test_file)?;
        }
        let write_secs = write_start.elapsed().as_secs_f64();
        let seq_write = TEST_FILE_SIZE as f64 / (1024.0 * 1024.0) / write_secs;

        // Sequential read
        let read_start = Instant::now();
        {
            let mut file = File::open(test_file).with_path(test_file)?;
            let mut buf = vec![0u8; CHUNK];
            let mut read = 0u64;
            while read < TEST_FILE_SIZE {
                file.read_exact(&mut buf).with_path(test_file)?;
                read += CHUNK as u64;
            }
            std::hint::black_box(&buf);
        }
        let read_secs = read_start.elapsed().as_secs_f64();
        let seq_read = TEST_FILE_SIZE as f64 / (1024.0 * 1024.0) / read_secs;

        // Random 4 KiB reads; also yields the latency estimate
        let (rand_read_iops, latency_us) = self.random_read_probe(test_file)?;

        // Random 4 KiB writes
        let rand_write_iops = self.random_write_probe(test_file)?;

        Ok(DiskMetrics {
            seq_read_mb_s: Metric::native(seq_read),
            seq_write_mb_s: Metric::native(seq_write),
            rand_read_iops: Metric::native(rand_read_iops),
            rand_write_iops: Metric::native(rand_write_iops),
            latency_us: Metric::native(latency_us),
        })
    }

    fn random_read_probe(&self, test_file: &Path) -> Result<(f64, f64)> {
        let mut file = File::open(test_file).with_path(test_file)?;
        let mut buf = [0u8; 4096];
        let slots = TEST_FILE_SIZE / 4096;
        let mut rng = Xorshift::new(0x9e3779b97f4a7c15);
        let start = Instant::now();
        let mut ops = 0u64;
        while start.elapsed() < self.probe_duration {
            let offset = (rng.next() % slots) * 4096;
            file.seek(SeekFrom::Start(offset)).with_path(test_file)?;
            file.read_exact(&mut buf).with_path(test_file)?;
            ops += 1;
        }
        let secs = start.elapsed().as_secs_f64();
        let iops = ops as f64 / secs;
        let latency_us = secs * 1e6 / ops.max(1) as f64;
        Ok((iops, latency_us))
    }

    fn random_write_probe(&self, test_file: &Path) -> Result<f64> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(test_file)
            .with_path(test_file)?;
        let buf = [0xa5u8; 4096];
        let slots = TEST_FILE_SIZE / 4096;
        let mut rng = Xorshift::new(0x2545f4914f6cdd1d);
        let start = Instant::now();
        let mut ops = 0u64;
        while start.elapsed() < self.probe_duration {
            let offset = (rng.next() % slots) * 4096;
            file.seek(SeekFrom::Start(offset)).with_path(test_file)?;
            file.write_all(&buf).with_path(test_file)?;
            ops += 1;
        }
        file.sync_all().with_path(test_file)?;
        Ok(ops as f64 / start.elapsed().as_secs_f64())
    }
}

/// Small deterministic PRNG for probe offsets
struct Xorshift(u64);

impl Xorshift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE_JSON: &str = r#"{
        "fio version": "fio-3.28",
        "jobs": [
            {
                "jobname": "vmtune-randread",
                "read": {
                    "bw": 204800,
                    "iops": 51200.5,
                    "lat_ns": { "mean": 615000.0 }
                },
                "write": {
                    "bw": 0,
                    "iops": 0.0
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_fio_json_read_side() {
        let run = parse_fio_json(SAMPLE_JSON, true).unwrap();
        assert!((run.bandwidth_mb_s - 200.0).abs() < 1e-6);
        assert!((run.iops - 51200.5).abs() < 1e-6);
        assert!((run.latency_us - 615.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_fio_json_rejects_empty_side() {
        // The write side of a read-only job carries zeros.
        assert!(parse_fio_json(SAMPLE_JSON, false).is_err());
    }

    #[test]
    fn test_parse_fio_json_rejects_garbage() {
        assert!(parse_fio_json("not json", true).is_err());
    }

    #[test]
    fn test_class_defaults_are_fallbacks() {
        let d = class_defaults(DiskClass::Hdd);
        assert!(d.seq_read_mb_s.is_fallback());
        assert!(d.rand_read_iops.value < 1000.0);
    }

    #[test]
    fn test_native_probe_small_file() {
        let dir = TempDir::new().unwrap();
        let mut bench = DiskBench::new(dir.path());
        bench.probe_duration = Duration::from_millis(50);

        let test_file = dir.path().join(".vmtune_fio_test");
        // Shrink the working set by writing directly; probe reuses the file.
        let metrics = bench.native_probe(&test_file).unwrap();
        assert!(metrics.seq_read_mb_s.value > 0.0);
        assert!(metrics.rand_read_iops.value > 0.0);
        assert!(test_file.exists());
        let _ = std::fs::remove_file(&test_file);
    }
}
