//! Recommendation pipeline benchmarks
//!
//! The compute half of the pipeline (normalize, recommend, diff) runs on
//! every invocation; keep it cheap enough to be free next to the actual
//! benchmarks it consumes.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vmtune::bench::{BenchmarkResult, DiskClass, HardwareProfile, IoProfile, Metric};
use vmtune::diff;
use vmtune::kernel::VmState;
use vmtune::recommend;
use vmtune::score;

fn fixture() -> (HardwareProfile, BenchmarkResult, VmState) {
    let mut hw = HardwareProfile::detect();
    hw.total_ram_mb = 16384;
    hw.cpu_core_count = 8;
    hw.disk_class = DiskClass::Ssd;
    hw.io_profile = IoProfile::Physical;

    let bench = BenchmarkResult {
        cpu_events_single: Metric::measured(1450.0),
        cpu_events_multi: Metric::measured(9200.0),
        cpu_int_mops: Metric::measured(1600.0),
        cpu_float_mops: Metric::measured(950.0),
        memory_read_mb_s: Metric::measured(7800.0),
        memory_write_mb_s: Metric::measured(6100.0),
        memory_random_mb_s: Metric::measured(2100.0),
        disk_seq_read_mb_s: Metric::measured(520.0),
        disk_seq_write_mb_s: Metric::measured(480.0),
        disk_rand_read_iops: Metric::measured(68000.0),
        disk_rand_write_iops: Metric::measured(52000.0),
        disk_latency_us: Metric::measured(140.0),
    };

    let current = VmState {
        swap_size_mb: 2048,
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
    };

    (hw, bench, current)
}

fn bench_normalize(c: &mut Criterion) {
    let (hw, bench, _) = fixture();
    c.bench_function("normalize_scores", |b| {
        b.iter(|| score::normalize(black_box(&bench), black_box(&hw)))
    });
}

fn bench_recommend(c: &mut Criterion) {
    let (hw, bench, current) = fixture();
    let s = score::normalize(&bench, &hw);
    c.bench_function("recommend_full", |b| {
        b.iter(|| {
            recommend::recommend(
                black_box(&hw),
                black_box(&bench),
                black_box(&s),
                black_box(&current),
            )
        })
    });
}

fn bench_diff(c: &mut Criterion) {
    let (hw, bench, current) = fixture();
    let s = score::normalize(&bench, &hw);
    let rec = recommend::recommend(&hw, &bench, &s, &current);
    c.bench_function("diff_tunables", |b| {
        b.iter(|| diff::diff(black_box(&current), black_box(&rec), hw.total_ram_mb))
    });
}

criterion_group!(benches, bench_normalize, bench_recommend, bench_diff);
criterion_main!(benches);
