//! Run reporting
//!
//! Renders pipeline output for people (text) or machines (JSON). Text output
//! goes to stdout with plain `println!`; logging stays on the tracing
//! subscriber and never mixes into report output.

use crate::bench::{BenchmarkResult, HardwareProfile};
use crate::config::OutputFormat;
use crate::core::TuneReport;
use crate::diff::ParameterDiff;
use crate::error::Result;
use crate::kernel::swap::SwapDevice;
use crate::recommend::RecommendationSet;
use crate::score::PerformanceScore;

/// Render a full run report in the requested format
pub fn render(report: &TuneReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => print_text(report),
    }
    Ok(())
}

fn print_text(report: &TuneReport) {
    print_hardware(&report.analysis.hardware);
    print_swaps(&report.analysis.swap_devices);
    print_scores(&report.analysis.score);
    print_diffs(&report.analysis.diffs);

    if let Some(safety) = &report.safety {
        if let Some(reason) = &safety.reason {
            println!("\nSafety gate: REJECTED — {}", reason);
        }
        for note in &safety.adjustments {
            println!("Safety gate: {}", note);
        }
    }

    if let Some(apply) = &report.apply {
        println!();
        for key in &apply.applied {
            println!("Applied:   {}", key);
        }
        if let Some(mb) = apply.swap_resized_mb {
            println!("Applied:   swap resized to {} MB", mb);
        }
        if let Some(path) = &apply.persisted_to {
            println!("Persisted: {}", path.display());
        }
        if let Some(backup) = &apply.backup {
            println!("Backup:    {}", backup.display());
        }
        for (what, why) in &apply.failed {
            println!("Failed:    {} ({})", what, why);
        }
        if apply.rolled_back {
            println!(
                "Rollback:  overcommit reverted ({})",
                apply.rollback_reason.as_deref().unwrap_or("unknown reason")
            );
        }
    }

    println!(
        "\nOutcome: {:?} in {}",
        report.outcome,
        humantime::format_duration(std::time::Duration::from_secs(
            report.duration_secs as u64
        ))
    );
}

/// Print the hardware profile
pub fn print_hardware(hw: &HardwareProfile) {
    println!("Hardware");
    println!("  CPU:    {} ({} cores)", hw.cpu_model, hw.cpu_core_count);
    println!(
        "  Memory: {} ({}), {} available",
        humansize::format_size(hw.total_ram_mb * 1024 * 1024, humansize::BINARY),
        hw.memory_kind,
        humansize::format_size(hw.available_ram_mb * 1024 * 1024, humansize::BINARY)
    );
    println!(
        "  Disk:   {} ({:?}, {:?})",
        hw.disk_device, hw.disk_class, hw.io_profile
    );
}

/// Print the active swap areas
pub fn print_swaps(devices: &[SwapDevice]) {
    if devices.is_empty() {
        println!("  Swap:   none active");
        return;
    }
    for dev in devices {
        println!(
            "  Swap:   {} ({}, {} used of {})",
            dev.name,
            dev.kind,
            humansize::format_size(dev.used_mb * 1024 * 1024, humansize::BINARY),
            humansize::format_size(dev.size_mb * 1024 * 1024, humansize::BINARY)
        );
    }
}

/// Print normalized scores (50 = baseline parity)
pub fn print_scores(score: &PerformanceScore) {
    println!("\nScores (50 = baseline)");
    println!("  CPU:    {:>5.1}", score.cpu_score);
    println!("  Memory: {:>5.1}", score.memory_score);
    println!("  Disk:   {:>5.1}", score.disk_score);
}

/// Print the raw benchmark metrics with provenance markers
pub fn print_bench(bench: &BenchmarkResult) {
    println!("\nBenchmarks");
    println!(
        "  CPU single-thread:  {}",
        bench.cpu_events_single.display("events/s")
    );
    println!(
        "  CPU multi-thread:   {}",
        bench.cpu_events_multi.display("events/s")
    );
    println!("  CPU integer:        {}", bench.cpu_int_mops.display("Mops/s"));
    println!("  CPU float:          {}", bench.cpu_float_mops.display("Mops/s"));
    println!("  Memory read:        {}", bench.memory_read_mb_s.display("MB/s"));
    println!("  Memory write:       {}", bench.memory_write_mb_s.display("MB/s"));
    println!("  Memory random:      {}", bench.memory_random_mb_s.display("MB/s"));
    println!("  Disk seq read:      {}", bench.disk_seq_read_mb_s.display("MB/s"));
    println!("  Disk seq write:     {}", bench.disk_seq_write_mb_s.display("MB/s"));
    println!("  Disk rand read:     {}", bench.disk_rand_read_iops.display("IOPS"));
    println!("  Disk rand write:    {}", bench.disk_rand_write_iops.display("IOPS"));
    println!("  Disk latency:       {}", bench.disk_latency_us.display("us"));

    let fallbacks = bench.fallback_fields();
    if !fallbacks.is_empty() {
        println!(
            "\n  {} of 12 metrics used conservative defaults",
            fallbacks.len()
        );
    }
}

/// Print the recommended values without a diff
pub fn print_recommendation(rec: &RecommendationSet) {
    println!("\nRecommended");
    println!("  swap size:                  {} MB", rec.swap_size_mb);
    for (key, value) in rec.sysctl_pairs() {
        println!("  {:<27} {}", key, value);
    }
}

/// Print the current-versus-recommended table, changes marked
pub fn print_diffs(diffs: &[ParameterDiff]) {
    println!("\n{:<30} {:>12} {:>12}", "Tunable", "Current", "Recommended");
    for d in diffs {
        let marker = if d.changed { "*" } else { " " };
        // Width specs do not pad through the custom Display impl.
        let name = d.tunable.to_string();
        println!(
            "{} {:<28} {:>12} {:>12}",
            marker, name, d.current, d.recommended
        );
    }
    let changed = diffs.iter().filter(|d| d.changed).count();
    if changed == 0 {
        println!("\nAll tunables already match the recommendation.");
    } else {
        println!("\n{} change(s) marked with *", changed);
    }
}
