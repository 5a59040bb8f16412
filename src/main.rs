//! vmtune CLI - Benchmark-driven Linux virtual-memory tuning

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use vmtune::config::{CliArgs, Commands, OutputFormat, TuneConfig};
use vmtune::core::{RunOutcome, TuneEngine};
use vmtune::error::Result;
use vmtune::{diff, report};

/// Exit code when the safety gate refuses to apply.
const EXIT_SAFETY_REJECTED: i32 = 2;

fn main() {
    let args = CliArgs::parse();
    init_logging(&args);

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(args: &CliArgs) {
    let default_level = match (args.quiet, args.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("vmtune={}", default_level))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: CliArgs) -> Result<i32> {
    let config = TuneConfig::from_args(&args);
    let command = args.command.clone().unwrap_or(Commands::Analyze);
    let engine = TuneEngine::new(config.clone());

    match command {
        Commands::Bench => cmd_bench(&engine, &config),
        Commands::Recommend => cmd_recommend(&engine, &config),
        Commands::Analyze => cmd_analyze(&engine, &config),
        Commands::Apply { .. } => cmd_apply(&engine, &config),
    }
}

fn cmd_bench(engine: &TuneEngine, config: &TuneConfig) -> Result<i32> {
    let (hw, bench) = engine.collect()?;
    match config.format {
        OutputFormat::Json => {
            let doc = serde_json::json!({ "hardware": hw, "benchmarks": bench });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Text => {
            report::print_hardware(&hw);
            report::print_bench(&bench);
        }
    }
    Ok(0)
}

fn cmd_recommend(engine: &TuneEngine, config: &TuneConfig) -> Result<i32> {
    let analysis = engine.analyze()?;
    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        OutputFormat::Text => {
            report::print_hardware(&analysis.hardware);
            report::print_swaps(&analysis.swap_devices);
            report::print_scores(&analysis.score);
            report::print_recommendation(&analysis.recommendation);
        }
    }
    Ok(0)
}

fn cmd_analyze(engine: &TuneEngine, config: &TuneConfig) -> Result<i32> {
    let started = Instant::now();
    let analysis = engine.analyze()?;
    let outcome = if analysis.converged() {
        RunOutcome::NoChangesNeeded
    } else {
        RunOutcome::Analyzed
    };
    let report = engine.report(started, outcome, analysis, None, None);
    report::render(&report, config.format)?;
    Ok(0)
}

fn cmd_apply(engine: &TuneEngine, config: &TuneConfig) -> Result<i32> {
    let started = Instant::now();

    if !config.dry_run && !nix::unistd::geteuid().is_root() {
        return Err(vmtune::VmTuneError::NotRoot(
            "run 'sudo vmtune apply' (or use --dry-run)".to_string(),
        ));
    }

    let analysis = engine.analyze()?;

    if analysis.converged() {
        let report = engine.report(started, RunOutcome::NoChangesNeeded, analysis, None, None);
        report::render(&report, config.format)?;
        return Ok(0);
    }

    let verdict = engine.gate(&analysis)?;
    if !verdict.approved {
        let report = engine.report(
            started,
            RunOutcome::SafetyRejected,
            analysis,
            Some(verdict),
            None,
        );
        report::render(&report, config.format)?;
        return Ok(EXIT_SAFETY_REJECTED);
    }

    if config.dry_run {
        let report = engine.report(started, RunOutcome::DryRun, analysis, Some(verdict), None);
        report::render(&report, config.format)?;
        return Ok(0);
    }

    if !config.assume_yes {
        report::print_diffs(&diff::diff(
            &analysis.current,
            &verdict.recommendation,
            analysis.hardware.total_ram_mb,
        ));
        if !confirm("Apply these changes?")? {
            println!("Aborted.");
            return Ok(0);
        }
    }

    let apply_report = engine.execute(&analysis, &verdict)?;
    let failure = apply_report.first_failure();
    let report = engine.report(
        started,
        RunOutcome::Applied,
        analysis,
        Some(verdict),
        Some(apply_report),
    );
    report::render(&report, config.format)?;

    if let Some((phase, message)) = failure {
        return Err(vmtune::VmTuneError::ApplyFailed { phase, message });
    }
    Ok(0)
}

/// Prompt for a y/N confirmation on stdin
fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
