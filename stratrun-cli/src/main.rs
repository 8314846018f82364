//! StratRun CLI: run, summarize and batch commands.
//!
//! Commands:
//! - `run`: execute one strategy script under a TOML run config
//! - `summarize`: print the performance summary of a saved result
//! - `batch`: run several scripts under the same config in parallel

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use stratrun_core::SinkRegistry;
use stratrun_runner::export::{generate_report, load_artifacts, ratio, save_artifacts};
use stratrun_runner::{
    run_batch_with_progress, run_batch_with_threads, Orchestrator, RunArtifact, RunConfig,
    RunRequest, RunResult,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stratrun",
    about = "StratRun CLI: run external strategy processes and analyze their output"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a strategy script and print its performance summary.
    Run {
        /// Path to the TOML run config.
        #[arg(long)]
        config: PathBuf,

        /// Strategy script, copied into a temporary artifact for the run.
        #[arg(long)]
        script: PathBuf,

        /// Keep the temporary artifact after the run.
        #[arg(long)]
        keep_artifacts: bool,

        /// Directory for result.json, trades.csv, equity.csv and report.md.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the summary of a saved run (a result.json or its directory).
    Summarize {
        path: PathBuf,

        /// Print the full Markdown report instead.
        #[arg(long)]
        markdown: bool,
    },

    /// Run several scripts under one config in parallel.
    Batch {
        /// Path to the TOML run config.
        #[arg(long)]
        config: PathBuf,

        /// Strategy scripts; each becomes one run.
        #[arg(long, required = true, num_args = 1..)]
        script: Vec<PathBuf>,

        /// Worker threads (defaults to the number of CPUs).
        #[arg(long)]
        threads: Option<usize>,

        /// Directory for per-run artifacts.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            script,
            keep_artifacts,
            output_dir,
        } => run_single(&config, &script, keep_artifacts, output_dir.as_deref()),
        Commands::Summarize { path, markdown } => run_summarize(&path, markdown),
        Commands::Batch {
            config,
            script,
            threads,
            output_dir,
        } => run_batch_cmd(&config, &script, threads, output_dir.as_deref()),
    }
}

fn run_single(
    config_path: &Path,
    script: &Path,
    keep_artifacts: bool,
    output_dir: Option<&Path>,
) -> Result<()> {
    let mut config = RunConfig::from_file(config_path)?;
    config.keep_artifacts |= keep_artifacts;

    let artifact = stage_script(script)?;
    let registry = SinkRegistry::new();
    let sink = registry.sink(&config.strategy);

    let mut orchestrator = Orchestrator::new(config, sink)?;
    let result = match orchestrator.run(artifact) {
        Ok(result) => result,
        Err(err) => {
            if let Some(code) = err.exit_code() {
                eprintln!("Strategy exited with code {code}");
                std::process::exit(code.clamp(1, 255));
            }
            return Err(err.into());
        }
    };

    print_summary(&result);

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }

    Ok(())
}

fn run_summarize(path: &Path, markdown: bool) -> Result<()> {
    let result = load_artifacts(path)?;
    if markdown {
        print!("{}", generate_report(&result));
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn run_batch_cmd(
    config_path: &Path,
    scripts: &[PathBuf],
    threads: Option<usize>,
    output_dir: Option<&Path>,
) -> Result<()> {
    let config = RunConfig::from_file(config_path)?;
    let requests = batch_requests(&config, scripts)?;

    let registry = SinkRegistry::new();
    let outcomes = match threads {
        Some(n) => run_batch_with_threads(requests, &registry, n)?,
        None => run_batch_with_progress(requests, &registry, |idx, total, outcome| {
            info!(run = idx + 1, total, ok = outcome.is_ok(), "run finished");
        }),
    };

    let mut failed = 0usize;
    println!();
    println!("=== Batch Results ===");
    for (script, outcome) in scripts.iter().zip(&outcomes) {
        match outcome {
            Ok(result) => {
                println!(
                    "{:<24} return {:>8.2}%  sharpe {:>7}  trades {:>4}",
                    script_stem(script),
                    result.performance.total_return * 100.0,
                    ratio(result.performance.sharpe_ratio),
                    result.performance.trade_count,
                );
                if let Some(dir) = output_dir {
                    if let Err(err) = save_artifacts(result, dir) {
                        warn!(error = %err, "failed to save batch artifacts");
                    }
                }
            }
            Err(err) => {
                failed += 1;
                println!("{:<24} FAILED: {err}", script_stem(script));
            }
        }
    }
    println!();

    if failed > 0 {
        bail!("{failed} of {} runs failed", outcomes.len());
    }
    Ok(())
}

/// One request per script. Every run sees the configured strategy id; the
/// script stem only distinguishes the sink category.
fn batch_requests(config: &RunConfig, scripts: &[PathBuf]) -> Result<Vec<RunRequest>> {
    scripts
        .iter()
        .map(|script| {
            let category = format!("{}/{}", config.strategy, script_stem(script));
            Ok(RunRequest::new(config.clone(), stage_script(script)?).with_category(category))
        })
        .collect()
}

/// Copy a script into a temporary artifact in the system temp dir,
/// keeping its extension so interpreters that dispatch on it still work.
fn stage_script(script: &Path) -> Result<RunArtifact> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;
    let extension = script.extension().and_then(|e| e.to_str()).unwrap_or("txt");
    Ok(RunArtifact::from_source(&std::env::temp_dir(), extension, &source)?)
}

fn script_stem(script: &Path) -> String {
    script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| script.display().to_string())
}

fn print_summary(result: &RunResult) {
    let perf = &result.performance;
    println!();
    println!("=== Run Result ===");
    println!("Strategy:       {}", result.strategy_id);
    println!("Engine:         {}", result.engine);
    println!("Run ID:         {}", result.id);
    println!(
        "Duration:       {:.3}s",
        result.duration().num_milliseconds() as f64 / 1000.0
    );
    println!("Equity Points:  {}", result.equity.len());
    println!("Trades:         {}", perf.trade_count);
    let open = result.open_trades().count();
    if open > 0 {
        println!("Open Trades:    {open}");
    }
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", perf.total_return * 100.0);
    println!("Annualized:     {:.2}%", perf.annualized_return * 100.0);
    println!("Sharpe:         {:.3}", perf.sharpe_ratio);
    println!("Sortino:        {:.3}", perf.sortino_ratio);
    println!("Calmar:         {:.3}", perf.calmar_ratio);
    println!("Max Drawdown:   {:.2}%", perf.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", perf.win_rate * 100.0);
    println!("Profit Factor:  {}", ratio(perf.profit_factor));
    println!("Avg Win/Loss:   {}", ratio(perf.avg_win_loss_ratio));
    println!("Skewness:       {:.3}", perf.skewness);
    println!("Kurtosis:       {:.3}", perf.kurtosis);
    let stats = &result.stats;
    if stats.dropped_lines > 0 || stats.orphan_exits > 0 || stats.rejected_entries > 0 {
        println!();
        println!(
            "WARNING: {} dropped lines, {} orphan exits, {} rejected entries",
            stats.dropped_lines, stats.orphan_exits, stats.rejected_entries
        );
    }
    if let Some(path) = &result.artifact {
        println!("Artifact:       {}", path.display());
    }
    println!();
}
