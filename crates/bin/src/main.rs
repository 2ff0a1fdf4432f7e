//! Hobart CLI binary.
//!
//! Provides command-line interface for the Hobart factor return loader.

mod store;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use hobart::data::{ReturnsTarget, Timeframe};
use hobart::output::{ExportFormat, Exporter, summarize};
use hobart::{Loader, LoaderSettings, seed_configs};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use store::{open_store, resolve_paths};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hobart")]
#[command(about = "Hobart: incremental long/short factor returns", long_about = None)]
#[command(version)]
struct Cli {
    /// Database holding configs and observations
    #[arg(long, env = "SOURCE", global = true)]
    source: Option<PathBuf>,

    /// Database receiving factor returns (defaults to the source)
    #[arg(long, env = "TARGET", global = true)]
    target: Option<PathBuf>,

    /// Timeframe to process (monthly, weekly or daily)
    #[arg(long, env = "TIMEFRAME", default_value = "weekly", global = true)]
    timeframe: Timeframe,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// JSON settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and persist factor returns for every pending window
    Run,

    /// Seed configs for every registered factor and timeframe
    Seed {
        /// Also seed the whole-bucket benchmark
        #[arg(long)]
        benchmark: bool,
    },

    /// Show watermarks for the timeframe
    Status,

    /// Export persisted factor returns
    Export {
        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Output format (csv, json or pretty-json); inferred from the file name
        #[arg(long)]
        format: Option<String>,

        /// Restrict to one factor
        #[arg(long)]
        factor: Option<String>,
    },

    /// Average persisted returns per factor, class and selection size
    Summary {
        /// Restrict to one factor
        #[arg(long)]
        factor: Option<String>,
    },
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.log_level) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level {level}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<LoaderSettings> {
    let settings = match path {
        Some(path) => LoaderSettings::from_json_file(path)?,
        None => LoaderSettings::default(),
    };
    settings.validate()?;
    Ok(settings)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings(cli.settings.as_deref())?;
    let (source, target) = resolve_paths(cli.source, cli.target);

    match cli.command {
        Commands::Run => run_loader(&source, &target, cli.timeframe, settings)?,
        Commands::Seed { benchmark } => {
            let benchmark = benchmark.then_some(settings.portfolio.benchmark_factor.as_str());
            let n = seed_configs(&open_store(&source, &settings)?, benchmark)?;
            if target != source {
                seed_configs(&open_store(&target, &settings)?, benchmark)?;
            }
            println!("Seeded {n} configs into {}", source.display());
        }
        Commands::Status => show_status(&target, cli.timeframe, &settings)?,
        Commands::Export {
            output,
            format,
            factor,
        } => export_returns(
            &target,
            cli.timeframe,
            &settings,
            output.as_deref(),
            format.as_deref(),
            factor.as_deref(),
        )?,
        Commands::Summary { factor } => {
            let store = open_store(&target, &settings)?;
            let rows = store.factor_returns(cli.timeframe, factor.as_deref())?;
            if rows.is_empty() {
                println!("No factor returns persisted for {}", cli.timeframe);
                return Ok(());
            }
            println!("{}", summarize(&rows)?);
        }
    }

    Ok(())
}

fn run_loader(
    source: &Path,
    target: &Path,
    timeframe: Timeframe,
    settings: LoaderSettings,
) -> anyhow::Result<()> {
    let source_store = open_store(source, &settings)?;
    let target_store = open_store(target, &settings)?;

    let mut loader = Loader::new(&source_store, target_store, timeframe, settings)?;
    let windows = loader.pending_windows()?;
    if windows.is_empty() {
        println!("Nothing to load for {timeframe}: every window is persisted");
        return Ok(());
    }

    let pb = ProgressBar::new(windows.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let mut records = 0;
    for (i, window) in windows.iter().enumerate() {
        pb.set_message(window.to_string());
        match loader.run_window(*window) {
            Ok(report) => records += report.records,
            Err(e) => {
                pb.abandon_with_message("Failed!");
                return Err(e.into());
            }
        }
        pb.inc(1);
        info!("Persisted {}/{} date ranges", i + 1, windows.len());
    }

    pb.finish_with_message(format!(
        "{records} rows written, {} fetches",
        loader.fetches()
    ));
    Ok(())
}

fn show_status(target: &Path, timeframe: Timeframe, settings: &LoaderSettings) -> anyhow::Result<()> {
    let store = open_store(target, settings)?;
    let configs: Vec<_> = store
        .configs()?
        .into_iter()
        .filter(|c| c.timeframe == timeframe)
        .collect();

    println!("\nFactor loader status: {timeframe} ({})", target.display());
    println!("{}", "=".repeat(60));
    println!("{:<28} {:<10} {:>18}", "Factor", "Source", "Last persisted");
    println!("{}", "-".repeat(60));
    for config in &configs {
        println!(
            "{:<28} {:<10} {:>18}",
            config.factor,
            config.source_table,
            config
                .last_date_persisted
                .map_or_else(|| "-".to_string(), |d| d.to_string())
        );
    }
    println!("{}", "-".repeat(60));

    let watermark = store.fetch_last_date_persisted(timeframe)?;
    println!(
        "Resume from: {}",
        watermark.map_or_else(|| "start (full run)".to_string(), |d| d.to_string())
    );

    let stats = store.stats()?;
    println!(
        "Rows: {} configs, {} factor returns, {} base, {} metrics",
        stats.configs, stats.factor_returns, stats.base_rows, stats.metrics_rows
    );
    Ok(())
}

fn export_returns(
    target: &Path,
    timeframe: Timeframe,
    settings: &LoaderSettings,
    output: Option<&Path>,
    format: Option<&str>,
    factor: Option<&str>,
) -> anyhow::Result<()> {
    let format = match (format, output) {
        (Some(f), _) => f.parse()?,
        (None, Some(path)) => ExportFormat::from_path(path)?,
        (None, None) => ExportFormat::Csv,
    };

    let store = open_store(target, settings)?;
    let rows = store.factor_returns(timeframe, factor)?;
    if rows.is_empty() {
        bail!("no factor returns persisted for {timeframe}");
    }

    match output {
        Some(path) => {
            rows.export_to_file(path, format)?;
            eprintln!("Exported {} rows to {}", rows.len(), path.display());
        }
        None => rows.export_to_writer(&mut std::io::stdout().lock(), format)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export_args() {
        let cli = Cli::try_parse_from([
            "hobart",
            "--timeframe",
            "DAILY",
            "export",
            "--factor",
            "bar",
            "-o",
            "out.json",
        ])
        .unwrap();
        assert_eq!(cli.timeframe, Timeframe::Daily);
        assert!(matches!(
            cli.command,
            Commands::Export { factor: Some(ref f), .. } if f == "bar"
        ));
    }
}
