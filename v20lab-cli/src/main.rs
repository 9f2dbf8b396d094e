//! V20Lab CLI: ingest, scan, store and universe commands.
//!
//! Commands:
//! - `ingest`: read the feed, write the day's snapshot, merge into the store
//! - `scan`: detect V20 signals and print reports for actionable ones
//! - `store status`: stored date ranges and record counts per symbol
//! - `universe list`: show the configured symbol lists
//!
//! Reports go to stdout, logs to stderr.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use v20lab_core::data::{CsvFeed, SeriesStore};
use v20lab_runner::{
    ingest, scan, write_signals_csv, write_signals_json, SeriesSource, StdoutNotifier, V20Config,
};

const DEFAULT_CONFIG: &str = "v20lab.toml";

#[derive(Parser)]
#[command(name = "v20lab", about = "V20Lab: V20 signal detection over daily equity series")]
struct Cli {
    /// Path to the TOML config file. Defaults to ./v20lab.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the feed for each symbol, write the day's snapshot, and merge into the store.
    Ingest {
        /// Symbols to ingest. Defaults to the configured universe.
        symbols: Vec<String>,

        /// Restrict to these named universe lists.
        #[arg(long = "list")]
        lists: Vec<String>,

        /// Ingestion date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Feed directory holding {SYMBOL}.csv files. Overrides the config.
        #[arg(long)]
        feed_dir: Option<PathBuf>,

        /// Worker pool size. Overrides the config.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Detect V20 signals and print a report for every symbol with actionable ones.
    Scan {
        /// Symbols to scan. Defaults to the configured universe.
        symbols: Vec<String>,

        /// Restrict to these named universe lists.
        #[arg(long = "list")]
        lists: Vec<String>,

        /// Only scan records on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<NaiveDate>,

        /// Where to read series from: partitions or store.
        #[arg(long)]
        source: Option<SeriesSource>,

        /// Worker pool size. Overrides the config.
        #[arg(long)]
        workers: Option<usize>,

        /// Also write every detected signal to this JSON file.
        #[arg(long)]
        json: Option<PathBuf>,

        /// Also write every detected signal to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Series Store commands.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Symbol universe commands.
    Universe {
        #[command(subcommand)]
        action: UniverseAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Report stored date ranges and record counts.
    Status {
        /// Symbols to report. Defaults to every stored symbol.
        symbols: Vec<String>,
    },
}

#[derive(Subcommand)]
enum UniverseAction {
    /// Print the configured symbol lists.
    List {
        /// Only print this list.
        #[arg(long)]
        name: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest {
            symbols,
            lists,
            date,
            feed_dir,
            workers,
        } => {
            if let Some(dir) = feed_dir {
                config.data.feed_dir = dir;
            }
            apply_workers(&mut config, workers)?;
            let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            run_ingest(&config, resolve_symbols(&config, symbols, &lists)?, date)
        }
        Commands::Scan {
            symbols,
            lists,
            since,
            source,
            workers,
            json,
            csv,
        } => {
            if since.is_some() {
                config.scan.since = since;
            }
            if let Some(source) = source {
                config.scan.source = source;
            }
            apply_workers(&mut config, workers)?;
            let symbols = resolve_symbols(&config, symbols, &lists)?;
            run_scan(&config, symbols, json.as_deref(), csv.as_deref())
        }
        Commands::Store { action } => match action {
            StoreAction::Status { symbols } => run_store_status(&config, symbols),
        },
        Commands::Universe { action } => match action {
            UniverseAction::List { name } => run_universe_list(&config, name.as_deref()),
        },
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("v20lab={level},v20lab_core={level},v20lab_runner={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<V20Config> {
    match path {
        Some(path) => V20Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => V20Config::from_file(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("failed to load config {DEFAULT_CONFIG}")),
        None => {
            tracing::warn!("no {DEFAULT_CONFIG} found, using built-in defaults");
            Ok(V20Config::default())
        }
    }
}

fn apply_workers(config: &mut V20Config, workers: Option<usize>) -> Result<()> {
    if let Some(workers) = workers {
        config.workers = workers;
        config.validate()?;
    }
    Ok(())
}

fn resolve_symbols(config: &V20Config, explicit: Vec<String>, lists: &[String]) -> Result<Vec<String>> {
    let symbols = if explicit.is_empty() {
        config.symbols(lists)?
    } else {
        v20lab_core::data::universe::dedup_symbols(&explicit)
    };
    if symbols.is_empty() {
        bail!("no symbols to process: pass symbols or configure [universe] lists");
    }
    Ok(symbols)
}

fn run_ingest(config: &V20Config, symbols: Vec<String>, date: NaiveDate) -> Result<()> {
    let feed = CsvFeed::new(&config.data.feed_dir);
    if !feed.feed_dir().is_dir() {
        bail!("feed directory {} does not exist", feed.feed_dir().display());
    }
    let summary = ingest(config, &feed, date, &symbols)?;

    println!(
        "Ingested {date}: {} merged, {} without data, {} failed ({} inserted, {} updated, {} rejected rows)",
        summary.merged(),
        summary.no_data(),
        summary.failures().len(),
        summary.inserted(),
        summary.updated(),
        summary.rejected(),
    );

    if summary.has_failures() {
        for failure in summary.failures() {
            if let v20lab_runner::SymbolOutcome::Failed { stage, error } = &failure.outcome {
                eprintln!("Error for {} ({stage:?}): {error}", failure.symbol);
            }
        }
        let unmerged = summary.unmerged_snapshots();
        if !unmerged.is_empty() {
            eprintln!(
                "Snapshots written but not merged into the store (re-run ingest): {}",
                unmerged.join(", ")
            );
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_scan(
    config: &V20Config,
    symbols: Vec<String>,
    json: Option<&Path>,
    csv: Option<&Path>,
) -> Result<()> {
    let summary = scan(config, &symbols, &StdoutNotifier)?;

    if let Some(path) = json {
        write_signals_json(path, &summary)?;
        tracing::info!(path = %path.display(), "wrote signal JSON");
    }
    if let Some(path) = csv {
        write_signals_csv(path, &summary)?;
        tracing::info!(path = %path.display(), "wrote signal CSV");
    }

    if summary.failed() > 0 {
        for failed in summary.symbols.iter().filter(|s| s.error.is_some()) {
            eprintln!(
                "Error for {}: {}",
                failed.symbol,
                failed.error.as_deref().unwrap_or_default()
            );
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_store_status(config: &V20Config, symbols: Vec<String>) -> Result<()> {
    let store = SeriesStore::new(&config.data.store_dir);
    let symbols = if symbols.is_empty() {
        store.symbols()?
    } else {
        symbols
    };

    if symbols.is_empty() {
        println!("Store is empty: {}", store.store_dir().display());
        return Ok(());
    }

    let refs: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
    let status = store.status(&refs);

    println!("Store: {}", store.store_dir().display());
    println!("Symbols: {}", status.iter().filter(|s| s.stored).count());
    println!();
    println!("{:<14} {:<26} {:>10}", "Symbol", "Date Range", "Records");
    println!("{}", "-".repeat(52));
    for s in &status {
        let range = match (s.start_date, s.end_date) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "(not stored)".to_string(),
        };
        let count = s.record_count.map(|c| c.to_string()).unwrap_or_default();
        println!("{:<14} {:<26} {:>10}", s.symbol, range, count);
    }
    Ok(())
}

fn run_universe_list(config: &V20Config, name: Option<&str>) -> Result<()> {
    let universe = config.universe.resolve()?;
    if universe.is_empty() {
        println!("No symbol lists configured.");
        return Ok(());
    }

    match name {
        Some(name) => {
            let Some(list) = universe.list(name) else {
                bail!(
                    "unknown list '{name}'. Valid: {}",
                    universe.list_names().join(", ")
                );
            };
            println!("{name} ({}): {}", list.len(), list.join(" "));
        }
        None => {
            for list_name in universe.list_names() {
                let list = universe.list(list_name).unwrap_or_default();
                println!("{list_name} ({}): {}", list.len(), list.join(" "));
            }
            println!();
            println!("Distinct symbols: {}", universe.symbol_count());
        }
    }
    Ok(())
}
