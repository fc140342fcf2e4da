use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use modelcat::config::CatalogConfig;
use modelcat::engine::CatalogEngine;
use modelcat::offload::OffloadCoordinator;
use modelcat::output;
use modelcat::query::parse_query;
use modelcat::record::{Record, load_dataset, synthetic_records};
use modelcat::utils::LoadSpinner;
use std::fs::File;
use std::io::{BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LIMIT: usize = 20;

#[derive(Parser)]
#[command(name = "modelcat")]
#[command(version, about = "Search, filter and sort large model catalogs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Query a dataset, e.g. `llama chat format:q4_k_m downloads:>=100 sort:-likes`
    Query {
        /// Dataset JSON file
        dataset: PathBuf,

        /// Maximum results to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Search words and field:value filters
        #[arg(trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Show dataset statistics
    Stats {
        /// Dataset JSON file
        dataset: PathBuf,
    },
    /// Write a synthetic dataset
    Generate {
        /// Output file
        out: PathBuf,

        /// Number of records
        #[arg(short = 'n', long, default_value_t = 50_000)]
        count: usize,

        /// Generator seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => CatalogConfig::load_from(path)?,
        None => CatalogConfig::load()?,
    };
    let color = !cli.no_color;

    match cli.command {
        Commands::Query {
            dataset,
            limit,
            json,
            query,
        } => run_query(
            &config,
            &dataset,
            &query.join(" "),
            limit,
            json,
            color,
            cli.verbose,
        )?,
        Commands::Stats { dataset } => show_stats(&config, &dataset, color, cli.verbose)?,
        Commands::Generate { out, count, seed } => generate(&out, count, seed)?,
    }

    Ok(())
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Spinners only when stderr is a terminal and logs stay quiet
fn spinner(message: &'static str, verbose: u8) -> LoadSpinner {
    LoadSpinner::start(message, verbose == 0 && std::io::stderr().is_terminal())
}

fn run_query(
    config: &CatalogConfig,
    dataset: &Path,
    input: &str,
    limit: Option<usize>,
    json: bool,
    color: bool,
    verbose: u8,
) -> Result<()> {
    let spinner = spinner("Loading dataset...", verbose);
    let report = load_dataset(dataset, &config.hardware)?;
    drop(spinner);

    let records: Arc<[Record]> = Arc::from(report.records);
    let parsed = parse_query(input);
    let limit = limit.or(parsed.limit).unwrap_or(DEFAULT_LIMIT);

    let mut coordinator = OffloadCoordinator::new(config.clone());
    let outcome = coordinator
        .run(&records, &parsed.query)
        .context("Query failed")?;
    tracing::info!(
        target: "modelcat::cli",
        seq = outcome.seq,
        dispatch = ?outcome.dispatch,
        skipped = report.skipped,
        "Query finished"
    );

    if json {
        let shown: Vec<&Record> = outcome.result.iter().take(limit).collect();
        let body = serde_json::json!({
            "query": parsed.query,
            "counts": outcome.result.counts,
            "fromCache": outcome.result.from_cache,
            "dispatch": outcome.dispatch,
            "warnings": outcome.result.warnings,
            "elapsedMs": outcome.result.elapsed.as_secs_f64() * 1000.0,
            "records": shown,
        });
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        serde_json::to_writer_pretty(&mut out, &body)?;
        writeln!(out)?;
    } else {
        output::print_results(&outcome.result, limit, color)?;
    }
    Ok(())
}

fn show_stats(config: &CatalogConfig, dataset: &Path, color: bool, verbose: u8) -> Result<()> {
    let spinner = spinner("Loading dataset...", verbose);
    let mut engine = CatalogEngine::new(config.engine.clone());
    let report = engine.load_file(dataset, &config.hardware)?;
    spinner.stage(format!("Indexing {} records...", report.loaded));
    engine.build_indexes()?;
    drop(spinner);

    let indexes = engine
        .indexes()
        .context("Indexes missing after build")?;
    output::print_stats(
        report.loaded,
        report.skipped,
        indexes,
        &engine.diagnostics(),
        color,
    )?;
    Ok(())
}

fn generate(out: &Path, count: usize, seed: u64) -> Result<()> {
    let records = synthetic_records(count, seed);
    let file =
        File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &records).context("Failed to write dataset")?;
    writer.flush()?;
    eprintln!("Wrote {} records to {}", records.len(), out.display());
    Ok(())
}
