//! Seda-Harvest main entry point
//!
//! This is the command-line interface for the Seda-Harvest catalog harvester.

use anyhow::Context;
use clap::{Parser, Subcommand};
use seda_harvest::config::{
    load_config_with_hash, validate_enrichment, Config, HttpConfig, RetryConfig,
};
use seda_harvest::crawler::{
    build_enricher, build_http_client, run_harvest, Fetcher, PassOptions, RetryPolicy,
    SweepController,
};
use seda_harvest::output::{load_statistics, print_statistics};
use seda_harvest::site::{collect_items, TagListing, SITE_BASE};
use seda_harvest::storage::{read_id_list, write_id_list, MergeStore};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

/// Seda-Harvest: an incremental audiobook catalog harvester
///
/// Seda-Harvest lists items from paginated tag pages, enriches every item from
/// its details page and the media API, and keeps a deduplicated CSV dataset.
/// Failed items are retried by slower serial sweeps.
#[derive(Parser, Debug)]
#[command(name = "seda-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An incremental audiobook catalog harvester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline (listing, pass 1, sweeps) from a TOML config
    Run {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Validate config and show the effective settings without harvesting
        #[arg(long)]
        dry_run: bool,
    },

    /// Collect item ids from listing pages into an ids CSV
    Crawl {
        /// Listing URL template with a {page} placeholder
        #[arg(long)]
        url: String,

        /// Number of pages to read
        #[arg(long)]
        pages: u32,

        #[arg(long, default_value = "audiobooks.csv")]
        output: PathBuf,
    },

    /// Enrich an ids CSV into the full dataset
    Enrich {
        #[arg(long, default_value = "audiobooks.csv")]
        input: PathBuf,

        #[arg(long, default_value = "books_with_attid.csv")]
        output: PathBuf,

        #[arg(long, default_value = "errors.csv")]
        errors: PathBuf,

        #[arg(long, default_value = "books_with_attid.jsonl")]
        jsonl: PathBuf,

        #[arg(long, default_value_t = 0.1)]
        min_delay: f64,

        #[arg(long, default_value_t = 0.3)]
        max_delay: f64,

        /// Ignore MP3 files smaller than this many bytes
        #[arg(long, default_value_t = 0)]
        min_mp3_size: u64,

        /// Skip items without a qualifying MP3
        #[arg(long)]
        require_full: bool,

        #[arg(long, default_value_t = 1)]
        workers: usize,

        /// Cache details pages on disk
        #[arg(long)]
        cache: bool,

        #[arg(long, default_value = ".cache/details")]
        cache_dir: String,

        /// Sweep passes over the error ledger after the first pass
        #[arg(long, default_value_t = 0)]
        max_sweeps: u32,
    },

    /// Show statistics for an existing dataset and error ledger
    Stats {
        #[arg(long, default_value = "books_with_attid.csv")]
        books: PathBuf,

        #[arg(long, default_value = "errors.csv")]
        errors: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, dry_run } => {
            let (loaded, hash) = load_config_with_hash(&config)
                .with_context(|| format!("loading configuration from {}", config.display()))?;

            let log_file = cli.log_file.clone().or_else(|| loaded.logging.file.clone());
            setup_logging(cli.verbose, cli.quiet, &loaded.logging.level, log_file.as_deref())?;
            tracing::info!(
                "Configuration loaded from {} (hash: {})",
                config.display(),
                hash
            );

            if dry_run {
                handle_dry_run(&loaded);
                return Ok(());
            }
            handle_run(loaded).await
        }
        Command::Crawl { url, pages, output } => {
            setup_logging(cli.verbose, cli.quiet, "info", cli.log_file.as_deref())?;
            handle_crawl(&url, pages, &output).await
        }
        Command::Enrich {
            input,
            output,
            errors,
            jsonl,
            min_delay,
            max_delay,
            min_mp3_size,
            require_full,
            workers,
            cache,
            cache_dir,
            max_sweeps,
        } => {
            setup_logging(cli.verbose, cli.quiet, "info", cli.log_file.as_deref())?;

            let mut config = Config::with_listing("", 1);
            config.output.books_csv = output;
            config.output.errors_csv = errors;
            config.output.jsonl = jsonl;
            config.throttle.min = min_delay;
            config.throttle.max = max_delay;
            config.filters.min_mp3_size_bytes = min_mp3_size;
            config.filters.require_full_mp3 = require_full;
            config.parallel.workers = workers.max(1);
            config.sweep.max_sweeps = max_sweeps;
            config.cache.enabled = cache;
            config.cache.dir = cache_dir;
            validate_enrichment(&config).context("invalid enrich options")?;

            handle_enrich(&input, config).await
        }
        Command::Stats { books, errors } => {
            setup_logging(cli.verbose, cli.quiet, "warn", cli.log_file.as_deref())?;
            handle_stats(&books, &errors)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `level` is the default for this crate when no `-v` is given.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    level: &str,
    log_file: Option<&Path>,
) -> anyhow::Result<()> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new(format!("seda_harvest={},warn", level.to_lowercase())),
            1 => EnvFilter::new("seda_harvest=debug,info"),
            2 => EnvFilter::new("seda_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false),
        )
        .with(file_layer)
        .init();

    Ok(())
}

fn site_base() -> anyhow::Result<Url> {
    Url::parse(SITE_BASE).context("parsing site base URL")
}

/// Handles `run --dry-run`: shows the effective configuration
fn handle_dry_run(config: &Config) {
    let options = PassOptions::from_config(config);

    println!("=== Seda-Harvest Dry Run ===\n");

    println!("Listing:");
    println!("  URL template: {}", config.listing.url_template);
    println!("  Pages: {}", config.listing.pages);

    println!("\nOutput:");
    println!("  Ids: {}", config.output.ids_csv.display());
    println!("  Dataset: {}", config.output.books_csv.display());
    println!("  Error ledger: {}", config.output.errors_csv.display());
    println!("  Journal: {}", config.output.jsonl.display());

    println!("\nPasses:");
    println!("  Pass 1 workers: {}", options.workers);
    println!(
        "  Pass 1 throttle: {:.2}-{:.2}s",
        options.throttle.min().as_secs_f64(),
        options.throttle.max().as_secs_f64()
    );
    println!("  Max sweeps: {}", options.max_sweeps);
    println!(
        "  Sweep throttle: {:.2}-{:.2}s",
        options.sweep_throttle.min().as_secs_f64(),
        options.sweep_throttle.max().as_secs_f64()
    );

    println!("\nFilters:");
    println!("  Min MP3 size: {} bytes", config.filters.min_mp3_size_bytes);
    println!("  Require MP3: {}", config.filters.require_full_mp3);

    println!("\nRetry:");
    println!(
        "  {} attempts, base {:.2}s, factor {}, jitter {:.2}s",
        config.retry.max_attempts, config.retry.base_delay, config.retry.factor, config.retry.jitter
    );

    println!("\nCache:");
    match config.cache_dir() {
        Some(dir) => println!("  {}", dir.display()),
        None => println!("  disabled"),
    }

    println!("\n✓ Configuration is valid");
}

/// Handles `run`: listing, pass 1 and sweeps
async fn handle_run(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting {} listing pages with {} workers",
        config.listing.pages,
        config.parallel.workers
    );

    match run_harvest(config).await {
        Ok(report) => {
            report.log_summary();
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles `crawl`: writes the ids CSV for the listing pages
async fn handle_crawl(url_template: &str, pages: u32, output: &Path) -> anyhow::Result<()> {
    let fetcher = default_fetcher()?;
    let listing = TagListing::new(fetcher, url_template, site_base()?);

    let items = collect_items(&listing, pages).await?;
    write_id_list(output, &items)?;

    println!("✓ wrote {} ids to {}", items.len(), output.display());
    Ok(())
}

/// Handles `enrich`: runs the pass controller over an ids CSV
async fn handle_enrich(input: &Path, config: Config) -> anyhow::Result<()> {
    let items = read_id_list(input, &site_base()?)
        .with_context(|| format!("reading ids from {}", input.display()))?;
    tracing::info!("Loaded {} ids from {}", items.len(), input.display());

    let fetcher = default_fetcher()?;
    let enricher = build_enricher(&config, fetcher, site_base()?)?;
    let store = MergeStore::open(&config.output.books_csv, &config.output.jsonl)?;
    let controller = SweepController::new(enricher, store, PassOptions::from_config(&config));

    let report = controller.run(items).await?;
    report.log_summary();
    println!(
        "done. wrote {} rows to {}",
        report.dataset_rows,
        config.output.books_csv.display()
    );
    Ok(())
}

/// Handles `stats`: prints dataset and ledger statistics
fn handle_stats(books: &Path, errors: &Path) -> anyhow::Result<()> {
    println!("Dataset: {}", books.display());
    println!("Error ledger: {}\n", errors.display());

    let stats = load_statistics(books, errors)?;
    print_statistics(&stats);
    Ok(())
}

fn default_fetcher() -> anyhow::Result<Fetcher> {
    let client = build_http_client(&HttpConfig::default())?;
    Ok(Fetcher::new(
        client,
        RetryPolicy::from_config(&RetryConfig::default()),
    ))
}
