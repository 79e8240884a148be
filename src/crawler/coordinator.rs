//! Pass controller - pass 1 fan-out followed by serial sweeps
//!
//! This module drives a harvest over a fixed item list:
//! - Pass 1 runs the enrich step over every item with a bounded worker pool
//! - Each sweep retries only the items in the current error ledger, serially
//!   and with a slower throttle
//! - Every success is upserted into the merge store and persisted at once
//! - The error ledger is rewritten at the end of every pass

use crate::cache::DiskCache;
use crate::config::Config;
use crate::crawler::enrich::{Enricher, MediaFilter};
use crate::crawler::{build_http_client, Fetcher, RetryPolicy, Throttle};
use crate::output::{HarvestReport, PassStats};
use crate::site::{collect_items, DetailsExtractor, MediaApi, TagListing, SITE_BASE};
use crate::state::{ItemOutcome, PassState};
use crate::storage::{dedup_items, ErrorLedger, Item, LedgerEntry, MergeStore};
use crate::HarvestError;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{Instrument, Span};
use url::Url;

/// Knobs of the pass controller
#[derive(Debug, Clone)]
pub struct PassOptions {
    /// Worker count for pass 1; sweeps always use one
    pub workers: usize,
    pub throttle: Throttle,
    pub sweep_throttle: Throttle,
    pub max_sweeps: u32,
    pub ledger_path: PathBuf,
}

impl PassOptions {
    /// Options with the sweep throttle derived from the pass 1 throttle
    pub fn new(workers: usize, throttle: Throttle, max_sweeps: u32, ledger_path: PathBuf) -> Self {
        Self {
            workers,
            throttle,
            sweep_throttle: throttle.for_sweeps(),
            max_sweeps,
            ledger_path,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.parallel.workers,
            Throttle::from_secs(config.throttle.min, config.throttle.max),
            config.sweep.max_sweeps,
            config.output.errors_csv.clone(),
        )
    }
}

/// Drives pass 1 and the sweeps over one item list
pub struct SweepController {
    enricher: Arc<Enricher>,
    store: Arc<Mutex<MergeStore>>,
    options: PassOptions,
    span: Span,
}

impl SweepController {
    pub fn new(enricher: Enricher, store: MergeStore, options: PassOptions) -> Self {
        Self {
            enricher: Arc::new(enricher),
            store: Arc::new(Mutex::new(store)),
            options,
            span: tracing::info_span!("harvest"),
        }
    }

    /// Overrides the sweep throttle derived from the pass 1 throttle
    pub fn with_sweep_throttle(mut self, throttle: Throttle) -> Self {
        self.options.sweep_throttle = throttle;
        self
    }

    pub fn options(&self) -> &PassOptions {
        &self.options
    }

    /// Runs pass 1 over `items` and then sweeps until the ledger empties or
    /// the sweep budget is spent
    ///
    /// Item failures never abort the run. Only storage errors on the ledger
    /// file do.
    pub async fn run(&self, items: Vec<Item>) -> Result<HarvestReport, HarvestError> {
        self.run_passes(items).instrument(self.span.clone()).await
    }

    async fn run_passes(&self, items: Vec<Item>) -> Result<HarvestReport, HarvestError> {
        let items = dedup_items(items);
        let total_items = items.len();
        let ledger_path = &self.options.ledger_path;

        let mut passes = Vec::new();
        let mut remaining = 0;
        let mut state = PassState::Pass1;

        while !state.is_done() {
            let (input, width, throttle) = if state.is_sweep() {
                let ledger = ErrorLedger::load(ledger_path)?;
                state = state.on_sweep_start(ledger.len());
                if state.is_done() {
                    tracing::info!("Error ledger is empty, no sweep needed");
                    break;
                }
                let input: Vec<Item> = ledger.into_iter().map(Item::from).collect();
                (input, 1, self.options.sweep_throttle)
            } else {
                (items.clone(), self.options.workers, self.options.throttle)
            };

            let (stats, ledger) = self.run_pass(state, input, width, throttle).await;
            ledger.write(ledger_path)?;

            tracing::info!("{} finished. Remaining errors: {}", state, ledger.len());
            remaining = ledger.len();
            passes.push(stats);

            state = state.after_pass(remaining, self.options.max_sweeps);
        }

        let dataset_rows = self.store.lock().await.len();

        Ok(HarvestReport {
            total_items,
            passes,
            remaining_errors: remaining,
            dataset_rows,
        })
    }

    /// Runs one pass with `width` workers and returns its counts and ledger
    ///
    /// Ledger entries keep the order of `items`.
    async fn run_pass(
        &self,
        state: PassState,
        items: Vec<Item>,
        width: usize,
        throttle: Throttle,
    ) -> (PassStats, ErrorLedger) {
        let attempted = items.len();
        let width = width.clamp(1, attempted.max(1));
        let pass_span = tracing::info_span!(parent: &self.span, "pass", pass = %state);

        pass_span.in_scope(|| {
            tracing::info!(
                "Starting {} over {} items with {} worker(s), throttle {:.2}-{:.2}s",
                state,
                attempted,
                width,
                throttle.min().as_secs_f64(),
                throttle.max().as_secs_f64()
            );
        });

        let queue = Arc::new(Mutex::new(
            items.into_iter().enumerate().collect::<VecDeque<_>>(),
        ));

        let mut workers = JoinSet::new();
        for worker_id in 0..width {
            let worker = Worker {
                enricher: Arc::clone(&self.enricher),
                store: Arc::clone(&self.store),
                queue: Arc::clone(&queue),
                throttle,
            };
            let span = tracing::info_span!(parent: &pass_span, "worker", id = worker_id);
            workers.spawn(worker.run().instrument(span));
        }

        let mut stats = PassStats::new(state, attempted);
        let mut failures = Vec::new();

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(tally) => {
                    stats.succeeded += tally.succeeded;
                    stats.skipped += tally.skipped;
                    stats.failed += tally.failed;
                    failures.extend(tally.ledger);
                }
                Err(e) => {
                    pass_span.in_scope(|| tracing::error!("Worker task failed: {}", e));
                }
            }
        }

        failures.sort_by_key(|(index, _)| *index);
        let ledger: ErrorLedger = failures.into_iter().map(|(_, entry)| entry).collect();

        pass_span.in_scope(|| tracing::info!("{}", stats));
        (stats, ledger)
    }
}

/// Counts and ledger entries gathered by one worker
#[derive(Default)]
struct Tally {
    succeeded: usize,
    skipped: usize,
    failed: usize,
    ledger: Vec<(usize, LedgerEntry)>,
}

impl Tally {
    fn push(&mut self, index: usize, item: &Item, reason: String) {
        self.ledger.push((
            index,
            LedgerEntry {
                id: item.id,
                url: item.url.clone(),
                reason,
            },
        ));
    }
}

struct Worker {
    enricher: Arc<Enricher>,
    store: Arc<Mutex<MergeStore>>,
    queue: Arc<Mutex<VecDeque<(usize, Item)>>>,
    throttle: Throttle,
}

impl Worker {
    /// Pulls items until the queue is empty, throttling after each one
    async fn run(self) -> Tally {
        let mut tally = Tally::default();

        loop {
            let Some((index, item)) = self.queue.lock().await.pop_front() else {
                break;
            };

            let outcome = self.enricher.process(&item).await;
            self.apply(index, &item, outcome, &mut tally).await;
            self.throttle.pause().await;
        }

        tally
    }

    async fn apply(&self, index: usize, item: &Item, outcome: ItemOutcome, tally: &mut Tally) {
        match outcome {
            ItemOutcome::Ok(record) => {
                let id = record.id.unwrap_or(item.id);
                let title = record.short_title(40);

                // Persist inside the lock so concurrent upserts never race on the rename
                let persisted = self.store.lock().await.upsert(id, record);

                match persisted {
                    Ok(()) => {
                        tracing::info!("✓ {} «{}»", id, title);
                        tally.succeeded += 1;
                    }
                    Err(e) => {
                        tracing::error!("✗ {}: persist failed: {}", item.id, e);
                        tally.failed += 1;
                        tally.push(index, item, format!("persist failed: {}", e));
                    }
                }
            }
            ItemOutcome::Skipped(reason) => {
                tracing::info!("— skipped {}: {}", item.id, reason);
                tally.skipped += 1;
                tally.push(index, item, reason);
            }
            ItemOutcome::Err(kind, reason) => {
                tracing::error!("✗ {} [{}]: {}", item.id, kind.as_str(), reason);
                tally.failed += 1;
                tally.push(index, item, reason);
            }
        }
    }
}

/// Builds the IranSeda collaborators from `config`, lists items and harvests
///
/// # Returns
///
/// * `Ok(HarvestReport)` - The run completed, possibly with items left in the ledger
/// * `Err(HarvestError)` - Setup failed or every listing page failed
pub async fn run_harvest(config: Config) -> Result<HarvestReport, HarvestError> {
    let fetcher = Fetcher::new(
        build_http_client(&config.http)?,
        RetryPolicy::from_config(&config.retry),
    );
    let site = Url::parse(SITE_BASE).map_err(|e| HarvestError::Listing(e.to_string()))?;

    let listing = TagListing::new(fetcher.clone(), config.listing.url_template.clone(), site.clone());
    let items = collect_items(&listing, config.listing.pages).await?;
    crate::storage::write_id_list(&config.output.ids_csv, &items)?;

    let enricher = build_enricher(&config, fetcher, site)?;
    let store = MergeStore::open(&config.output.books_csv, &config.output.jsonl)?;
    let controller = SweepController::new(enricher, store, PassOptions::from_config(&config));

    controller.run(items).await
}

/// Enricher wired to the IranSeda details extractor and media API
pub fn build_enricher(config: &Config, fetcher: Fetcher, site: Url) -> Result<Enricher, HarvestError> {
    let cache = match config.cache_dir() {
        Some(dir) => Some(DiskCache::open(dir)?),
        None => None,
    };
    let media = MediaApi::new(fetcher.clone(), site.clone());

    Ok(Enricher::new(fetcher, Arc::new(DetailsExtractor::new(site)))
        .with_cache(cache)
        .with_media(Arc::new(media))
        .with_filter(MediaFilter::from(&config.filters)))
}
