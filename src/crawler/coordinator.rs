//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that walks every configured region,
//! including:
//! - Creating the run record before any page is fetched
//! - Handing regions to a pool of workers, one fetch session each
//! - Isolating failures to the region or route they happened in
//! - Draining the shared listing buffer into storage once, at the end
//! - Honouring the run-scoped cancellation signal

use crate::config::Config;
use crate::crawler::discovery::{discover_routes, Region, Route};
use crate::crawler::extractor::ListingExtractor;
use crate::crawler::fetcher::{load_page, open_sessions, FetchError, PageFetcher};
use crate::crawler::normalizer::normalize;
use crate::crawler::scheduler::RegionQueue;
use crate::state::{CrawlPhase, FailureScope, PhaseTracker};
use crate::storage::{
    ListingRecord, ListingSink, RunStatus, SqliteStorage, StorageError, StorageResult,
};
use crate::{ConfigError, CrawlerError};
use backoff::ExponentialBackoffBuilder;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Outcome of one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub run_id: i64,
    pub regions_total: usize,
    pub regions_crawled: usize,
    pub regions_failed: usize,
    pub routes_discovered: usize,
    pub routes_failed: usize,
    pub listings_collected: usize,
    pub records_written: usize,
    pub cancelled: bool,
}

/// Counters one worker accumulates over the regions it claimed
#[derive(Debug, Clone, Copy, Default)]
struct WorkerTally {
    regions_crawled: usize,
    regions_failed: usize,
    routes_discovered: usize,
    routes_failed: usize,
    listings: usize,
}

impl WorkerTally {
    fn merge(&mut self, other: WorkerTally) {
        self.regions_crawled += other.regions_crawled;
        self.regions_failed += other.regions_failed;
        self.routes_discovered += other.routes_discovered;
        self.routes_failed += other.routes_failed;
        self.listings += other.listings;
    }
}

/// State shared by every worker of a run
struct RunContext {
    config: Arc<Config>,
    queue: RegionQueue,
    /// Records normalized so far; workers append, the orchestrator drains
    buffer: Mutex<Vec<ListingRecord>>,
    cancel: CancellationToken,
}

/// Main crawl orchestrator
pub struct Orchestrator {
    config: Arc<Config>,
    regions: Vec<Region>,
}

impl Orchestrator {
    /// Creates an orchestrator for the regions in `config`
    ///
    /// # Errors
    ///
    /// Fails if no regions are configured or an entry URL does not parse.
    pub fn new(config: Config) -> Result<Self, CrawlerError> {
        let regions = config
            .regions
            .iter()
            .map(Region::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        if regions.is_empty() {
            return Err(ConfigError::Validation("No regions configured".to_string()).into());
        }

        Ok(Self {
            config: Arc::new(config),
            regions,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn database_path(&self) -> &Path {
        Path::new(&self.config.output.database_path)
    }

    /// Ensures the schema exists and records a new run
    ///
    /// The connection is released before returning.
    ///
    /// # Returns
    ///
    /// The ID of the new run
    pub fn begin_run(&self, config_hash: &str) -> Result<i64, CrawlerError> {
        let mut storage = SqliteStorage::new(self.database_path())?;
        storage.ensure_schema()?;
        let run_id = storage.create_run(config_hash)?;

        tracing::info!("Starting crawl run {}", run_id);
        Ok(run_id)
    }

    /// Crawls every region with one worker per session, then flushes
    ///
    /// Region and route failures are logged and skipped. Once `cancel` is
    /// raised no new region or route is started, and whatever was already
    /// normalized is still written.
    ///
    /// # Errors
    ///
    /// Fails if no sessions are supplied, or if the flush still fails after
    /// its retries are exhausted. The run is marked failed in that case.
    pub async fn run(
        &self,
        run_id: i64,
        sessions: Vec<Box<dyn PageFetcher>>,
        cancel: CancellationToken,
    ) -> Result<CrawlReport, CrawlerError> {
        let started = Instant::now();
        let mut phase = PhaseTracker::new("orchestrator");
        phase.advance(CrawlPhase::PerRegion);

        let (records, tally) = match self.collect(sessions, cancel.clone()).await {
            Ok(collected) => collected,
            Err(e) => {
                self.finish_quietly(run_id, RunStatus::Failed, 0);
                return Err(e);
            }
        };
        let cancelled = cancel.is_cancelled();

        tracing::info!(
            "Flushing {} listings from {} regions",
            records.len(),
            tally.regions_crawled
        );

        let written = match self.flush(run_id, &records).await {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(run_id, error = %e, "Flush failed, {} listings lost", records.len());
                self.finish_quietly(run_id, RunStatus::Failed, 0);
                return Err(e.into());
            }
        };
        phase.advance(CrawlPhase::Persisted);

        let status = if cancelled {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        self.finish(run_id, status, written as u64)?;
        phase.advance(CrawlPhase::Idle);

        tracing::info!(
            "Crawl run {} {}: {} records written in {:?}",
            run_id,
            status.to_db_string(),
            written,
            started.elapsed()
        );

        Ok(CrawlReport {
            run_id,
            regions_total: self.regions.len(),
            regions_crawled: tally.regions_crawled,
            regions_failed: tally.regions_failed,
            routes_discovered: tally.routes_discovered,
            routes_failed: tally.routes_failed,
            listings_collected: records.len(),
            records_written: written,
            cancelled,
        })
    }

    /// Runs the workers to completion and drains the shared buffer
    async fn collect(
        &self,
        sessions: Vec<Box<dyn PageFetcher>>,
        cancel: CancellationToken,
    ) -> Result<(Vec<ListingRecord>, WorkerTally), CrawlerError> {
        if sessions.is_empty() {
            return Err(CrawlerError::Startup("No fetch sessions available".to_string()));
        }

        let context = Arc::new(RunContext {
            config: Arc::clone(&self.config),
            queue: RegionQueue::new(self.regions.clone(), cancel.clone()),
            buffer: Mutex::new(Vec::new()),
            cancel,
        });

        let mut workers = JoinSet::new();
        for (worker, fetcher) in sessions.into_iter().enumerate() {
            workers.spawn(run_worker(worker, fetcher, Arc::clone(&context)));
        }

        let mut tally = WorkerTally::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(worker_tally) => tally.merge(worker_tally),
                Err(e) => tracing::error!("Crawl worker aborted: {}", e),
            }
        }

        if context.queue.is_cancelled() {
            tracing::info!(
                "Crawl cancelled with {} regions unclaimed",
                context.queue.remaining().await
            );
        }

        let records = std::mem::take(&mut *context.buffer.lock().await);
        Ok((records, tally))
    }

    /// Appends `records` in one transaction, retrying with exponential backoff
    ///
    /// Each attempt runs on the blocking pool, so waiting on a busy database
    /// never holds up the runtime.
    async fn flush(&self, run_id: i64, records: &[ListingRecord]) -> StorageResult<usize> {
        let path = self.database_path().to_path_buf();
        let batch = Arc::new(records.to_vec());
        let timing = &self.config.crawler;
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(timing.flush_initial_backoff())
            .with_max_elapsed_time(Some(timing.flush_max_elapsed()))
            .build();

        backoff::future::retry_notify(
            policy,
            || {
                let path = path.clone();
                let batch = Arc::clone(&batch);
                async move {
                    match tokio::task::spawn_blocking(move || write_batch(&path, run_id, &batch))
                        .await
                    {
                        Ok(result) => result.map_err(backoff::Error::transient),
                        Err(e) => Err(backoff::Error::permanent(StorageError::Database(
                            format!("Flush task did not complete: {}", e),
                        ))),
                    }
                }
            },
            |e: StorageError, wait: Duration| {
                tracing::warn!(run_id, error = %e, "Flush failed, retrying in {:?}", wait);
            },
        )
        .await
    }

    fn finish(&self, run_id: i64, status: RunStatus, records_written: u64) -> StorageResult<()> {
        let mut storage = SqliteStorage::new(self.database_path())?;
        storage.finish_run(run_id, status, records_written)
    }

    fn finish_quietly(&self, run_id: i64, status: RunStatus, records_written: u64) {
        if let Err(e) = self.finish(run_id, status, records_written) {
            tracing::error!(run_id, error = %e, "Failed to record run status");
        }
    }
}

/// Opens its own connection so none is held across the crawl
fn write_batch(path: &Path, run_id: i64, records: &[ListingRecord]) -> StorageResult<usize> {
    let mut storage = SqliteStorage::new(path)?;
    storage.append(run_id, records)
}

/// Claims regions until the queue is drained or the run is cancelled
///
/// The session is closed before the worker returns.
async fn run_worker(
    worker: usize,
    mut fetcher: Box<dyn PageFetcher>,
    context: Arc<RunContext>,
) -> WorkerTally {
    let config = Arc::clone(&context.config);
    let extractor = ListingExtractor::new(&config.selectors, &config.crawler);
    let mut phase = PhaseTracker::new(format!("worker-{}", worker));
    let mut tally = WorkerTally::default();

    while let Some(region) = context.queue.next_region().await {
        phase.advance(CrawlPhase::PerRegion);

        let routes = match open_region(fetcher.as_mut(), &region, &config).await {
            Ok(routes) => routes,
            Err(e) => {
                tracing::warn!(
                    worker,
                    region = %region.name,
                    url = %region.entry_url,
                    error = %e,
                    "Skipping region"
                );
                tally.regions_failed += 1;
                phase.advance(CrawlPhase::Failed(FailureScope::Region));
                phase.advance(CrawlPhase::PerRegion);
                continue;
            }
        };

        tally.regions_crawled += 1;
        tally.routes_discovered += routes.len();

        if routes.is_empty() {
            tracing::info!(worker, region = %region.name, "No routes found");
            continue;
        }
        tracing::info!(worker, region = %region.name, "Crawling {} routes", routes.len());

        for route in &routes {
            if context.cancel.is_cancelled() {
                tracing::info!(worker, region = %region.name, "Cancelled, leaving region");
                break;
            }

            phase.advance(CrawlPhase::PerRoute);
            match extractor.try_extract(fetcher.as_mut(), route).await {
                Ok(columns) => {
                    phase.advance(CrawlPhase::Normalizing);
                    let records = normalize(route, &region, &columns);
                    tally.listings += records.len();
                    log_route(worker, route, records.len());

                    context.buffer.lock().await.extend(records);
                    phase.advance(CrawlPhase::PerRoute);
                }
                Err(e) => {
                    tracing::warn!(
                        worker,
                        region = %region.name,
                        url = %route.link,
                        error = %e,
                        "Skipping route"
                    );
                    tally.routes_failed += 1;
                    phase.advance(CrawlPhase::Failed(FailureScope::Route));
                    phase.advance(CrawlPhase::PerRoute);
                }
            }
        }

        phase.advance(CrawlPhase::PerRegion);
    }

    if let Err(e) = fetcher.close().await {
        tracing::warn!(worker, error = %e, "Failed to close fetch session");
    }

    tally
}

async fn open_region(
    fetcher: &mut dyn PageFetcher,
    region: &Region,
    config: &Config,
) -> Result<Vec<Route>, FetchError> {
    load_page(fetcher, &region.entry_url, config.crawler.page_load_timeout()).await?;
    discover_routes(fetcher, region, &config.selectors.route).await
}

fn log_route(worker: usize, route: &Route, listings: usize) {
    if listings == 0 {
        tracing::debug!(worker, url = %route.link, "Route has no listings");
    } else {
        tracing::debug!(worker, url = %route.link, listings, "Route extracted");
    }
}

/// Runs a complete crawl
///
/// This is the process entry point. It will:
/// 1. Ensure the schema and record a new run; unreachable storage is fatal
/// 2. Open one fetch session per worker; failing to open any is fatal
/// 3. Crawl every region, skipping whatever fails
/// 4. Flush the collected listings and close the run
///
/// # Arguments
///
/// * `config` - The validated crawler configuration
/// * `config_hash` - Hash of the configuration file, stored with the run
/// * `cancel` - Run-scoped cancellation signal
///
/// # Example
///
/// ```no_run
/// use bus_crawler::config::load_config_with_hash;
/// use bus_crawler::crawler::initialize_and_run;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let report = initialize_and_run(config, &hash, CancellationToken::new()).await?;
/// println!("{} records written", report.records_written);
/// # Ok(())
/// # }
/// ```
pub async fn initialize_and_run(
    config: Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<CrawlReport, CrawlerError> {
    let orchestrator = Orchestrator::new(config)?;
    let run_id = orchestrator.begin_run(config_hash)?;

    let sessions = match open_sessions(orchestrator.config()).await {
        Ok(sessions) => sessions,
        Err(e) => {
            orchestrator.finish_quietly(run_id, RunStatus::Failed, 0);
            return Err(CrawlerError::Startup(format!(
                "Could not open fetch session: {}",
                e
            )));
        }
    };

    orchestrator.run(run_id, sessions, cancel).await
}
