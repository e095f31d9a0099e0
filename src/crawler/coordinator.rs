//! Crawler coordinator - main harvest orchestration logic
//!
//! This module drives a whole run:
//! - Discovering the regions once from the landing page
//! - Processing regions one at a time
//! - Fanning each region's companies out over the enrichment pool
//! - Retrying transient failures and dead-lettering the rest
//! - Appending each region's records to the sink in one batch

use crate::config::Config;
use crate::crawler::enricher::{CompanyEnricher, CompanyRecord, EnrichmentOutcome, RawCompany};
use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::parser::Selectors;
use crate::crawler::pool::EnrichmentPool;
use crate::crawler::regions::{discover_regions, fetch_batch, resolve_pagination, Region};
use crate::crawler::retry::RetryPolicy;
use crate::output::{CrawlStatistics, CsvRecordSink, DeadLetter, DeadLetterSink, RecordSink, RegionReport};
use crate::HarvestError;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    base_url: Url,
    api_url: Url,
    fetcher: PageFetcher,
    selectors: Arc<Selectors>,
    enricher: Arc<CompanyEnricher>,
    pool: EnrichmentPool,
    retry: RetryPolicy,
    records: Box<dyn RecordSink>,
    dead_letters: DeadLetterSink,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Builds the HTTP client, compiles the selectors, opens both output
    /// files and starts the enrichment pool, which lives until
    /// [`Coordinator::shutdown`]. Must be called inside a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `config` - A validated harvester configuration
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&config.site.base_url)?;
        let api_url = Url::parse(&config.site.api_url)?;

        let fetcher = PageFetcher::new(&config.site)?;
        let selectors = Arc::new(Selectors::compile(&config.selectors)?);

        let records = CsvRecordSink::new(&config.output.records_path);
        records.open()?;
        let dead_letters = DeadLetterSink::new(&config.output.dead_letter_path);
        dead_letters.open()?;

        let enricher = Arc::new(CompanyEnricher::new(
            fetcher.clone(),
            base_url.clone(),
            Arc::clone(&selectors),
            config.crawler.detail_timeout(),
        ));
        let pool = EnrichmentPool::new(Arc::clone(&enricher), config.crawler.workers as usize);

        let retry = RetryPolicy::from(&config.crawler);

        Ok(Self {
            config: Arc::new(config),
            base_url,
            api_url,
            fetcher,
            selectors,
            enricher,
            pool,
            retry,
            records: Box::new(records),
            dead_letters,
        })
    }

    /// Replaces the CSV record sink
    pub fn with_record_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.records = sink;
        self
    }

    /// Runs the whole harvest
    ///
    /// Region discovery failures and output failures abort the run. Any
    /// other failure inside one region is logged and the next region
    /// proceeds.
    pub async fn run(&self) -> Result<CrawlStatistics, HarvestError> {
        let start_time = Instant::now();

        tracing::info!("Discovering regions on {}", self.base_url);
        let regions = discover_regions(
            &self.fetcher,
            &self.base_url,
            &self.selectors,
            self.config.crawler.request_timeout(),
        )
        .await?;
        tracing::info!("Found {} regions", regions.len());

        let mut stats = CrawlStatistics::new(regions.len());

        for (index, region) in regions.iter().enumerate() {
            tracing::info!(
                "Region {}/{}: {} ({})",
                index + 1,
                regions.len(),
                region.name,
                region.link
            );

            match self.process_region(region).await {
                Ok(report) => stats.record_region(&report),
                Err(e) if e.is_output_failure() => {
                    tracing::error!("Region {}: cannot persist results, stopping: {}", region.name, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("Region {} failed: {}", region.name, e);
                    stats.record_failure(&region.name);
                }
            }
        }

        stats.elapsed = start_time.elapsed();
        tracing::info!(
            "Harvest completed: {} records from {}/{} regions in {:?}",
            stats.records_written,
            stats.regions_completed,
            stats.regions_discovered,
            stats.elapsed
        );

        Ok(stats)
    }

    /// Drives one region from its pagination token to persisted records
    ///
    /// Nothing is written unless every company of the batch has either a
    /// finished record or a dead letter. Dead letters are written before
    /// records; if the records then fail to persist, the error reports how
    /// many dead letters were already saved.
    pub async fn process_region(&self, region: &Region) -> Result<RegionReport, HarvestError> {
        let timeout = self.config.crawler.request_timeout();

        let token = resolve_pagination(&self.fetcher, &region.link, &self.selectors, timeout).await?;
        tracing::debug!("{}: pagination token {}", region.name, token);

        let batch = fetch_batch(
            &self.fetcher,
            &self.api_url,
            &token,
            &self.config.site.block_key,
            timeout,
        )
        .await?;
        let expected = batch.len();
        tracing::info!("{}: {} companies", region.name, expected);

        let mut outcomes = self.pool.dispatch(&region.name, batch);
        let mut records = Vec::with_capacity(expected);
        let mut letters = Vec::new();
        let mut retries = 0;
        let mut received = 0;

        while let Some(outcome) = outcomes.recv().await {
            received += 1;
            match outcome {
                EnrichmentOutcome::Success(record) => {
                    tracing::debug!("{}: {:?}", region.name, record);
                    records.push(record);
                }
                EnrichmentOutcome::TransientFailure { raw, error } => {
                    let (result, used) = self.retry_enrichment(raw, &region.name, error).await;
                    retries += used;
                    match result {
                        Ok(record) => records.push(record),
                        Err(letter) => letters.push(letter),
                    }
                }
                EnrichmentOutcome::Rejected { raw, reason } => {
                    tracing::warn!(
                        "{}: rejected {:?}: {}",
                        region.name,
                        raw.title.as_deref().unwrap_or(""),
                        reason
                    );
                    letters.push(DeadLetter::new(&region.name, &raw, 1, reason));
                }
            }
        }

        if received != expected {
            tracing::error!(
                "{}: received {} of {} enrichment outcomes",
                region.name,
                received,
                expected
            );
            return Err(HarvestError::PoolClosed);
        }

        self.dead_letters.append(&letters)?;
        if let Err(source) = self.records.append_rows(&records) {
            return Err(HarvestError::RegionPersist {
                region: region.name.clone(),
                dead_letters: letters.len(),
                records: records.len(),
                source,
            });
        }

        tracing::info!(
            "{}: saved {} records ({} retries, {} dead letters)",
            region.name,
            records.len(),
            retries,
            letters.len()
        );

        Ok(RegionReport {
            region: region.name.clone(),
            companies: expected,
            records: records.len(),
            retries,
            dead_letters: letters.len(),
        })
    }

    /// Retries a company whose first attempt failed transiently
    ///
    /// Runs on the coordinating path, sleeping the policy's backoff before
    /// each attempt. Returns the record or a dead letter, together with the
    /// number of retries made.
    async fn retry_enrichment(
        &self,
        raw: RawCompany,
        region: &str,
        first_error: FetchError,
    ) -> (Result<CompanyRecord, DeadLetter>, u32) {
        let mut raw = raw;
        let mut last_error = first_error.to_string();
        let mut attempts = 1;

        while self.retry.allows(attempts) {
            let delay = self.retry.backoff(attempts);
            tracing::warn!(
                "{}: try again {:?} after attempt {}/{} failed ({}), waiting {:?}",
                region,
                raw.title.as_deref().unwrap_or(""),
                attempts,
                self.retry.max_attempts,
                last_error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempts += 1;

            match self.enricher.enrich(raw, region).await {
                EnrichmentOutcome::Success(record) => return (Ok(record), attempts - 1),
                EnrichmentOutcome::TransientFailure { raw: again, error } => {
                    raw = again;
                    last_error = error.to_string();
                }
                EnrichmentOutcome::Rejected { raw, reason } => {
                    tracing::warn!("{}: rejected {:?}: {}", region, raw.title, reason);
                    let letter = DeadLetter::new(region, &raw, attempts, reason);
                    return (Err(letter), attempts - 1);
                }
            }
        }

        tracing::warn!(
            "{}: giving up on {:?} after {} attempts: {}",
            region,
            raw.title.as_deref().unwrap_or(""),
            attempts,
            last_error
        );
        let letter = DeadLetter::new(
            region,
            &raw,
            attempts,
            format!("retries exhausted: {}", last_error),
        );
        (Err(letter), attempts - 1)
    }

    /// Stops the enrichment pool
    pub async fn shutdown(self) -> Result<(), HarvestError> {
        self.pool.shutdown().await
    }
}

/// Runs a complete harvest with the given configuration and stops the pool
pub async fn run_harvest(config: Config) -> Result<CrawlStatistics, HarvestError> {
    let coordinator = Coordinator::new(config)?;
    let result = coordinator.run().await;
    coordinator.shutdown().await?;
    result
}
