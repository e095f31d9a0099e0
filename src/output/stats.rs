//! Run statistics
//!
//! This module tallies what each region produced and prints the summary at
//! the end of a run.

use std::time::Duration;

/// What one region's pipeline produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionReport {
    /// Region display name
    pub region: String,

    /// Number of companies in the region's batch
    pub companies: usize,

    /// Records appended to the output file
    pub records: usize,

    /// Enrichment attempts made beyond each company's first
    pub retries: u32,

    /// Companies written to the dead-letter file
    pub dead_letters: usize,
}

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Regions found on the landing page
    pub regions_discovered: usize,

    /// Regions whose records were persisted
    pub regions_completed: usize,

    /// Names of regions that failed before persisting
    pub failed_regions: Vec<String>,

    /// Companies in the batches of completed regions
    pub companies: usize,

    /// Total records appended
    pub records_written: usize,

    /// Total retries across all companies
    pub retries: u64,

    /// Total dead letters
    pub dead_letters: usize,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl CrawlStatistics {
    pub fn new(regions_discovered: usize) -> Self {
        Self {
            regions_discovered,
            ..Self::default()
        }
    }

    /// Adds a completed region
    pub fn record_region(&mut self, report: &RegionReport) {
        self.regions_completed += 1;
        self.companies += report.companies;
        self.records_written += report.records;
        self.retries += u64::from(report.retries);
        self.dead_letters += report.dead_letters;
    }

    /// Adds a region that failed before persisting
    pub fn record_failure(&mut self, region: &str) {
        self.failed_regions.push(region.to_string());
    }

    pub fn regions_failed(&self) -> usize {
        self.failed_regions.len()
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Regions:");
    println!("  Discovered: {}", stats.regions_discovered);
    println!("  Completed: {}", stats.regions_completed);
    println!("  Failed: {}", stats.regions_failed());
    for region in &stats.failed_regions {
        println!("    - {}", region);
    }
    println!();

    println!("Companies:");
    println!("  In batches: {}", stats.companies);
    println!("  Records written: {}", stats.records_written);
    println!("  Retries: {}", stats.retries);
    println!("  Dead letters: {}", stats.dead_letters);
    println!();
}
