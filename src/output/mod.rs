//! Output module for persisting harvested records
//!
//! This module handles:
//! - Appending company records to the semicolon-separated output file
//! - Appending companies that could not be enriched to a dead-letter file
//! - Recording and printing run statistics

mod dead_letter;
mod sink;
pub mod stats;

pub use dead_letter::{DeadLetter, DeadLetterSink};
pub use sink::{CsvRecordSink, RecordSink};
pub use stats::{print_statistics, CrawlStatistics, RegionReport};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
