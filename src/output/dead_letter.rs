//! Companies that could not be enriched
//!
//! A dead letter keeps enough of the listing to find it again by hand, plus
//! why it failed and after how many attempts.

use crate::crawler::RawCompany;
use crate::output::sink::{append_serialized, open_for_append};
use crate::output::OutputResult;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadLetter {
    pub region: String,
    pub title: String,
    pub link: String,
    pub attempts: u32,
    pub reason: String,
    /// RFC 3339 timestamp of the final attempt
    pub failed_at: String,
}

impl DeadLetter {
    pub fn new(region: &str, raw: &RawCompany, attempts: u32, reason: impl Into<String>) -> Self {
        Self {
            region: region.to_string(),
            title: raw.title.clone().unwrap_or_default(),
            link: raw.link.clone().unwrap_or_default(),
            attempts,
            reason: reason.into(),
            failed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Appends dead letters as `region;title;link;attempts;reason;failed_at`
#[derive(Debug, Clone)]
pub struct DeadLetterSink {
    path: PathBuf,
}

impl DeadLetterSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the file if needed and checks it can be appended to
    pub fn open(&self) -> OutputResult<()> {
        open_for_append(&self.path)?;
        Ok(())
    }

    pub fn append(&self, letters: &[DeadLetter]) -> OutputResult<()> {
        if letters.is_empty() {
            return Ok(());
        }
        append_serialized(&self.path, letters)
    }
}
