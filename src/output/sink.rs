//! Record sink trait and its CSV implementation

use crate::crawler::CompanyRecord;
use crate::output::OutputResult;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Durable, append-only storage for finished records
///
/// Implementations must be thread-safe. Each call appends the given rows as
/// one batch; nothing is deduplicated.
pub trait RecordSink: Send + Sync {
    /// Appends `rows` in order
    fn append_rows(&self, rows: &[CompanyRecord]) -> OutputResult<()>;
}

/// Appends records to a UTF-8 file, `;`-separated, without a header row
///
/// Fields are written as `region;title;category;location;website`.
#[derive(Debug, Clone)]
pub struct CsvRecordSink {
    path: PathBuf,
}

impl CsvRecordSink {
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
}

impl RecordSink for CsvRecordSink {
    fn append_rows(&self, rows: &[CompanyRecord]) -> OutputResult<()> {
        append_serialized(&self.path, rows)
    }
}

pub(crate) fn open_for_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Opens `path` in append mode and serializes each row as one line
pub(crate) fn append_serialized<T: Serialize>(path: &Path, rows: &[T]) -> OutputResult<()> {
    let file = open_for_append(path)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
