pub mod files;
pub mod json;
#[cfg(test)]
pub mod memory;

pub use files::{atomic_write, init_local_dir, read_file, DataPaths};
pub use json::JsonFileStore;

use crate::domain::TaskRecord;
use crate::error::Result;
use crate::store::TaskCollections;
use chrono::{DateTime, Local, NaiveDate};
use std::path::PathBuf;

/// Durable storage boundary for the live collections and the archives.
///
/// `save` is called synchronously from inside the store's critical section
/// so a failure can roll the in-memory change back before any other sweep
/// observes it.
pub trait TaskPersistence: Send + Sync {
    /// Persist the live task document
    fn save(&self, tasks: &TaskCollections) -> Result<()>;

    /// Load the live task document (empty collections when absent)
    fn load(&self) -> Result<TaskCollections>;

    /// Append tasks to the dated archive document without duplicating ids
    fn append_archive(&self, date: NaiveDate, tasks: &[TaskRecord]) -> Result<()>;

    /// Read back a day's archive (empty when absent)
    fn load_archive(&self, date: NaiveDate) -> Result<Vec<TaskRecord>>;

    /// Copy the live document aside; returns the backup path if one was made
    fn create_backup(&self, stamp: DateTime<Local>) -> Result<Option<PathBuf>>;
}
