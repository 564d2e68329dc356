use super::files::{atomic_write, read_file, DataPaths};
use super::TaskPersistence;
use crate::domain::TaskRecord;
use crate::error::{Error, Result};
use crate::store::TaskCollections;
use anyhow::Context;
use chrono::{DateTime, Local, NaiveDate};
use std::fs;
use std::path::PathBuf;

/// JSON-file implementation of the persistence port.
///
/// The live collections go to `tasks.json`, archived tasks to one JSON
/// array per calendar day under `archives/`, backups under `backups/`.
/// All writes are atomic (temp file + rename).
pub struct JsonFileStore {
    paths: DataPaths,
}

impl JsonFileStore {
    /// Open a store rooted at the given data directory, creating the
    /// directory if needed. An unusable data directory is a fatal error.
    pub fn open(paths: DataPaths) -> anyhow::Result<Self> {
        paths.ensure()?;
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }
}

impl TaskPersistence for JsonFileStore {
    fn save(&self, tasks: &TaskCollections) -> Result<()> {
        let write = || -> anyhow::Result<()> {
            let json = serde_json::to_string_pretty(tasks).context("Failed to serialize tasks")?;
            atomic_write(self.paths.tasks_file(), &json)
        };
        write().map_err(|err| Error::persistence("saving tasks failed", err))?;
        log::debug!("tasks saved to {}", self.paths.tasks_file().display());
        Ok(())
    }

    fn load(&self) -> Result<TaskCollections> {
        let read = || -> anyhow::Result<TaskCollections> {
            let content = read_file(self.paths.tasks_file())?;
            if content.trim().is_empty() {
                // First run, nothing saved yet
                return Ok(TaskCollections::default());
            }
            serde_json::from_str(&content).context("Failed to parse task document")
        };
        read().map_err(|err| Error::persistence("loading tasks failed", err))
    }

    fn append_archive(&self, date: NaiveDate, tasks: &[TaskRecord]) -> Result<()> {
        let write = || -> anyhow::Result<()> {
            let path = self.paths.archive_file(date);
            let content = read_file(&path)?;
            let mut archived: Vec<TaskRecord> = if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content).context("Failed to parse archive document")?
            };

            // Re-running the sweep for the same day must not duplicate entries
            for task in tasks {
                if !archived.iter().any(|t| t.id == task.id) {
                    archived.push(task.clone());
                }
            }

            let json =
                serde_json::to_string_pretty(&archived).context("Failed to serialize archive")?;
            atomic_write(&path, &json)
        };
        write().map_err(|err| Error::persistence("archiving completed tasks failed", err))
    }

    fn load_archive(&self, date: NaiveDate) -> Result<Vec<TaskRecord>> {
        let read = || -> anyhow::Result<Vec<TaskRecord>> {
            let content = read_file(self.paths.archive_file(date))?;
            if content.trim().is_empty() {
                return Ok(Vec::new());
            }
            serde_json::from_str(&content).context("Failed to parse archive document")
        };
        read().map_err(|err| Error::persistence("loading archived tasks failed", err))
    }

    fn create_backup(&self, stamp: DateTime<Local>) -> Result<Option<PathBuf>> {
        let copy = || -> anyhow::Result<Option<PathBuf>> {
            let source = self.paths.tasks_file();
            if !source.exists() {
                return Ok(None);
            }
            let target = self.paths.backup_file(stamp);
            if let Some(dir) = target.parent() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
            fs::copy(&source, &target)
                .with_context(|| format!("Failed to back up: {}", source.display()))?;
            Ok(Some(target))
        };
        copy().map_err(|err| Error::persistence("creating backup failed", err))
    }
}
