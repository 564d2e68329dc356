//! In-memory persistence double for tests: counts save calls and can be
//! told to fail the next save, which is how rollback paths are exercised.

use super::TaskPersistence;
use crate::domain::TaskRecord;
use crate::error::{Error, Result};
use crate::store::TaskCollections;
use chrono::{DateTime, Local, NaiveDate};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<TaskCollections>,
    archives: Mutex<BTreeMap<NaiveDate, Vec<TaskRecord>>>,
    save_calls: AtomicUsize,
    fail_next_save: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `save` has been invoked (including failed attempts)
    pub fn save_count(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Make the next `save` call fail with a persistence error
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    /// Last successfully saved collections
    pub fn saved(&self) -> TaskCollections {
        self.saved.lock().unwrap().clone()
    }

    /// Archived tasks for a given day
    pub fn archived(&self, date: NaiveDate) -> Vec<TaskRecord> {
        self.archives
            .lock()
            .unwrap()
            .get(&date)
            .cloned()
            .unwrap_or_default()
    }
}

impl TaskPersistence for MemoryStore {
    fn save(&self, tasks: &TaskCollections) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(Error::persistence(
                "saving tasks failed",
                anyhow::anyhow!("injected save failure"),
            ));
        }
        *self.saved.lock().unwrap() = tasks.clone();
        Ok(())
    }

    fn load(&self) -> Result<TaskCollections> {
        Ok(self.saved())
    }

    fn append_archive(&self, date: NaiveDate, tasks: &[TaskRecord]) -> Result<()> {
        let mut archives = self.archives.lock().unwrap();
        let entry = archives.entry(date).or_default();
        for task in tasks {
            if !entry.iter().any(|t| t.id == task.id) {
                entry.push(task.clone());
            }
        }
        Ok(())
    }

    fn load_archive(&self, date: NaiveDate) -> Result<Vec<TaskRecord>> {
        Ok(self.archived(date))
    }

    fn create_backup(&self, _stamp: DateTime<Local>) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}
