use crate::error::Result;
use crate::settings::SettingsStore;
use crate::store::TaskStore;
use chrono::Duration;
use std::sync::Arc;

/// Hours an in-progress task may go untouched before demotion
pub const DEFAULT_INACTIVE_HOURS: i64 = 72;

/// Periodic sweep demoting stale in-progress tasks to pending.
///
/// Runs on a coarse cadence (hourly). All demotions of one sweep are
/// persisted together with a single save.
pub struct InactivityMonitor {
    store: Arc<TaskStore>,
    settings: Arc<SettingsStore>,
    threshold: Duration,
}

impl InactivityMonitor {
    pub fn new(store: Arc<TaskStore>, settings: Arc<SettingsStore>) -> Self {
        Self {
            store,
            settings,
            threshold: Duration::hours(DEFAULT_INACTIVE_HOURS),
        }
    }

    /// Override the inactivity threshold
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Demote every in-progress task untouched for longer than the
    /// threshold. Returns how many tasks were demoted. Disabled by the
    /// corresponding settings flag.
    pub fn sweep(&self) -> Result<usize> {
        if !self.settings.snapshot().inactive_tasks_enabled {
            return Ok(0);
        }

        let demoted = self.store.demote_inactive(self.threshold)?;
        for event in &demoted {
            log::info!("task demoted after inactivity: {}", event.name);
        }
        Ok(demoted.len())
    }
}
