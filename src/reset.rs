use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::settings::SettingsStore;
use crate::store::TaskStore;
use chrono::Duration;
use std::sync::Arc;

/// Day-boundary sweep rolling completed tasks into daily archives.
///
/// Runs on a fine cadence (every minute). The idempotent `needs_reset`
/// check guards all work: once the reset timestamp is stamped, repeated
/// sweeps do nothing until the next calendar day.
pub struct ResetCoordinator {
    store: Arc<TaskStore>,
    settings: Arc<SettingsStore>,
    clock: Arc<dyn Clock>,
}

impl ResetCoordinator {
    pub fn new(
        store: Arc<TaskStore>,
        settings: Arc<SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            settings,
            clock,
        }
    }

    /// True when the reset boundary has been crossed and not yet handled
    pub fn needs_reset(&self) -> bool {
        self.settings.snapshot().needs_reset(self.clock.now())
    }

    /// Archive yesterday's (and older) completed tasks when the reset
    /// boundary has been crossed, then stamp the reset time. A sweep with
    /// nothing eligible still stamps, so the boundary is not re-evaluated
    /// until the next calendar day. Returns how many tasks were archived.
    pub fn sweep(&self) -> Result<usize> {
        let now = self.clock.now();
        let settings = self.settings.snapshot();
        if !settings.needs_reset(now) {
            return Ok(0);
        }

        let mut archived = 0;
        if settings.auto_archive_enabled {
            let cutoff = now.date_naive() - Duration::days(1);
            archived = self.store.archive_completed_through(cutoff)?;
        }

        self.settings
            .update_last_reset_time(now)
            .map_err(|err| Error::persistence("saving settings failed", err))?;
        log::info!("daily reset complete, {} task(s) archived", archived);
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::{TaskPriority, TaskStatus};
    use crate::persistence::memory::MemoryStore;
    use chrono::{Local, TimeZone};

    struct Fixture {
        store: Arc<TaskStore>,
        settings: Arc<SettingsStore>,
        persistence: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        coordinator: ResetCoordinator,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::at(
            Local.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        let persistence = Arc::new(MemoryStore::new());
        let store = Arc::new(TaskStore::new(persistence.clone(), clock.clone()));
        let settings = Arc::new(SettingsStore::ephemeral());
        let coordinator = ResetCoordinator::new(store.clone(), settings.clone(), clock.clone());
        Fixture {
            store,
            settings,
            persistence,
            clock,
            coordinator,
        }
    }

    /// Completes a task and backdates `completed_at` by a day, simulating
    /// work finished yesterday.
    fn complete_yesterday(f: &Fixture, name: &str) -> uuid::Uuid {
        let id = f
            .store
            .add_task(name, "", Duration::hours(1), TaskPriority::Medium)
            .unwrap();
        f.clock.advance(Duration::days(-1));
        f.store.change_state(id, TaskStatus::Completed).unwrap();
        f.clock.advance(Duration::days(1));
        id
    }

    #[test]
    fn test_sweep_archives_yesterdays_completed_tasks() {
        // Scenario: completed yesterday, auto-archive on, sweep today
        let f = fixture();
        let id = complete_yesterday(&f, "Done yesterday");

        assert!(f.coordinator.needs_reset());
        assert_eq!(f.coordinator.sweep().unwrap(), 1);

        let yesterday = f.clock.now().date_naive() - Duration::days(1);
        let archived = f.persistence.archived(yesterday);
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].id, id);
        assert!(f.store.tasks(TaskStatus::Completed).is_empty());

        // An immediate second sweep duplicates nothing
        assert!(!f.coordinator.needs_reset());
        assert_eq!(f.coordinator.sweep().unwrap(), 0);
        assert_eq!(f.persistence.archived(yesterday).len(), 1);
    }

    #[test]
    fn test_sweep_keeps_todays_completed_tasks() {
        let f = fixture();
        let id = f
            .store
            .add_task("Done today", "", Duration::hours(1), TaskPriority::Medium)
            .unwrap();
        f.store.change_state(id, TaskStatus::Completed).unwrap();

        f.coordinator.sweep().unwrap();
        assert_eq!(f.store.tasks(TaskStatus::Completed).len(), 1);
    }

    #[test]
    fn test_empty_sweep_still_stamps_reset_time() {
        let f = fixture();
        assert!(f.coordinator.needs_reset());
        assert_eq!(f.coordinator.sweep().unwrap(), 0);
        assert!(!f.coordinator.needs_reset());
        assert_eq!(f.settings.snapshot().last_reset_time, Some(f.clock.now()));
    }

    #[test]
    fn test_needs_reset_again_next_day() {
        let f = fixture();
        f.coordinator.sweep().unwrap();
        assert!(!f.coordinator.needs_reset());

        f.clock.advance(Duration::days(1));
        assert!(f.coordinator.needs_reset());
    }

    #[test]
    fn test_auto_archive_disabled_stamps_without_archiving() {
        let f = fixture();
        complete_yesterday(&f, "Done yesterday");
        f.settings.update(|s| s.auto_archive_enabled = false).unwrap();

        assert_eq!(f.coordinator.sweep().unwrap(), 0);
        assert_eq!(f.store.tasks(TaskStatus::Completed).len(), 1);
        assert!(!f.coordinator.needs_reset());
    }

    #[test]
    fn test_failed_archive_leaves_reset_pending() {
        let f = fixture();
        complete_yesterday(&f, "Done yesterday");

        f.persistence.fail_next_save();
        assert!(f.coordinator.sweep().is_err());

        // The boundary stays open, so the next sweep retries
        assert!(f.coordinator.needs_reset());
        assert_eq!(f.coordinator.sweep().unwrap(), 1);
    }
}
