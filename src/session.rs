use crate::clock::Clock;
use crate::domain::{format_hms, TaskPriority, TaskRecord};
use crate::error::{Error, Result};
use crate::notify::NotificationScheduler;
use crate::persistence::TaskPersistence;
use crate::store::{StoreInner, TaskStore};
use chrono::{DateTime, Duration, Local};
use std::sync::Arc;
use uuid::Uuid;

/// State of the single timing session. Lives inside the store's mutex so
/// the commit path shares the collections' critical section.
#[derive(Debug, Clone)]
pub struct TimerState {
    /// Wall-clock start of the current run (meaningless while idle)
    pub started_at: Option<DateTime<Local>>,
    /// Subject accruing time; `None` is the implicit "Other" bucket
    pub active_task: Option<Uuid>,
    pub running: bool,
}

impl TimerState {
    pub fn idle() -> Self {
        Self {
            started_at: None,
            active_task: None,
            running: false,
        }
    }

    pub fn start(&mut self, subject: Option<Uuid>, now: DateTime<Local>) {
        self.started_at = Some(now);
        self.active_task = subject;
        self.running = true;
    }

    pub fn reset(&mut self) {
        *self = Self::idle();
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::idle()
    }
}

/// The single wall-clock timer. Start records the subject and the start
/// time; stop converts the elapsed span into committed time on the subject
/// (or the day's "Other" bucket) and persists.
///
/// At most one session runs at any instant: starting while running first
/// stops-and-commits the previous run, unconditionally. There is no grace
/// window for quick re-selection.
pub struct TrackingSession {
    store: Arc<TaskStore>,
    scheduler: Arc<NotificationScheduler>,
    clock: Arc<dyn Clock>,
}

impl TrackingSession {
    pub fn new(
        store: Arc<TaskStore>,
        scheduler: Arc<NotificationScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            scheduler,
            clock,
        }
    }

    /// Start timing `subject` (or unassigned work for `None`).
    ///
    /// Fails with a domain error when the subject is not in progress. A
    /// running session is committed first; if that commit's save fails the
    /// accrued time stays in memory, the failure is logged, and the new
    /// session still starts.
    pub fn start(&self, subject: Option<Uuid>) -> Result<()> {
        let now = self.clock.now();
        let (committed_previous, reminder) = {
            let mut inner = self.store.lock();

            if let Some(id) = subject {
                let status = inner
                    .tasks
                    .get(id)
                    .map(|t| t.status)
                    .ok_or(Error::TaskNotFound(id))?;
                if !status.is_trackable() {
                    return Err(Error::InvalidState(
                        "only a task in progress can record time".to_string(),
                    ));
                }
            }

            let committed_previous = inner.timer.running;
            if committed_previous {
                if let Err(err) = commit_locked(&mut inner, self.store.persistence(), now) {
                    log::error!("saving committed time failed, totals kept in memory: {}", err);
                }
            }

            inner.timer.start(subject, now);
            let reminder = subject.and_then(|id| {
                inner.tasks.get_mut(id).map(|task| {
                    task.is_processing = true;
                    (id, task.name.clone())
                })
            });
            (committed_previous, reminder)
        };

        if committed_previous {
            self.scheduler.cancel();
        }
        match &reminder {
            Some((id, name)) => {
                log::info!("session started: {}", name);
                self.scheduler.arm(*id, name, now);
            }
            None => log::info!("session started: Other"),
        }
        Ok(())
    }

    /// Stop the session and commit the elapsed span. A no-op success when
    /// nothing is running. A failed save leaves the committed totals in
    /// memory and reports the failure.
    pub fn stop(&self) -> Result<()> {
        let now = self.clock.now();
        let (was_running, result) = {
            let mut inner = self.store.lock();
            if !inner.timer.running {
                (false, Ok(()))
            } else {
                (true, commit_locked(&mut inner, self.store.persistence(), now))
            }
        };
        if was_running {
            self.scheduler.cancel();
        }
        result
    }

    /// Live display value for a task (committed time plus the running span
    /// when the task is the session's subject). Never persisted.
    pub fn display_time(&self, queried: Option<Uuid>) -> Duration {
        self.store.tracked_elapsed(queried, self.clock.now())
    }

    pub fn is_running(&self) -> bool {
        self.store.lock().timer.running
    }

    pub fn active_task(&self) -> Option<Uuid> {
        self.store.lock().timer.active_task
    }
}

/// Deterministic name for the day's unassigned-work bucket
pub fn bucket_name(now: DateTime<Local>) -> String {
    format!("Other ({})", now.format("%m/%d"))
}

/// Commit the running span to the subject (or the day's bucket), reset the
/// timer to idle, and persist. Must be called with the store lock held.
fn commit_locked(
    inner: &mut StoreInner,
    persistence: &dyn TaskPersistence,
    now: DateTime<Local>,
) -> Result<()> {
    let started = inner.timer.started_at.unwrap_or(now);
    let elapsed = now.signed_duration_since(started).max(Duration::zero());

    match inner.timer.active_task {
        Some(id) => {
            if let Some(task) = inner.tasks.get_mut(id) {
                task.add_elapsed(elapsed, now);
                task.is_processing = false;
                log::info!("session stopped: {}, elapsed {}", task.name, format_hms(elapsed));
            } else {
                log::warn!(
                    "session subject vanished before commit, {} discarded",
                    format_hms(elapsed)
                );
            }
        }
        None => {
            let name = bucket_name(now);
            let idx = match inner.tasks.in_progress.iter().position(|t| t.name == name) {
                Some(idx) => idx,
                None => {
                    let bucket = TaskRecord::new(
                        name.clone(),
                        "auto-created",
                        Duration::zero(),
                        TaskPriority::Medium,
                        now,
                    );
                    inner.tasks.in_progress.push(bucket);
                    inner.tasks.in_progress.len() - 1
                }
            };
            let bucket = &mut inner.tasks.in_progress[idx];
            bucket.add_elapsed(elapsed, now);
            bucket.append_memo_line(&format!("{}  +{}", now.format("%H:%M"), format_hms(elapsed)));
            log::info!("session stopped: Other, elapsed {}", format_hms(elapsed));
        }
    }

    inner.timer.reset();
    persistence.save(&inner.tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::TaskStatus;
    use crate::notify::test_support::RecordingNotifier;
    use crate::persistence::memory::MemoryStore;
    use crate::settings::SettingsStore;
    use chrono::TimeZone;

    struct Fixture {
        store: Arc<TaskStore>,
        session: TrackingSession,
        scheduler: Arc<NotificationScheduler>,
        notifier: Arc<RecordingNotifier>,
        persistence: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::at(
            Local.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        let persistence = Arc::new(MemoryStore::new());
        let store = Arc::new(TaskStore::new(persistence.clone(), clock.clone()));
        let settings = Arc::new(SettingsStore::ephemeral());
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = Arc::new(NotificationScheduler::new(
            store.clone(),
            settings,
            notifier.clone(),
        ));
        let session = TrackingSession::new(store.clone(), scheduler.clone(), clock.clone());
        Fixture {
            store,
            session,
            scheduler,
            notifier,
            persistence,
            clock,
        }
    }

    #[test]
    fn test_start_rejects_untrackable_subject() {
        let f = fixture();
        let id = f
            .store
            .add_task("Write report", "", Duration::hours(1), TaskPriority::Medium)
            .unwrap();
        f.store.change_state(id, TaskStatus::Pending).unwrap();

        let err = f.session.start(Some(id)).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(!f.session.is_running());
    }

    #[test]
    fn test_start_stop_commits_elapsed() {
        let f = fixture();
        let id = f
            .store
            .add_task("Write report", "", Duration::minutes(30), TaskPriority::Medium)
            .unwrap();

        f.session.start(Some(id)).unwrap();
        assert!(f.session.is_running());
        assert!(f.store.get(id).unwrap().is_processing);

        f.clock.advance(Duration::minutes(40));
        f.session.stop().unwrap();

        let task = f.store.get(id).unwrap();
        assert_eq!(task.elapsed, Duration::minutes(40));
        assert!(!task.is_processing);
        assert!(!f.session.is_running());
        assert_eq!(f.session.active_task(), None);
    }

    #[test]
    fn test_stop_without_session_is_noop() {
        let f = fixture();
        let saves_before = f.persistence.save_count();
        f.session.stop().unwrap();
        assert_eq!(f.persistence.save_count(), saves_before);
    }

    #[test]
    fn test_stop_cancels_reminder() {
        let f = fixture();
        let id = f
            .store
            .add_task("Write report", "", Duration::hours(1), TaskPriority::Medium)
            .unwrap();

        f.session.start(Some(id)).unwrap();
        assert!(f.scheduler.has_pending());

        f.session.stop().unwrap();
        assert!(!f.scheduler.has_pending());
        assert!(f.notifier.cleared() > 0);
    }

    #[test]
    fn test_unassigned_session_accrues_to_bucket() {
        // Scenario: no task selected, work 65 seconds, stop
        let f = fixture();
        f.session.start(None).unwrap();
        f.clock.advance(Duration::seconds(65));
        f.session.stop().unwrap();

        let expected_name = bucket_name(f.clock.now());
        let in_progress = f.store.tasks(TaskStatus::InProgress);
        let bucket = in_progress
            .iter()
            .find(|t| t.name == expected_name)
            .expect("bucket task created");
        assert_eq!(bucket.elapsed, Duration::seconds(65));
        assert_eq!(bucket.status, TaskStatus::InProgress);
        assert!(bucket.memo.contains("auto-created"));
        assert!(bucket.memo.contains("+0:01:05"));
    }

    #[test]
    fn test_bucket_is_reused_within_a_day() {
        let f = fixture();
        f.session.start(None).unwrap();
        f.clock.advance(Duration::minutes(5));
        f.session.stop().unwrap();

        f.session.start(None).unwrap();
        f.clock.advance(Duration::minutes(10));
        f.session.stop().unwrap();

        let buckets: Vec<_> = f
            .store
            .tasks(TaskStatus::InProgress)
            .into_iter()
            .filter(|t| t.name.starts_with("Other ("))
            .collect();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].elapsed, Duration::minutes(15));
    }

    #[test]
    fn test_switching_subjects_commits_previous() {
        let f = fixture();
        let first = f
            .store
            .add_task("First", "", Duration::hours(1), TaskPriority::Medium)
            .unwrap();
        let second = f
            .store
            .add_task("Second", "", Duration::hours(1), TaskPriority::Medium)
            .unwrap();

        f.session.start(Some(first)).unwrap();
        f.clock.advance(Duration::minutes(10));
        f.session.start(Some(second)).unwrap();

        // The first subject's time is committed by the switch
        assert_eq!(f.store.get(first).unwrap().elapsed, Duration::minutes(10));
        assert!(!f.store.get(first).unwrap().is_processing);
        assert_eq!(f.session.active_task(), Some(second));

        f.clock.advance(Duration::minutes(5));
        f.session.stop().unwrap();
        assert_eq!(f.store.get(second).unwrap().elapsed, Duration::minutes(5));
    }

    #[test]
    fn test_display_time_idle_returns_committed() {
        let f = fixture();
        let id = f
            .store
            .add_task("Write report", "", Duration::hours(1), TaskPriority::Medium)
            .unwrap();

        assert_eq!(f.session.display_time(Some(id)), Duration::zero());
        assert_eq!(f.session.display_time(None), Duration::zero());

        f.session.start(Some(id)).unwrap();
        f.clock.advance(Duration::minutes(3));
        f.session.stop().unwrap();
        assert_eq!(f.session.display_time(Some(id)), Duration::minutes(3));
    }

    #[test]
    fn test_display_time_running_includes_live_span() {
        let f = fixture();
        let subject = f
            .store
            .add_task("Subject", "", Duration::hours(1), TaskPriority::Medium)
            .unwrap();
        let other = f
            .store
            .add_task("Other task", "", Duration::hours(1), TaskPriority::Medium)
            .unwrap();

        f.session.start(Some(subject)).unwrap();
        f.clock.advance(Duration::minutes(7));

        assert_eq!(f.session.display_time(Some(subject)), Duration::minutes(7));
        // A different query sees only its committed total
        assert_eq!(f.session.display_time(Some(other)), Duration::zero());
        assert_eq!(f.session.display_time(None), Duration::zero());

        // Committed total is untouched until stop
        assert_eq!(f.store.get(subject).unwrap().elapsed, Duration::zero());
    }

    #[test]
    fn test_display_time_unassigned_session() {
        let f = fixture();
        f.session.start(None).unwrap();
        f.clock.advance(Duration::seconds(90));
        assert_eq!(f.session.display_time(None), Duration::seconds(90));
    }

    #[test]
    fn test_stop_save_failure_keeps_committed_total() {
        let f = fixture();
        let id = f
            .store
            .add_task("Write report", "", Duration::hours(1), TaskPriority::Medium)
            .unwrap();

        f.session.start(Some(id)).unwrap();
        f.clock.advance(Duration::minutes(10));

        f.persistence.fail_next_save();
        let err = f.session.stop().unwrap_err();
        assert!(!err.is_domain());

        // In-memory totals stay authoritative; the session is idle
        assert_eq!(f.store.get(id).unwrap().elapsed, Duration::minutes(10));
        assert!(!f.session.is_running());
        assert!(f.store.save().is_ok());
    }

    #[test]
    fn test_concurrent_starts_leave_one_running_session() {
        let f = fixture();
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(
                f.store
                    .add_task(&format!("Task {i}"), "", Duration::hours(1), TaskPriority::Medium)
                    .unwrap(),
            );
        }

        let session = Arc::new(f.session);
        let mut handles = Vec::new();
        for id in ids {
            let session = session.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    session.start(Some(id)).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(session.is_running());
        let processing: Vec<_> = f
            .store
            .tasks(TaskStatus::InProgress)
            .into_iter()
            .filter(|t| t.is_processing)
            .collect();
        assert_eq!(processing.len(), 1);
        assert_eq!(Some(processing[0].id), session.active_task());
    }
}
