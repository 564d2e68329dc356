use crate::clock::Clock;
use crate::domain::validate::validate_fields;
use crate::domain::{TaskPriority, TaskRecord, TaskStatus};
use crate::error::{Error, Result};
use crate::persistence::TaskPersistence;
use crate::session::TimerState;
use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// The three status-partitioned task collections.
///
/// Invariant: every task lives in exactly the collection named by its
/// `status` field. All mutation goes through `TaskStore`, which maintains
/// this.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskCollections {
    #[serde(default)]
    pub in_progress: Vec<TaskRecord>,
    #[serde(default)]
    pub pending: Vec<TaskRecord>,
    #[serde(default)]
    pub completed: Vec<TaskRecord>,
}

impl TaskCollections {
    pub fn collection(&self, status: TaskStatus) -> &[TaskRecord] {
        match status {
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Pending => &self.pending,
            TaskStatus::Completed => &self.completed,
        }
    }

    pub fn collection_mut(&mut self, status: TaskStatus) -> &mut Vec<TaskRecord> {
        match status {
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::Completed => &mut self.completed,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskRecord> {
        self.in_progress
            .iter()
            .chain(self.pending.iter())
            .chain(self.completed.iter())
    }

    pub fn get(&self, id: Uuid) -> Option<&TaskRecord> {
        self.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut TaskRecord> {
        self.in_progress
            .iter_mut()
            .chain(self.pending.iter_mut())
            .chain(self.completed.iter_mut())
            .find(|t| t.id == id)
    }

    /// Which collection a task sits in, and at what index
    pub fn locate(&self, id: Uuid) -> Option<(TaskStatus, usize)> {
        for status in TaskStatus::ALL {
            if let Some(idx) = self.collection(status).iter().position(|t| t.id == id) {
                return Some((status, idx));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.in_progress.len() + self.pending.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Event emitted after a task changed status and the change was persisted
#[derive(Debug, Clone)]
pub struct StateChanged {
    pub id: Uuid,
    pub name: String,
    pub old: TaskStatus,
    pub new: TaskStatus,
}

pub type StateObserver = Box<dyn Fn(&StateChanged) + Send + Sync>;

/// Everything guarded by the store's mutex: the collections, the selection
/// pointer, and the timer state of the single tracking session.
pub(crate) struct StoreInner {
    pub(crate) tasks: TaskCollections,
    pub(crate) active_task: Option<Uuid>,
    pub(crate) timer: TimerState,
}

/// Owner of the task collections and the only safe way to mutate them.
///
/// Every operation takes the one process-wide mutex for its full duration,
/// including the synchronous persistence call, so that a failed save can be
/// rolled back before any sweep observes an inconsistent state. Observer
/// callbacks run after the lock is released.
pub struct TaskStore {
    inner: Mutex<StoreInner>,
    persistence: Arc<dyn TaskPersistence>,
    clock: Arc<dyn Clock>,
    observers: Mutex<Vec<StateObserver>>,
}

impl TaskStore {
    pub fn new(persistence: Arc<dyn TaskPersistence>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                tasks: TaskCollections::default(),
                active_task: None,
                timer: TimerState::idle(),
            }),
            persistence,
            clock,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap()
    }

    pub(crate) fn persistence(&self) -> &dyn TaskPersistence {
        self.persistence.as_ref()
    }

    /// Replace the in-memory collections from the persistence port.
    /// Runtime-only state (processing flags, selection, timer) is reset.
    pub fn load(&self) -> Result<()> {
        let loaded = self.persistence.load()?;
        let mut inner = self.lock();
        inner.tasks = loaded;
        inner.active_task = None;
        inner.timer = TimerState::idle();

        for status in TaskStatus::ALL {
            for task in inner.tasks.collection_mut(status).iter_mut() {
                task.is_processing = false;
                if task.status != status {
                    log::warn!(
                        "task \"{}\" loaded under {} with status {}; fixing",
                        task.name,
                        status.label(),
                        task.status.label()
                    );
                    task.status = status;
                }
            }
        }

        log::info!("loaded {} task(s)", inner.tasks.len());
        Ok(())
    }

    /// Persist the current collections
    pub fn save(&self) -> Result<()> {
        let inner = self.lock();
        self.persistence.save(&inner.tasks)
    }

    /// Register an observer for state-change events
    pub fn subscribe(&self, observer: impl Fn(&StateChanged) + Send + Sync + 'static) {
        self.observers.lock().unwrap().push(Box::new(observer));
    }

    fn emit(&self, events: &[StateChanged]) {
        let observers = self.observers.lock().unwrap();
        for event in events {
            for observer in observers.iter() {
                observer(event);
            }
        }
    }

    /// Create a task and persist the collections. New tasks start InProgress.
    pub fn add_task(
        &self,
        name: &str,
        memo: &str,
        estimated: Duration,
        priority: TaskPriority,
    ) -> Result<Uuid> {
        validate_fields(name, memo, estimated)?;
        let now = self.clock.now();
        let task = TaskRecord::new(name, memo, estimated, priority, now);
        let id = task.id;

        let mut inner = self.lock();
        inner.tasks.in_progress.push(task);
        if let Err(err) = self.persistence.save(&inner.tasks) {
            inner.tasks.in_progress.pop();
            return Err(err);
        }
        log::info!("task added: {}", name);
        Ok(id)
    }

    /// Move a task to a new status.
    ///
    /// Changing to the current status is an idempotent no-op (returns
    /// `Ok(None)`, no save, no event). Otherwise the task is moved between
    /// collections, stamped, persisted, and a `StateChanged` event is
    /// emitted. A failed save rolls everything back.
    pub fn change_state(&self, id: Uuid, new_status: TaskStatus) -> Result<Option<StateChanged>> {
        let now = self.clock.now();
        let event = {
            let mut inner = self.lock();
            let (found_in, idx) = inner.tasks.locate(id).ok_or(Error::TaskNotFound(id))?;
            let old_status = inner.tasks.collection(found_in)[idx].status;
            if old_status != found_in {
                // Membership contradicts the status field: internal fault,
                // leave everything untouched.
                let name = inner.tasks.collection(found_in)[idx].name.clone();
                return Err(Error::TaskNotInCollection {
                    name,
                    status: old_status,
                });
            }
            if old_status == new_status {
                return Ok(None);
            }

            let snapshot = inner.tasks.clone();
            let mut task = inner.tasks.collection_mut(found_in).remove(idx);
            task.apply_status(new_status, now);
            let event = StateChanged {
                id,
                name: task.name.clone(),
                old: old_status,
                new: new_status,
            };
            inner.tasks.collection_mut(new_status).push(task);

            if let Err(err) = self.persistence.save(&inner.tasks) {
                inner.tasks = snapshot;
                return Err(err);
            }
            log::info!(
                "task status changed: {} ({} -> {})",
                event.name,
                event.old.label(),
                event.new.label()
            );
            event
        };
        self.emit(std::slice::from_ref(&event));
        Ok(Some(event))
    }

    /// Mark a task as the current selection. Clears the processing flag on
    /// the previous selection and sets it on the new one; collections are
    /// not touched and nothing is persisted.
    pub fn set_active_task(&self, id: Option<Uuid>) -> Result<()> {
        let mut inner = self.lock();
        if let Some(id) = id {
            if inner.tasks.get(id).is_none() {
                return Err(Error::TaskNotFound(id));
            }
        }

        if let Some(prev) = inner.active_task {
            if let Some(task) = inner.tasks.get_mut(prev) {
                task.is_processing = false;
            }
        }
        if let Some(id) = id {
            if let Some(task) = inner.tasks.get_mut(id) {
                task.is_processing = true;
                log::debug!("active task set: {}", task.name);
            }
        } else {
            log::debug!("active task cleared");
        }
        inner.active_task = id;
        Ok(())
    }

    pub fn active_task(&self) -> Option<Uuid> {
        self.lock().active_task
    }

    /// Edit the user-facing fields of a task (validated, persisted)
    pub fn update_details(
        &self,
        id: Uuid,
        name: &str,
        memo: &str,
        estimated: Duration,
    ) -> Result<()> {
        validate_fields(name, memo, estimated)?;
        let mut inner = self.lock();
        let snapshot = inner.tasks.clone();

        let task = inner.tasks.get_mut(id).ok_or(Error::TaskNotFound(id))?;
        task.name = name.to_string();
        task.memo = memo.to_string();
        task.estimated = estimated;

        if let Err(err) = self.persistence.save(&inner.tasks) {
            inner.tasks = snapshot;
            return Err(err);
        }
        log::info!("task updated: {}", name);
        Ok(())
    }

    /// Remove a task from the live collections and persist. If the task is
    /// the running session's subject the timer is reset, since the accrual
    /// has nowhere to go.
    pub fn remove_task(&self, id: Uuid) -> Result<TaskRecord> {
        let mut inner = self.lock();
        let (found_in, idx) = inner.tasks.locate(id).ok_or(Error::TaskNotFound(id))?;

        let snapshot = inner.tasks.clone();
        let timer_snapshot = inner.timer.clone();
        let active_snapshot = inner.active_task;

        let task = inner.tasks.collection_mut(found_in).remove(idx);
        if inner.timer.active_task == Some(id) {
            log::warn!("removed task was the running session's subject; timer reset");
            inner.timer.reset();
        }
        if inner.active_task == Some(id) {
            inner.active_task = None;
        }

        if let Err(err) = self.persistence.save(&inner.tasks) {
            inner.tasks = snapshot;
            inner.timer = timer_snapshot;
            inner.active_task = active_snapshot;
            return Err(err);
        }
        log::info!("task removed: {}", task.name);
        Ok(task)
    }

    /// Demote every InProgress task untouched for longer than `threshold`
    /// to Pending. One lock acquisition and one save for the whole batch.
    /// The running session's subject is never demoted.
    pub fn demote_inactive(&self, threshold: Duration) -> Result<Vec<StateChanged>> {
        let now = self.clock.now();
        let events = {
            let mut inner = self.lock();
            let exempt = inner.timer.active_task;
            let stale: Vec<Uuid> = inner
                .tasks
                .in_progress
                .iter()
                .filter(|t| Some(t.id) != exempt && t.is_inactive(threshold, now))
                .map(|t| t.id)
                .collect();
            if stale.is_empty() {
                return Ok(Vec::new());
            }

            let snapshot = inner.tasks.clone();
            let mut events = Vec::with_capacity(stale.len());
            for id in stale {
                if let Some(idx) = inner.tasks.in_progress.iter().position(|t| t.id == id) {
                    let mut task = inner.tasks.in_progress.remove(idx);
                    task.apply_status(TaskStatus::Pending, now);
                    events.push(StateChanged {
                        id,
                        name: task.name.clone(),
                        old: TaskStatus::InProgress,
                        new: TaskStatus::Pending,
                    });
                    inner.tasks.pending.push(task);
                }
            }

            if let Err(err) = self.persistence.save(&inner.tasks) {
                inner.tasks = snapshot;
                return Err(err);
            }
            events
        };
        self.emit(&events);
        Ok(events)
    }

    /// Move every Completed task finished on or before `cutoff` into the
    /// dated archive document, then persist the live collections. Returns
    /// how many tasks were archived.
    pub fn archive_completed_through(&self, cutoff: NaiveDate) -> Result<usize> {
        let mut inner = self.lock();
        let eligible: Vec<TaskRecord> = inner
            .tasks
            .completed
            .iter()
            .filter(|t| t.completed_on().is_some_and(|d| d <= cutoff))
            .cloned()
            .collect();
        if eligible.is_empty() {
            return Ok(0);
        }

        // Archive first, the way backups are taken before a destructive
        // step; the archive append is idempotent per task id.
        self.persistence.append_archive(cutoff, &eligible)?;

        let snapshot = inner.tasks.clone();
        inner
            .tasks
            .completed
            .retain(|t| !t.completed_on().is_some_and(|d| d <= cutoff));

        if let Err(err) = self.persistence.save(&inner.tasks) {
            inner.tasks = snapshot;
            return Err(err);
        }
        log::info!("archived {} completed task(s) through {}", eligible.len(), cutoff);
        Ok(eligible.len())
    }

    /// Committed elapsed time of a task plus, if it is the running
    /// session's subject, the live span since the session started. The
    /// `None` query reads the implicit "Other" bucket of the running
    /// session (zero while idle).
    pub fn tracked_elapsed(&self, queried: Option<Uuid>, now: DateTime<Local>) -> Duration {
        let inner = self.lock();
        let committed = queried
            .and_then(|id| inner.tasks.get(id))
            .map(|t| t.elapsed)
            .unwrap_or_else(Duration::zero);

        if inner.timer.running && inner.timer.active_task == queried {
            let run = inner
                .timer
                .started_at
                .map(|started| now.signed_duration_since(started))
                .unwrap_or_else(Duration::zero);
            committed + run.max(Duration::zero())
        } else {
            committed
        }
    }

    /// Snapshot of a task by id
    pub fn get(&self, id: Uuid) -> Option<TaskRecord> {
        self.lock().tasks.get(id).cloned()
    }

    /// Snapshot of one collection
    pub fn tasks(&self, status: TaskStatus) -> Vec<TaskRecord> {
        self.lock().tasks.collection(status).to_vec()
    }

    /// Snapshot of all collections
    pub fn snapshot(&self) -> TaskCollections {
        self.lock().tasks.clone()
    }
}
