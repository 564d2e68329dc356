use crate::settings::SettingsStore;
use crate::store::TaskStore;
use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Delivery boundary for reminders. Fire-and-forget; failures are the
/// implementation's problem, never the scheduler's.
pub trait Notifier: Send + Sync {
    fn show(&self, title: &str, body: &str);
    fn clear_pending(&self);
}

/// Desktop notification delivery.
/// Currently only implements macOS notifications.
#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn show(&self, title: &str, body: &str) {
        #[cfg(target_os = "macos")]
        {
            let script = format!(
                r#"display notification "{}" with title "{}""#,
                body.replace('"', "\\\""),
                title.replace('"', "\\\"")
            );

            let _ = std::process::Command::new("osascript")
                .arg("-e")
                .arg(&script)
                .output();
        }

        #[cfg(not(target_os = "macos"))]
        {
            // No-op on other platforms
            let _ = (title, body);
        }
    }

    fn clear_pending(&self) {}
}

/// A reminder armed for the running session's subject
#[derive(Debug, Clone)]
struct PendingReminder {
    task: Uuid,
    task_name: String,
    due_at: DateTime<Local>,
    interval_min: u32,
}

/// Decides when a reminder for the active session should fire.
///
/// At most one reminder is pending at a time: arming replaces the previous
/// one, stopping the session cancels it. Delivery is cooperative; `poll`
/// runs on the caller's cadence and fires a reminder once it is due.
pub struct NotificationScheduler {
    store: Arc<TaskStore>,
    settings: Arc<SettingsStore>,
    notifier: Arc<dyn Notifier>,
    pending: Mutex<Option<PendingReminder>>,
}

impl NotificationScheduler {
    pub fn new(
        store: Arc<TaskStore>,
        settings: Arc<SettingsStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            settings,
            notifier,
            pending: Mutex::new(None),
        }
    }

    /// Arm a reminder for `now + notification interval`, replacing any
    /// previous one. Does nothing while notifications are disabled.
    pub fn arm(&self, task: Uuid, task_name: &str, now: DateTime<Local>) {
        let settings = self.settings.snapshot();
        if !settings.notifications_enabled {
            return;
        }

        let reminder = PendingReminder {
            task,
            task_name: task_name.to_string(),
            due_at: now + settings.notification_interval(),
            interval_min: settings.notification_interval_min,
        };
        log::debug!(
            "reminder armed for \"{}\" at {}",
            reminder.task_name,
            reminder.due_at.format("%H:%M:%S")
        );
        *self.pending.lock().unwrap() = Some(reminder);
    }

    /// Drop the pending reminder, if any
    pub fn cancel(&self) {
        let had_pending = self.pending.lock().unwrap().take().is_some();
        if had_pending {
            log::debug!("pending reminder cancelled");
        }
        self.notifier.clear_pending();
    }

    /// Fire the pending reminder once it is due. The message names the
    /// task and the interval; when committed-plus-live time exceeds the
    /// estimate and overshoot reporting is on, the overshoot is appended
    /// in whole minutes.
    pub fn poll(&self, now: DateTime<Local>) {
        let due = {
            let mut pending = self.pending.lock().unwrap();
            match pending.as_ref() {
                Some(reminder) if reminder.due_at <= now => pending.take(),
                _ => None,
            }
        };
        let Some(reminder) = due else {
            return;
        };

        let settings = self.settings.snapshot();
        let Some(task) = self.store.get(reminder.task) else {
            log::debug!("reminder subject vanished, dropping");
            return;
        };

        let mut body = format!(
            "{} minutes since the session started.",
            reminder.interval_min
        );
        if settings.estimate_overshoot_enabled {
            let live = self.store.tracked_elapsed(Some(reminder.task), now);
            if live > task.estimated {
                let over = (live - task.estimated).num_minutes();
                body.push_str(&format!(" Estimate exceeded by {} minutes.", over));
            }
        }

        log::info!("reminder fired: {}", reminder.task_name);
        self.notifier.show(&format!("Task: {}", reminder.task_name), &body);
    }

    /// Whether a reminder is currently armed
    pub fn has_pending(&self) -> bool {
        self.pending.lock().unwrap().is_some()
    }
}
