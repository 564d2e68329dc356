use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;

use crate::persistence::{atomic_write, read_file};

fn default_true() -> bool {
    true
}

fn default_reset_time() -> NaiveTime {
    NaiveTime::MIN
}

fn default_notification_interval() -> u32 {
    30
}

/// Application settings, stored as a single JSON document.
///
/// Loaded once at startup and mutated only through `SettingsStore`, which
/// persists on every update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Time of day after which the previous day's completed tasks become
    /// eligible for archiving (default midnight)
    #[serde(default = "default_reset_time")]
    pub reset_time: NaiveTime,
    /// When the archive sweep last ran
    #[serde(default)]
    pub last_reset_time: Option<DateTime<Local>>,
    /// Archive completed tasks at the reset boundary
    #[serde(default = "default_true")]
    pub auto_archive_enabled: bool,
    /// Demote long-untouched in-progress tasks
    #[serde(default = "default_true")]
    pub inactive_tasks_enabled: bool,
    /// Arm reminders for the running session
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    /// Minutes after a session start before the reminder fires
    #[serde(default = "default_notification_interval")]
    pub notification_interval_min: u32,
    /// Report estimate overshoot in reminder messages
    #[serde(default = "default_true")]
    pub estimate_overshoot_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reset_time: default_reset_time(),
            last_reset_time: None,
            auto_archive_enabled: true,
            inactive_tasks_enabled: true,
            notifications_enabled: true,
            notification_interval_min: default_notification_interval(),
            estimate_overshoot_enabled: true,
        }
    }
}

impl Settings {
    /// Reminder interval as a duration
    pub fn notification_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.notification_interval_min))
    }

    /// True when the daily reset boundary has been crossed and not yet
    /// handled: the last reset was on an earlier date and the configured
    /// time of day has passed.
    pub fn needs_reset(&self, now: DateTime<Local>) -> bool {
        let today = now.date_naive();
        let last_reset_date = self.last_reset_time.map(|t| t.date_naive());
        let boundary = today.and_time(self.reset_time);

        last_reset_date.map_or(true, |date| date < today) && now.naive_local() >= boundary
    }

    /// The next time the reset boundary will be crossed
    pub fn next_reset_time(&self, now: DateTime<Local>) -> chrono::NaiveDateTime {
        let today_boundary = now.date_naive().and_time(self.reset_time);
        if now.naive_local() > today_boundary {
            today_boundary + Duration::days(1)
        } else {
            today_boundary
        }
    }
}

/// Cached settings with an explicit load/save lifecycle.
///
/// Reads go through `snapshot`; every mutation goes through `update`,
/// which persists before returning. An ephemeral store (no path) backs
/// tests and ad-hoc use.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<Settings>,
}

impl SettingsStore {
    /// Load settings from the given file, default-constructing and
    /// persisting them when the file is absent.
    pub fn open(path: PathBuf) -> Result<Self> {
        let content = read_file(&path)?;
        let data = if content.trim().is_empty() {
            let defaults = Settings::default();
            let json = serde_json::to_string_pretty(&defaults)
                .context("Failed to serialize settings")?;
            atomic_write(&path, &json)?;
            defaults
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse settings: {}", path.display()))?
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// In-memory store that never touches disk
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            data: RwLock::new(Settings::default()),
        }
    }

    pub fn snapshot(&self) -> Settings {
        self.data.read().unwrap().clone()
    }

    /// Mutate and persist in one step
    pub fn update(&self, apply: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        apply(&mut guard);
        self.persist(&guard)
    }

    /// Stamp the last reset time, ending the current day's reset window
    pub fn update_last_reset_time(&self, now: DateTime<Local>) -> Result<()> {
        self.update(|settings| settings.last_reset_time = Some(now))
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(data).context("Failed to serialize settings")?;
        atomic_write(path, &json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.reset_time, NaiveTime::MIN);
        assert!(settings.last_reset_time.is_none());
        assert!(settings.auto_archive_enabled);
        assert!(settings.inactive_tasks_enabled);
        assert!(settings.notifications_enabled);
        assert_eq!(settings.notification_interval_min, 30);
        assert!(settings.estimate_overshoot_enabled);
    }

    #[test]
    fn test_needs_reset_without_prior_reset() {
        let settings = Settings::default();
        let now = Local.with_ymd_and_hms(2024, 3, 1, 0, 5, 0).unwrap();
        assert!(settings.needs_reset(now));
    }

    #[test]
    fn test_needs_reset_respects_time_of_day() {
        let mut settings = Settings::default();
        settings.reset_time = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        settings.last_reset_time = Some(Local.with_ymd_and_hms(2024, 2, 29, 6, 1, 0).unwrap());

        // Next day, before the boundary
        let early = Local.with_ymd_and_hms(2024, 3, 1, 5, 59, 0).unwrap();
        assert!(!settings.needs_reset(early));

        // Next day, past the boundary
        let late = Local.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        assert!(settings.needs_reset(late));
    }

    #[test]
    fn test_needs_reset_false_after_update_same_day() {
        let store = SettingsStore::ephemeral();
        let now = Local.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        assert!(store.snapshot().needs_reset(now));

        store.update_last_reset_time(now).unwrap();
        assert!(!store.snapshot().needs_reset(now));
        assert!(!store
            .snapshot()
            .needs_reset(now + Duration::hours(10)));

        // The next calendar day crosses the boundary again
        assert!(store.snapshot().needs_reset(now + Duration::days(1)));
    }

    #[test]
    fn test_next_reset_time() {
        let mut settings = Settings::default();
        settings.reset_time = NaiveTime::from_hms_opt(6, 0, 0).unwrap();

        let before = Local.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap();
        assert_eq!(
            settings.next_reset_time(before),
            NaiveTime::from_hms_opt(6, 0, 0)
                .map(|t| before.date_naive().and_time(t))
                .unwrap()
        );

        let after = Local.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        assert_eq!(
            settings.next_reset_time(after),
            (after.date_naive() + Duration::days(1)).and_time(NaiveTime::from_hms_opt(6, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_open_creates_defaults_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::open(path.clone()).unwrap();
        assert!(path.exists());
        assert_eq!(store.snapshot().notification_interval_min, 30);

        store
            .update(|s| {
                s.notification_interval_min = 45;
                s.auto_archive_enabled = false;
            })
            .unwrap();

        let reloaded = SettingsStore::open(path).unwrap();
        assert_eq!(reloaded.snapshot().notification_interval_min, 45);
        assert!(!reloaded.snapshot().auto_archive_enabled);
    }
}
