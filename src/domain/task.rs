use super::enums::{TaskPriority, TaskStatus};
use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique ID, assigned at creation, never changed
    pub id: Uuid,
    /// Task name (validated, non-empty)
    pub name: String,
    /// Free-form memo
    #[serde(default)]
    pub memo: String,
    /// Estimated duration for completion
    #[serde(rename = "estimated_secs", with = "duration_secs")]
    pub estimated: Duration,
    /// Total committed working time
    #[serde(rename = "elapsed_secs", with = "duration_secs")]
    pub elapsed: Duration,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Priority bucket
    #[serde(default)]
    pub priority: TaskPriority,
    /// True exactly while this task is the running session's subject (not persisted)
    #[serde(skip)]
    pub is_processing: bool,
    /// When the task was created
    pub created_at: DateTime<Local>,
    /// Last status change or elapsed-time addition
    #[serde(default = "Local::now")]
    pub last_worked_at: DateTime<Local>,
    /// When the task entered Completed (cleared when it leaves)
    #[serde(default)]
    pub completed_at: Option<DateTime<Local>>,
}

impl TaskRecord {
    /// Create a new task. New tasks start in progress with zero elapsed time.
    pub fn new(
        name: impl Into<String>,
        memo: impl Into<String>,
        estimated: Duration,
        priority: TaskPriority,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            memo: memo.into(),
            estimated,
            elapsed: Duration::zero(),
            status: TaskStatus::InProgress,
            priority,
            is_processing: false,
            created_at: now,
            last_worked_at: now,
            completed_at: None,
        }
    }

    /// Apply a new status, stamping `last_worked_at` and maintaining
    /// `completed_at` (set on entering Completed, cleared on leaving it).
    pub fn apply_status(&mut self, status: TaskStatus, now: DateTime<Local>) {
        self.status = status;
        self.last_worked_at = now;
        self.completed_at = if status == TaskStatus::Completed {
            Some(now)
        } else {
            None
        };
    }

    /// Add committed working time (negative spans are ignored)
    pub fn add_elapsed(&mut self, delta: Duration, now: DateTime<Local>) {
        if delta > Duration::zero() {
            self.elapsed = self.elapsed + delta;
        }
        self.last_worked_at = now;
    }

    /// Append a line to the memo
    pub fn append_memo_line(&mut self, line: &str) {
        if !self.memo.is_empty() {
            self.memo.push('\n');
        }
        self.memo.push_str(line);
    }

    /// Check if the task has gone untouched for longer than `threshold`
    pub fn is_inactive(&self, threshold: Duration, now: DateTime<Local>) -> bool {
        now.signed_duration_since(self.last_worked_at) > threshold
    }

    /// Check if committed time has exceeded the estimate
    pub fn is_over_estimate(&self) -> bool {
        self.elapsed > self.estimated
    }

    /// Time past the estimate, if any
    pub fn overshoot(&self) -> Option<Duration> {
        if self.is_over_estimate() {
            Some(self.elapsed - self.estimated)
        } else {
            None
        }
    }

    /// Calendar day the task was completed on
    pub fn completed_on(&self) -> Option<NaiveDate> {
        self.completed_at.map(|at| at.date_naive())
    }

    /// Format elapsed time as "Xh Ym" for listings
    pub fn elapsed_formatted(&self) -> String {
        format_duration(self.elapsed)
    }

    /// Format the estimate as "Xh Ym" for listings
    pub fn estimate_formatted(&self) -> String {
        format_duration(self.estimated)
    }
}

/// Format a duration as "Xh Ym" (omits 0 values)
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes();
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours > 0 && minutes > 0 {
        format!("{}h {}m", hours, minutes)
    } else if hours > 0 {
        format!("{}h", hours)
    } else {
        format!("{}m", minutes)
    }
}

/// Format a duration as "H:MM:SS" for memo lines and log entries
pub fn format_hms(duration: Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

/// Durations persist as whole seconds
mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(secs))
    }
}
