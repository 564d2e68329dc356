use chrono::{DateTime, Duration, Local};

/// Display tick interval in milliseconds
pub const DISPLAY_TICK_MS: u64 = 100;

/// Seconds between reset-boundary sweeps
pub const RESET_SWEEP_SECS: i64 = 60;

/// Seconds between inactivity sweeps
pub const INACTIVITY_SWEEP_SECS: i64 = 3600;

/// Get the display tick duration
pub fn display_tick() -> std::time::Duration {
    std::time::Duration::from_millis(DISPLAY_TICK_MS)
}

/// Cooperative cadence bookkeeping: `due` answers whether enough time has
/// passed since the last run and stamps the run when it has. The first
/// call is always due. No threads, no timers; any loop can drive it.
#[derive(Debug)]
pub struct Cadence {
    every: Duration,
    last: Option<DateTime<Local>>,
}

impl Cadence {
    pub fn new(every: Duration) -> Self {
        Self { every, last: None }
    }

    pub fn due(&mut self, now: DateTime<Local>) -> bool {
        let is_due = self
            .last
            .map_or(true, |last| now.signed_duration_since(last) >= self.every);
        if is_due {
            self.last = Some(now);
        }
        is_due
    }
}
