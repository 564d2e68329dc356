use crate::error::{Error, Result};
use chrono::Duration;

/// Maximum task name length in characters
pub const MAX_NAME_LEN: usize = 100;
/// Maximum memo length in characters
pub const MAX_MEMO_LEN: usize = 1000;
/// Maximum estimate in hours
pub const MAX_ESTIMATE_HOURS: i64 = 24;

pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("name", "task name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::validation(
            "name",
            format!("task name must be at most {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(())
}

pub fn validate_memo(memo: &str) -> Result<()> {
    if memo.chars().count() > MAX_MEMO_LEN {
        return Err(Error::validation(
            "memo",
            format!("memo must be at most {} characters", MAX_MEMO_LEN),
        ));
    }
    Ok(())
}

pub fn validate_estimate(estimated: Duration) -> Result<()> {
    if estimated < Duration::zero() {
        return Err(Error::validation("estimated", "estimate cannot be negative"));
    }
    if estimated > Duration::hours(MAX_ESTIMATE_HOURS) {
        return Err(Error::validation(
            "estimated",
            format!("estimate must be at most {} hours", MAX_ESTIMATE_HOURS),
        ));
    }
    Ok(())
}

/// Validate the user-editable fields of a task in one pass.
/// Returns the first violation.
pub fn validate_fields(name: &str, memo: &str, estimated: Duration) -> Result<()> {
    validate_name(name)?;
    validate_memo(memo)?;
    validate_estimate(estimated)?;
    Ok(())
}
