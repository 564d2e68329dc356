pub mod enums;
pub mod task;
pub mod validate;

pub use enums::{TaskPriority, TaskStatus};
pub use task::{format_duration, format_hms, TaskRecord};
