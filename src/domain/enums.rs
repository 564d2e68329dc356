use serde::{Deserialize, Serialize};

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    InProgress,
    Pending,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::InProgress, Self::Pending, Self::Completed];

    /// Parse status from a tag like "IN_PROGRESS"
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_uppercase().as_str() {
            "IN_PROGRESS" | "INPROGRESS" => Some(Self::InProgress),
            "PENDING" => Some(Self::Pending),
            "COMPLETED" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Convert status to a stable tag
    pub fn to_tag(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
        }
    }

    /// Human-readable label for logs and the status listing
    pub fn label(&self) -> &'static str {
        match self {
            Self::InProgress => "in progress",
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// Check if a task in this status can be the subject of a timing session
    pub fn is_trackable(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

/// Priority assigned to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TaskPriority {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}
