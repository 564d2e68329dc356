use thiserror::Error;
use uuid::Uuid;

use crate::domain::TaskStatus;

/// Errors surfaced by the engine.
///
/// Domain variants carry a user-facing message and are returned only after
/// the triggering mutation has been rolled back. `Persistence` wraps I/O
/// failures with their underlying cause; callers log it and keep running,
/// since the in-memory collections stay authoritative after a failed save.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no task matches id {0}")]
    TaskNotFound(Uuid),

    #[error("task \"{name}\" is missing from the {status:?} collection")]
    TaskNotInCollection { name: String, status: TaskStatus },

    #[error("{0}")]
    InvalidState(String),

    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{message}")]
    Persistence {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    pub fn persistence(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Persistence {
            message: message.into(),
            source,
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// True for errors a user can act on (as opposed to system failures).
    pub fn is_domain(&self) -> bool {
        !matches!(self, Self::Persistence { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_classification() {
        let err = Error::validation("name", "task name is required");
        assert!(err.is_domain());

        let err = Error::persistence("saving tasks failed", anyhow::anyhow!("disk full"));
        assert!(!err.is_domain());
    }

    #[test]
    fn test_persistence_error_carries_cause() {
        let err = Error::persistence("saving tasks failed", anyhow::anyhow!("disk full"));
        assert_eq!(err.to_string(), "saving tasks failed");
        let source = std::error::Error::source(&err).expect("cause attached");
        assert_eq!(source.to_string(), "disk full");
    }
}
