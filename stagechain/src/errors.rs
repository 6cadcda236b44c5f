//! Error types for stage execution.
//!
//! A started chain reports failure through exactly three kinds: the stage was
//! disposed, the run was stopped, or a user runner failed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result of running a stage chain.
pub type StageResult = Result<serde_json::Value, StageError>;

/// The error raised by [`Stage::start`](crate::pipeline::Stage::start) and
/// [`Stage::restart`](crate::pipeline::Stage::restart).
///
/// Cloneable so that every waiter on a shared run observes the same failure.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// `start()` was called on a disposed stage.
    #[error("stage is disposed")]
    Disposed,

    /// The run was stopped before it could complete.
    #[error("stage was stopped")]
    Stopped,

    /// A user-supplied runner failed; the original error is preserved.
    #[error("runner failed: {0}")]
    Runner(Arc<anyhow::Error>),
}

impl StageError {
    /// Wraps a runner error.
    #[must_use]
    pub fn runner(err: impl Into<anyhow::Error>) -> Self {
        Self::Runner(Arc::new(err.into()))
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Disposed => ErrorKind::Disposed,
            Self::Stopped => ErrorKind::Stopped,
            Self::Runner(_) => ErrorKind::RunnerFailure,
        }
    }

    /// Returns true if the run was stopped.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if the stage was disposed.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Returns the underlying runner error, if any.
    #[must_use]
    pub fn runner_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Runner(err) => Some(err),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for StageError {
    fn from(err: anyhow::Error) -> Self {
        Self::Runner(Arc::new(err))
    }
}

/// Classification of a [`StageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The stage was disposed.
    Disposed,
    /// The run was stopped.
    Stopped,
    /// A runner returned an error.
    RunnerFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disposed => write!(f, "disposed"),
            Self::Stopped => write!(f, "stopped"),
            Self::RunnerFailure => write!(f, "runner_failure"),
        }
    }
}
