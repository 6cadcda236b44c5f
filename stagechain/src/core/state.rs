//! Stage lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// The lifecycle state of a stage.
///
/// `Stopped` is a transient marker observed by in-flight runs; a settled
/// `stop()` always leaves the stage `Idle`. `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum StageState {
    /// Not running; may be started.
    #[default]
    Idle = 0,
    /// The stage's execution protocol is active.
    Running = 1,
    /// A stop was requested while work may still be in flight.
    Stopped = 2,
    /// The stage rejects every further start.
    Disposed = 3,
}

impl StageState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stopped,
            _ => Self::Disposed,
        }
    }

    /// Returns true if the state is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Returns true if the stage currently accepts a start.
    #[must_use]
    pub const fn is_startable(&self) -> bool {
        !matches!(self, Self::Disposed)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Disposed => write!(f, "DISPOSED"),
        }
    }
}

/// Atomic holder for a [`StageState`] with guarded transitions.
///
/// No transition ever leaves `Disposed`.
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn load(&self) -> StageState {
        StageState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Applies `f` atomically; returns true if the state changed.
    fn transition(&self, f: impl Fn(StageState) -> Option<StageState>) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| {
                f(StageState::from_u8(raw)).map(|next| next as u8)
            })
            .is_ok()
    }

    /// `Idle -> Running`. A stopped or disposed stage keeps its state.
    pub(crate) fn begin_run(&self) -> bool {
        self.transition(|s| (s == StageState::Idle).then_some(StageState::Running))
    }

    /// Marks a stop request.
    pub(crate) fn request_stop(&self) -> bool {
        self.transition(|s| (s != StageState::Disposed).then_some(StageState::Stopped))
    }

    /// Returns to `Idle` once a stop has quiesced.
    pub(crate) fn settle_idle(&self) -> bool {
        self.transition(|s| (s != StageState::Disposed).then_some(StageState::Idle))
    }

    /// Records the end of a run. Only a live run (`Running` or `Idle`) moves;
    /// a pending stop or a disposal is left untouched.
    pub(crate) fn finish_run(&self, next: StageState) -> bool {
        self.transition(|s| {
            matches!(s, StageState::Running | StageState::Idle).then_some(next)
        })
    }

    pub(crate) fn dispose(&self) {
        self.0.store(StageState::Disposed as u8, Ordering::SeqCst);
    }
}
