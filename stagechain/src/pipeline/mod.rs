//! Stage chains and their execution.
//!
//! This module provides:
//! - The `Stage` node with `then`/`all` chain construction
//! - The execution protocol behind `start`
//! - The stop/restart/dispose lifecycle with cascading cancellation
//! - `Completion`, the deferred result of every lifecycle operation

mod completion;
mod execution;
mod stage;

pub use completion::Completion;
pub use stage::Stage;
