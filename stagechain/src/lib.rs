//! # Stagechain
//!
//! Cancellable, chainable asynchronous pipelines built from linked stages.
//!
//! A chain is a linked list of [`Stage`](pipeline::Stage)s. Each stage holds
//! at most one unit of work: a callback, a nested chain, or a group of runners
//! executed concurrently. Starting the terminal stage runs the whole chain
//! from the root, feeding each stage's output to the next. Chains support:
//!
//! - **Mixed sync and async runners**: synchronous work finishes before
//!   `start` returns; the chain suspends at the first asynchronous runner
//! - **Stop and restart**: a stop marks the chain immediately and waits for
//!   in-flight work to settle
//! - **Disposal**: a disposed stage rejects every later start
//! - **Nested and grouped chains**: stops cascade into nested stages
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagechain::prelude::*;
//! use serde_json::json;
//!
//! let chain = Stage::new()
//!     .then(Runner::sync(|_| Ok(json!(5))))
//!     .then(Runner::future(|v| async move {
//!         Ok(json!(v.as_i64().unwrap_or_default() + 5))
//!     }));
//!
//! let value = chain.start(json!(null)).await?;
//! assert_eq!(value, json!(10));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod runner;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{StageOptions, StageState};
    pub use crate::errors::{ErrorKind, StageError, StageResult};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Completion, Stage};
    pub use crate::runner::{Outcome, Resolver, Runner};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_prelude_builds_a_chain() {
        let chain = Stage::new()
            .then(Runner::sync(|_| Ok(json!(5))))
            .then(Runner::future(|v| async move {
                Ok(json!(v.as_i64().unwrap_or_default() + 5))
            }));

        assert_eq!(chain.start(json!(null)).await.unwrap(), json!(10));
        assert_eq!(chain.state(), StageState::Idle);
    }
}
