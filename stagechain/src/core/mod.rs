//! Core domain model types for stagechain.
//!
//! This module contains the fundamental types shared by every stage:
//! - The four-state lifecycle enum and its atomic cell
//! - Stage options inherited along a chain

mod options;
mod state;

pub use options::StageOptions;
pub use state::StageState;
pub(crate) use state::StateCell;
