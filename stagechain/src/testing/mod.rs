//! Testing utilities for stage chains.
//!
//! This module provides:
//! - Call counters and order recorders that hand out runners
//! - Delayed and failing runners
//! - Assertions for chain results

mod assertions;
mod mocks;

pub use assertions::{
    assert_disposed, assert_runner_failure, assert_stopped, assert_succeeded_with,
};
pub use mocks::{delayed, delayed_future, failing, CallCounter, OrderRecorder};
