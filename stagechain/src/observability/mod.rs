//! Observability utilities.
//!
//! Stage lifecycle events are emitted through `tracing`; this module sets up
//! subscribers for binaries and tests.

mod logging;

pub use logging::{init_test_tracing, init_tracing, LogFormat, DEFAULT_FILTER};
