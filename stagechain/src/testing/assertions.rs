//! Test assertions for chain results.

use crate::errors::{ErrorKind, StageResult};
use serde_json::Value;

/// Asserts that the run succeeded with `expected`.
pub fn assert_succeeded_with(result: &StageResult, expected: &Value) {
    match result {
        Ok(value) => assert_eq!(
            value, expected,
            "Expected output {expected:?}, got {value:?}"
        ),
        Err(err) => panic!("Expected success with {expected:?}, got error: {err}"),
    }
}

/// Asserts that the run was stopped.
pub fn assert_stopped(result: &StageResult) {
    assert_kind(result, ErrorKind::Stopped);
}

/// Asserts that the run was rejected because the stage is disposed.
pub fn assert_disposed(result: &StageResult) {
    assert_kind(result, ErrorKind::Disposed);
}

/// Asserts that a runner failed with a message containing `needle`.
pub fn assert_runner_failure(result: &StageResult, needle: &str) {
    assert_kind(result, ErrorKind::RunnerFailure);
    let message = result
        .as_ref()
        .err()
        .and_then(|err| err.runner_error())
        .map(ToString::to_string)
        .unwrap_or_default();
    assert!(
        message.contains(needle),
        "Expected runner failure containing '{needle}', got '{message}'"
    );
}

fn assert_kind(result: &StageResult, expected: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {expected} error, got success: {value:?}"),
        Err(err) => assert_eq!(
            err.kind(),
            expected,
            "Expected {expected} error, got: {err}"
        ),
    }
}
