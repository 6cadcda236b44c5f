//! Mock runners for testing.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::runner::Runner;

/// Counts invocations of the runners it hands out.
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    calls: Arc<AtomicUsize>,
}

impl CallCounter {
    /// Creates a new counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of recorded calls.
    #[must_use]
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Records one call.
    pub fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    /// A synchronous runner that records a call and passes its input through.
    #[must_use]
    pub fn runner(&self) -> Runner {
        let counter = self.clone();
        Runner::sync(move |value| {
            counter.hit();
            Ok(value)
        })
    }

    /// A resolver runner that records a call, then resolves with its input
    /// after `delay`.
    #[must_use]
    pub fn delayed_runner(&self, delay: Duration) -> Runner {
        let counter = self.clone();
        Runner::resolver(move |value, resolver| {
            counter.hit();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                resolver.resolve(value);
            });
        })
    }

    /// Resets the count.
    pub fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

/// Records labels in the order they happen.
#[derive(Debug, Clone, Default)]
pub struct OrderRecorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl OrderRecorder {
    /// Creates a new recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `label`.
    pub fn record(&self, label: impl Into<String>) {
        self.events.lock().push(label.into());
    }

    /// Returns the recorded labels.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// A synchronous runner that records `label` and returns `output`.
    #[must_use]
    pub fn runner(&self, label: &str, output: Value) -> Runner {
        let recorder = self.clone();
        let label = label.to_string();
        Runner::sync(move |_| {
            recorder.record(label.clone());
            Ok(output.clone())
        })
    }
}

/// A resolver runner that resolves with `output` after `delay`.
#[must_use]
pub fn delayed(delay: Duration, output: Value) -> Runner {
    Runner::resolver(move |_, resolver| {
        let output = output.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            resolver.resolve(output);
        });
    })
}

/// A future runner that resolves with its input after `delay`.
#[must_use]
pub fn delayed_future(delay: Duration) -> Runner {
    Runner::future(move |value| async move {
        tokio::time::sleep(delay).await;
        Ok(value)
    })
}

/// A runner that always fails with `message`.
#[must_use]
pub fn failing(message: &str) -> Runner {
    let message = message.to_string();
    Runner::sync(move |_| Err(anyhow::anyhow!(message.clone())))
}
