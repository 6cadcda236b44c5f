//! Deferred results for stage operations.

use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;

/// The deferred result of `start`, `stop`, `restart` or `dispose`.
///
/// Cloneable; every clone settles with the same value. Work already driven
/// by a completion keeps progressing on the current tokio runtime even if
/// every handle is dropped. Without a runtime, awaiting a handle drives it.
#[must_use = "a completion reports the outcome of the operation"]
pub struct Completion<T: Clone> {
    shared: Shared<BoxFuture<'static, T>>,
}

impl<T> Completion<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wraps `fut` without polling it.
    pub(crate) fn lazy<F>(fut: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            shared: fut.boxed().shared(),
        }
    }

    /// An already settled completion.
    pub(crate) fn ready(value: T) -> Self {
        Self::lazy(future::ready(value)).driven()
    }

    /// Polls once in place so synchronous work finishes before returning,
    /// then hands anything still pending to a driver task.
    pub(crate) fn driven(self) -> Self {
        if self.shared.clone().now_or_never().is_none() {
            if let Ok(handle) = Handle::try_current() {
                handle.spawn(self.shared.clone());
            }
        }
        self
    }

    /// Returns true once the operation has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.shared.peek().is_some()
    }

    /// Returns the settled value without waiting.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.shared.peek()
    }
}

impl<T: Clone> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone> Future for Completion<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        self.shared.poll_unpin(cx)
    }
}

impl<T: Clone> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("settled", &self.shared.peek().is_some())
            .finish()
    }
}
