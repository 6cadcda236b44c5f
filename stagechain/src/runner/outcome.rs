//! What a runner callback hands back, and how each form settles.

use crate::errors::{StageError, StageResult};
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use tokio::sync::oneshot;

/// Setup callback for a resolver-style outcome.
pub type ResolverSetup = Box<dyn FnOnce(Resolver) + Send>;

/// The value returned by a runner callback.
///
/// A callback may finish immediately, hand back a future, or hand back a
/// setup function that receives a [`Resolver`] and settles it later (for
/// example from a timer task).
pub enum Outcome {
    /// Settled synchronously.
    Ready(StageResult),
    /// Settles when the future completes.
    Pending(BoxFuture<'static, StageResult>),
    /// Settles when the resolver is resolved or rejected.
    Deferred(ResolverSetup),
}

impl Outcome {
    /// A successful, synchronous outcome.
    #[must_use]
    pub fn value(value: Value) -> Self {
        Self::Ready(Ok(value))
    }

    /// A failed, synchronous outcome.
    #[must_use]
    pub fn error(err: impl Into<anyhow::Error>) -> Self {
        Self::Ready(Err(StageError::runner(err)))
    }

    /// An outcome settled by a future.
    pub fn future<Fut>(fut: Fut) -> Self
    where
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Pending(fut.map(|result| result.map_err(StageError::from)).boxed())
    }

    /// An outcome settled through a [`Resolver`].
    pub fn resolver<F>(setup: F) -> Self
    where
        F: FnOnce(Resolver) + Send + 'static,
    {
        Self::Deferred(Box::new(setup))
    }

    /// Normalizes the outcome into a single asynchronous settlement.
    ///
    /// A resolver setup runs immediately, before this returns.
    pub fn into_settlement(self) -> BoxFuture<'static, StageResult> {
        match self {
            Self::Ready(result) => future::ready(result).boxed(),
            Self::Pending(fut) => fut,
            Self::Deferred(setup) => {
                let (resolver, settled) = Resolver::channel();
                setup(resolver);
                settled
                    .map(|received| {
                        received.unwrap_or_else(|_| {
                            Err(StageError::runner(anyhow::anyhow!(
                                "resolver dropped without settling"
                            )))
                        })
                    })
                    .boxed()
            }
        }
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Self::value(value)
    }
}

impl From<anyhow::Result<Value>> for Outcome {
    fn from(result: anyhow::Result<Value>) -> Self {
        Self::Ready(result.map_err(StageError::from))
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// One-shot settle handle passed to resolver-style runners.
///
/// Consumed by `resolve` or `reject`, so it settles at most once. Dropping
/// it unsettled rejects the run.
#[derive(Debug)]
pub struct Resolver {
    tx: oneshot::Sender<StageResult>,
}

impl Resolver {
    fn channel() -> (Self, oneshot::Receiver<StageResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Settles successfully with `value`.
    pub fn resolve(self, value: Value) {
        // The run may already have been dropped; nothing is waiting then.
        let _ = self.tx.send(Ok(value));
    }

    /// Settles with a runner failure.
    pub fn reject(self, err: impl Into<anyhow::Error>) {
        let _ = self.tx.send(Err(StageError::runner(err)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ready_settles() {
        let settled = Outcome::value(json!(1)).into_settlement().await;
        assert_eq!(settled.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_error_settles_as_runner_failure() {
        let settled = Outcome::error(anyhow::anyhow!("bad input"))
            .into_settlement()
            .await;

        let err = settled.unwrap_err();
        assert_eq!(err.runner_error().unwrap().to_string(), "bad input");
    }

    #[tokio::test]
    async fn test_future_settles() {
        let outcome = Outcome::future(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(json!("late"))
        });

        assert_eq!(outcome.into_settlement().await.unwrap(), json!("late"));
    }

    #[tokio::test]
    async fn test_resolver_from_timer() {
        let outcome = Outcome::resolver(|resolver| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                resolver.resolve(json!(7));
            });
        });

        assert_eq!(outcome.into_settlement().await.unwrap(), json!(7));
    }

    #[tokio::test]
    async fn test_resolver_reject() {
        let outcome = Outcome::resolver(|resolver| resolver.reject(anyhow::anyhow!("nope")));

        let err = outcome.into_settlement().await.unwrap_err();
        assert!(!err.is_stopped());
        assert_eq!(err.runner_error().unwrap().to_string(), "nope");
    }

    #[tokio::test]
    async fn test_dropped_resolver_rejects() {
        let outcome = Outcome::resolver(drop);

        let err = outcome.into_settlement().await.unwrap_err();
        assert!(err.to_string().contains("resolver dropped"));
    }

    #[test]
    fn test_resolver_setup_runs_eagerly() {
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = ran.clone();

        let _settlement = Outcome::resolver(move |resolver| {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            resolver.resolve(Value::Null);
        })
        .into_settlement();

        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}
