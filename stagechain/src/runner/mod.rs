//! Runners: the units of work attached to a stage.
//!
//! A runner is either a callback or a nested stage chain. A stage holds no
//! runner, one runner, or an ordered group of runners executed concurrently.

mod outcome;

pub use outcome::{Outcome, Resolver, ResolverSetup};

use crate::errors::StageResult;
use crate::pipeline::Stage;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A runner callback.
pub type Callback = Arc<dyn Fn(Value) -> Outcome + Send + Sync>;

/// A unit of work attached to a stage.
#[derive(Clone)]
pub enum Runner {
    /// A callback invoked with the upstream value.
    Callback(Callback),
    /// A nested chain, started with the upstream value.
    Stage(Stage),
}

impl Runner {
    /// Creates a runner from a callback that chooses its [`Outcome`] per call.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Outcome + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// Creates a runner from a synchronous function.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::new(move |value| Outcome::from(f(value)))
    }

    /// Creates a runner from an async function.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::new(move |value| Outcome::future(f(value)))
    }

    /// Creates a runner that settles through a [`Resolver`].
    ///
    /// `f` runs synchronously; it typically hands the resolver to a spawned
    /// task or timer.
    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn(Value, Resolver) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |value| {
            let f = f.clone();
            Outcome::resolver(move |resolver| f(value, resolver))
        })
    }

    /// Invokes the runner and normalizes its result into one settlement.
    ///
    /// Callbacks run before this returns; a nested stage starts eagerly.
    pub(crate) fn invoke(&self, input: Value) -> BoxFuture<'static, StageResult> {
        match self {
            Self::Callback(f) => f(input).into_settlement(),
            Self::Stage(stage) => stage.start(input).boxed(),
        }
    }

    /// Returns the nested stage, if this runner is one.
    #[must_use]
    pub const fn as_stage(&self) -> Option<&Stage> {
        match self {
            Self::Stage(stage) => Some(stage),
            Self::Callback(_) => None,
        }
    }
}

impl From<Stage> for Runner {
    fn from(stage: Stage) -> Self {
        Self::Stage(stage)
    }
}

impl From<&Stage> for Runner {
    fn from(stage: &Stage) -> Self {
        Self::Stage(stage.clone())
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::Stage(stage) => f.debug_tuple("Stage").field(&stage.id()).finish(),
        }
    }
}

/// The work registered on a stage by its latest `then`/`all` call.
#[derive(Debug, Clone, Default)]
pub(crate) enum Work {
    /// Passes the upstream value through.
    #[default]
    Empty,
    /// A single runner.
    Single(Runner),
    /// A group run concurrently on the same input.
    All(Vec<Runner>),
}

impl Work {
    /// Nested stages reachable from this work, for stop cascades.
    pub(crate) fn nested_stages(&self) -> Vec<Stage> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(runner) => runner.as_stage().cloned().into_iter().collect(),
            Self::All(runners) => runners.iter().filter_map(Runner::as_stage).cloned().collect(),
        }
    }
}
