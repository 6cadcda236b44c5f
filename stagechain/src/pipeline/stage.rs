//! The stage node: chain construction and lifecycle.

use super::Completion;
use crate::core::{StageOptions, StageState, StateCell};
use crate::errors::StageResult;
use crate::runner::{Runner, Work};
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};
use uuid::Uuid;

/// One node of a chain.
///
/// `Stage` is a cheap handle; clones refer to the same node. A child keeps
/// its parent alive, while a parent only holds a weak link to its child, so
/// holding the terminal stage keeps the whole chain alive.
#[derive(Clone)]
pub struct Stage {
    pub(super) inner: Arc<StageInner>,
}

pub(super) struct StageInner {
    id: Uuid,
    options: StageOptions,
    pub(super) state: StateCell,
    parent: Option<Stage>,
    child: Mutex<Weak<StageInner>>,
    work: Mutex<Work>,
    /// The most recent run of this stage.
    pub(super) in_flight: Mutex<Option<Completion<StageResult>>>,
}

impl Stage {
    /// Creates a root stage with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(StageOptions::default())
    }

    /// Creates a root stage.
    #[must_use]
    pub fn with_options(options: StageOptions) -> Self {
        Self::build(options, None)
    }

    fn build(options: StageOptions, parent: Option<Self>) -> Self {
        Self {
            inner: Arc::new(StageInner {
                id: Uuid::new_v4(),
                options,
                state: StateCell::default(),
                parent,
                child: Mutex::new(Weak::new()),
                work: Mutex::new(Work::Empty),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Returns the stage id used in log events.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StageState {
        self.inner.state.load()
    }

    /// Returns the options shared along this chain.
    #[must_use]
    pub fn options(&self) -> StageOptions {
        self.inner.options
    }

    /// Returns the stage this one was chained from.
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.inner.parent.as_ref()
    }

    /// Returns the child created by the latest `then`/`all`, if still alive.
    #[must_use]
    pub fn child(&self) -> Option<Self> {
        self.inner.child.lock().upgrade().map(|inner| Self { inner })
    }

    /// Registers `runner` as this stage's work and returns a new child.
    ///
    /// The runner receives this stage's upstream value. Calling `then` or
    /// `all` again replaces the runner and the child.
    pub fn then(&self, runner: impl Into<Runner>) -> Self {
        self.register(Work::Single(runner.into()))
    }

    /// Registers a group of runners executed concurrently and returns a new
    /// child.
    ///
    /// Every member receives the same upstream value. The group succeeds once
    /// all members settle without a rejection, passing the upstream value on.
    pub fn all<I>(&self, runners: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Runner>,
    {
        self.register(Work::All(runners.into_iter().map(Into::into).collect()))
    }

    fn register(&self, work: Work) -> Self {
        let child = Self::build(self.inner.options, Some(self.clone()));
        let replaced = std::mem::replace(&mut *self.inner.work.lock(), work);
        *self.inner.child.lock() = Arc::downgrade(&child.inner);
        trace!(stage = %self.id(), child = %child.id(), "work registered");
        drop(replaced);
        child
    }

    pub(super) fn work(&self) -> Work {
        self.inner.work.lock().clone()
    }

    /// Returns the stages from the root down to this one.
    pub(super) fn lineage(&self) -> Vec<Self> {
        let mut lineage = vec![self.clone()];
        let mut cursor = self.parent();
        while let Some(stage) = cursor {
            lineage.push(stage.clone());
            cursor = stage.parent();
        }
        lineage.reverse();
        lineage
    }

    /// Stops this stage, its ancestors and any nested stages.
    ///
    /// The stage is marked stopped immediately, so in-flight runs reject with
    /// [`StageError::Stopped`](crate::errors::StageError::Stopped) at their
    /// next check. The completion settles once the most recent run of every
    /// stopped stage and every nested stop have settled, leaving the stages
    /// `Idle`. Never fails.
    pub fn stop(&self) -> Completion<()> {
        let lineage = self.lineage();
        let mut in_flight = Vec::new();
        let mut nested = Vec::new();

        for stage in lineage.iter().rev() {
            stage.inner.state.request_stop();
            trace!(stage = %stage.id(), "stop marker set");
            nested.extend(stage.work().nested_stages().iter().map(Self::stop));
            in_flight.extend(stage.inner.in_flight.lock().clone());
        }
        debug!(stage = %self.id(), stages = lineage.len(), "stop requested");

        let id = self.id();
        Completion::lazy(async move {
            for err in join_all(in_flight).await.into_iter().filter_map(Result::err) {
                trace!(stage = %id, %err, "in-flight run settled with error");
            }
            join_all(nested).await;
            for stage in &lineage {
                stage.inner.state.settle_idle();
            }
            debug!(stage = %id, "stop settled");
        })
        .driven()
    }

    /// Stops the parent chain, then starts this stage again.
    ///
    /// The start happens whatever the stop outcome. A root stage has no
    /// parent and is simply started.
    pub fn restart(&self, input: Value) -> Completion<StageResult> {
        debug!(stage = %self.id(), "restart requested");

        let parent_stop = self.parent().map(Self::stop);
        let stage = self.clone();

        Completion::lazy(async move {
            if let Some(stop) = parent_stop {
                stop.await;
            }
            stage.start(input).await
        })
        .driven()
    }

    /// Stops the stage, then disposes it for good.
    ///
    /// Disposing twice is a no-op.
    pub fn dispose(&self) -> Completion<()> {
        if self.state() == StageState::Disposed {
            return Completion::ready(());
        }
        debug!(stage = %self.id(), "dispose requested");

        let stop = self.stop();
        let stage = self.clone();

        Completion::lazy(async move {
            stop.await;
            stage.inner.state.dispose();
            debug!(stage = %stage.id(), "disposed");
        })
        .driven()
    }
}

impl Drop for StageInner {
    // Unlinks the parent chain iteratively so dropping a long chain does not
    // recurse once per stage.
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(stage) = parent {
            parent = match Arc::try_unwrap(stage.inner) {
                Ok(mut inner) => inner.parent.take(),
                Err(_) => None,
            };
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("options", &self.options())
            .field("parent", &self.parent().map(Self::id))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_stage_is_idle_root() {
        let stage = Stage::new();

        assert_eq!(stage.state(), StageState::Idle);
        assert!(stage.parent().is_none());
        assert!(stage.child().is_none());
        assert!(!stage.options().auto_dispose);
    }

    #[test]
    fn test_then_links_parent_and_child() {
        let root = Stage::new();
        let child = root.then(Runner::sync(Ok));

        assert_eq!(child.parent().map(Stage::id), Some(root.id()));
        assert_eq!(root.child().map(|c| c.id()), Some(child.id()));
    }

    #[test]
    fn test_children_inherit_options() {
        let root = Stage::with_options(StageOptions::new().with_auto_dispose(true));
        let child = root.then(Runner::sync(Ok)).all([Runner::sync(Ok)]);

        assert!(child.options().auto_dispose);
    }

    #[test]
    fn test_rechaining_replaces_child() {
        let root = Stage::new();
        let first = root.then(Runner::sync(|_| Ok(json!(1))));
        let second = root.then(Runner::sync(|_| Ok(json!(2))));

        assert_ne!(first.id(), second.id());
        assert_eq!(root.child().map(|c| c.id()), Some(second.id()));
    }

    #[test]
    fn test_child_link_is_weak() {
        let root = Stage::new();
        drop(root.then(Runner::sync(Ok)));

        assert!(root.child().is_none());
    }

    #[test]
    fn test_terminal_keeps_chain_alive() {
        let terminal = Stage::new().then(Runner::sync(Ok)).then(Runner::sync(Ok));

        let parent = terminal.parent().unwrap();
        let root = parent.parent().unwrap();
        assert!(root.parent().is_none());
        assert_eq!(root.child().map(|c| c.id()), Some(parent.id()));
    }

    #[test]
    fn test_stop_idle_stage_settles_in_place() {
        let stage = Stage::new();
        let stopped = stage.stop();

        assert!(stopped.is_settled());
        assert_eq!(stage.state(), StageState::Idle);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let stage = Stage::new();

        futures::executor::block_on(stage.dispose());
        futures::executor::block_on(stage.dispose());

        assert_eq!(stage.state(), StageState::Disposed);
    }

    #[test]
    fn test_stop_does_not_revive_disposed() {
        let stage = Stage::new();
        futures::executor::block_on(stage.dispose());

        futures::executor::block_on(stage.stop());

        assert_eq!(stage.state(), StageState::Disposed);
    }

    #[test]
    fn test_lineage_runs_root_first() {
        let root = Stage::new();
        let middle = root.then(Runner::sync(Ok));
        let terminal = middle.then(Runner::sync(Ok));

        let ids: Vec<_> = terminal.lineage().iter().map(Stage::id).collect();
        assert_eq!(ids, vec![root.id(), middle.id(), terminal.id()]);
    }

    #[test]
    fn test_dropping_long_chain() {
        let mut chain = Stage::new();
        for _ in 0..100_000 {
            chain = chain.then(Runner::sync(Ok));
        }
        drop(chain);
    }

    #[test]
    fn test_debug_output() {
        let stage = Stage::new();
        let rendered = format!("{stage:?}");

        assert!(rendered.contains("Stage"));
        assert!(rendered.contains("Idle"));
    }
}
