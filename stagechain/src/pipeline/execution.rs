//! The execution protocol behind [`Stage::start`].
//!
//! A run walks the lineage from the root down to the started stage, feeding
//! each stage's output into the next. Every stage on the way records the
//! completion of its own part of the run, so stopping an ancestor waits for
//! exactly that part. The stop marker is checked whenever a value becomes
//! available, so a stopped stage never hands a result downstream even if its
//! runner later succeeds.

use super::{Completion, Stage};
use crate::core::StageState;
use crate::errors::{StageError, StageResult};
use crate::runner::{Runner, Work};
use futures::future::{self, join_all, BoxFuture, Either, FutureExt};
use serde_json::Value;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, trace};

impl Stage {
    /// Runs the chain ending at this stage with `input` as the initial value.
    ///
    /// Synchronous runners complete before this returns; the chain suspends
    /// at the first asynchronous runner. The completion resolves with this
    /// stage's output, or rejects with
    /// [`Disposed`](StageError::Disposed), [`Stopped`](StageError::Stopped)
    /// or the first runner failure.
    pub fn start(&self, input: Value) -> Completion<StageResult> {
        if self.state() == StageState::Disposed {
            debug!(stage = %self.id(), "start rejected: stage is disposed");
            return Completion::ready(Err(StageError::Disposed));
        }
        debug!(stage = %self.id(), "starting chain");
        self.launch(input).driven()
    }

    /// Creates a run and records, on every stage of the lineage, the
    /// completion of that stage's part of it.
    fn launch(&self, input: Value) -> Completion<StageResult> {
        let lineage = self.lineage();
        let (senders, slots): (Vec<_>, Vec<_>) = lineage
            .iter()
            .skip(1)
            .map(|_| oneshot::channel())
            .unzip();

        let auto_dispose = self.options().auto_dispose;
        let run = Completion::lazy(execute(lineage.clone(), senders, input, auto_dispose));

        for (stage, slot) in lineage.iter().zip(slots) {
            stage.track(Completion::lazy(part_of(slot, run.clone())));
        }
        self.track(run.clone());
        run
    }

    fn track(&self, run: Completion<StageResult>) {
        let previous = self.inner.in_flight.lock().replace(run);
        drop(previous);
    }

    fn ensure_not_stopped(&self) -> Result<(), StageError> {
        if self.state() == StageState::Stopped {
            trace!(stage = %self.id(), "run observed stop marker");
            return Err(StageError::Stopped);
        }
        Ok(())
    }
}

/// Settles with an ancestor's share of a run, driving the run while waiting.
async fn part_of(
    slot: oneshot::Receiver<StageResult>,
    run: Completion<StageResult>,
) -> StageResult {
    let abandoned = |_| Err(StageError::Stopped);
    match future::select(slot, run).await {
        Either::Left((settled, _)) => settled.unwrap_or_else(abandoned),
        Either::Right((_, slot)) => slot.await.unwrap_or_else(abandoned),
    }
}

async fn execute(
    lineage: Vec<Stage>,
    senders: Vec<oneshot::Sender<StageResult>>,
    input: Value,
    auto_dispose: bool,
) -> StageResult {
    let started = Instant::now();
    for stage in &lineage {
        stage.inner.state.begin_run();
    }

    let terminal = lineage.len().saturating_sub(1);
    let mut senders = senders.into_iter();
    let mut carried: StageResult = Ok(input);

    for (depth, stage) in lineage.iter().enumerate() {
        carried = match carried {
            Ok(upstream) => step(stage, upstream).await,
            Err(err) => Err(err),
        };

        let next = if depth == terminal && auto_dispose && carried.is_ok() {
            StageState::Disposed
        } else {
            StageState::Idle
        };
        stage.inner.state.finish_run(next);

        if let Some(sender) = senders.next() {
            // Nobody may be waiting on this ancestor.
            let _ = sender.send(carried.clone());
        }
    }

    if let Some(stage) = lineage.last() {
        debug!(
            stage = %stage.id(),
            stages = lineage.len(),
            ok = carried.is_ok(),
            state = %stage.state(),
            elapsed = ?started.elapsed(),
            "run settled"
        );
    }
    carried
}

/// One stage's share of a run: stop check, dispatch, stop check.
async fn step(stage: &Stage, upstream: Value) -> StageResult {
    if stage.state() == StageState::Disposed {
        return Err(StageError::Disposed);
    }
    stage.ensure_not_stopped()?;

    let settled = dispatch(stage, stage.work(), upstream).await;
    stage.ensure_not_stopped()?;
    settled
}

/// Invokes the registered work. Callbacks run before this returns.
fn dispatch(stage: &Stage, work: Work, upstream: Value) -> BoxFuture<'static, StageResult> {
    match work {
        Work::Empty => future::ready(Ok(upstream)).boxed(),
        Work::Single(runner) => {
            trace!(stage = %stage.id(), ?runner, "dispatching runner");
            runner.invoke(upstream)
        }
        Work::All(runners) => {
            trace!(stage = %stage.id(), members = runners.len(), "dispatching group");
            settle_all(&runners, upstream)
        }
    }
}

/// Waits for every member to settle, then fails with the first rejection in
/// member order, or passes `upstream` on if none rejected.
fn settle_all(runners: &[Runner], upstream: Value) -> BoxFuture<'static, StageResult> {
    let members: Vec<_> = runners
        .iter()
        .map(|runner| runner.invoke(upstream.clone()))
        .collect();

    async move {
        let total = members.len();
        let rejections: Vec<StageError> = join_all(members)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        match rejections.into_iter().next() {
            None => Ok(upstream),
            Some(first) => {
                debug!(total, %first, "group settled with rejections");
                Err(first)
            }
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn increment() -> Runner {
        Runner::sync(|v| Ok(json!(v.as_i64().unwrap_or_default() + 1)))
    }

    #[tokio::test]
    async fn test_sync_chain_value() {
        let chain = Stage::new()
            .then(Runner::sync(|_| Ok(json!(5))))
            .then(Runner::sync(|v| Ok(json!(v.as_i64().unwrap_or_default() + 5))));

        assert_eq!(chain.start(Value::Null).await.unwrap(), json!(10));
    }

    #[tokio::test]
    async fn test_empty_root_passes_input_through() {
        let stage = Stage::new();
        assert_eq!(stage.start(json!("in")).await.unwrap(), json!("in"));
    }

    #[test]
    fn test_sync_chain_settles_without_runtime() {
        let chain = Stage::new().then(Runner::sync(|v| Ok(json!([v]))));
        let completion = chain.start(json!(1));

        assert_eq!(completion.peek().cloned().map(Result::unwrap), Some(json!([1])));
    }

    #[tokio::test]
    async fn test_long_sync_chain() {
        let mut chain = Stage::new();
        for _ in 0..10_000 {
            chain = chain.then(increment());
        }

        let started = chain.start(json!(0));
        assert!(started.is_settled());
        assert_eq!(started.await.unwrap(), json!(10_000));

        chain.stop().await;
        assert_eq!(chain.state(), StageState::Idle);
        drop(chain);
    }

    #[tokio::test]
    async fn test_ancestor_records_its_own_part() {
        let root = Stage::new();
        let chain = root.then(Runner::sync(|_| Ok(json!("root")))).then(increment());

        chain.start(Value::Null).await.unwrap();

        let part = root.inner.in_flight.lock().clone().unwrap();
        assert_eq!(part.await.unwrap(), json!("root"));
    }

    #[tokio::test]
    async fn test_empty_group_succeeds_immediately() {
        let chain = Stage::new().all(Vec::<Runner>::new());
        let completion = chain.start(json!(3));

        assert!(completion.is_settled());
        assert_eq!(completion.await.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn test_group_members_share_input() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (seen.clone(), seen.clone());

        let chain = Stage::new().all([
            Runner::sync(move |v| {
                a.lock().push(v.clone());
                Ok(json!("a"))
            }),
            Runner::sync(move |v| {
                b.lock().push(v.clone());
                Ok(json!("b"))
            }),
        ]);

        assert_eq!(chain.start(json!(9)).await.unwrap(), json!(9));
        assert_eq!(*seen.lock(), vec![json!(9), json!(9)]);
    }

    #[tokio::test]
    async fn test_state_returns_to_idle() {
        let chain = Stage::new().then(Runner::sync(Ok));
        chain.start(Value::Null).await.unwrap();

        assert_eq!(chain.state(), StageState::Idle);
        assert_eq!(chain.parent().unwrap().state(), StageState::Idle);
    }

    #[tokio::test]
    async fn test_runner_failure_returns_to_idle() {
        let chain = Stage::new().then(Runner::sync(|_| Err(anyhow::anyhow!("broken"))));

        let err = chain.start(Value::Null).await.unwrap_err();
        assert_eq!(err.runner_error().unwrap().to_string(), "broken");
        assert_eq!(chain.state(), StageState::Idle);
        assert_eq!(chain.parent().unwrap().state(), StageState::Idle);
    }

    #[tokio::test]
    async fn test_running_while_suspended() {
        let chain = Stage::new().then(Runner::resolver(|v, resolver| {
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                resolver.resolve(v);
            });
        }));

        let started = chain.start(json!(1));
        assert_eq!(chain.state(), StageState::Running);
        assert_eq!(chain.parent().unwrap().state(), StageState::Running);

        assert_eq!(started.await.unwrap(), json!(1));
        assert_eq!(chain.state(), StageState::Idle);
    }
}
