// Flow module: declarative step pipelines compiled to futures at execution time.

pub mod loader;
mod scheduler;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, WorkflowError};
use crate::executor::ExecutorService;
use crate::future::{Future, Stage};
use crate::target::{IntoTarget, Target, Value};

/// Dependency shape of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// First step, independent.
    Call,
    /// Independent step running alongside the other `Call`/`And` steps.
    And,
    /// Consumes the result of the step right before it.
    Apply,
    /// Consumes the concatenated results of the preceding independent run.
    Combine,
}

impl Operator {
    /// Steps that close an independent run.
    pub fn is_boundary(self) -> bool {
        matches!(self, Operator::Apply | Operator::Combine)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operator::Call => "CALL",
            Operator::And => "AND",
            Operator::Apply => "APPLY",
            Operator::Combine => "COMBINE",
        };
        f.write_str(label)
    }
}

pub(crate) struct Step {
    target: Target,
    args: Vec<Value>,
    op: Operator,
    future: Mutex<Option<Future>>,
}

impl Step {
    fn new(target: Target, args: Vec<Value>, op: Operator) -> Self {
        Self {
            target,
            args,
            op,
            future: Mutex::new(None),
        }
    }

    fn future(&self) -> Option<Future> {
        self.future.lock().clone()
    }
}

/// An ordered pipeline of steps with fork (`and_call`), chain (`then_apply`)
/// and fan-in (`then_combine`) semantics.
///
/// Nothing runs until [`execute`](Flow::execute); the whole scheduling loop
/// then runs inside one master [`Future`] on the flow's executor. The loop
/// itself blocks a worker while it waits on predecessors, so the executor
/// needs more than one worker for steps to make progress.
pub struct Flow {
    steps: Vec<Arc<Step>>,
    executor: Option<ExecutorService>,
    master: OnceCell<Future>,
    cancelled: Arc<AtomicBool>,
}

impl Flow {
    /// Starts a flow with a `Call` step.
    pub fn new<M>(target: impl IntoTarget<M>, args: Vec<Value>) -> Result<Self> {
        let target = target.into_target();
        target.check_args(args.len())?;
        Ok(Self {
            steps: vec![Arc::new(Step::new(target, args, Operator::Call))],
            executor: None,
            master: OnceCell::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Adds an independent step that runs in parallel with its `Call`/`And` siblings.
    pub fn and_call<M>(self, target: impl IntoTarget<M>, args: Vec<Value>) -> Result<Self> {
        let target = target.into_target();
        target.check_args(args.len())?;
        Ok(self.push(target, args, Operator::And))
    }

    /// Adds a step fed with the result list of the step right before it.
    pub fn then_apply<M>(self, target: impl IntoTarget<M>) -> Self {
        self.push(target.into_target(), Vec::new(), Operator::Apply)
    }

    /// Adds a step fed with the concatenated results of every step since the
    /// last `then_apply`/`then_combine` (or since the start of the flow).
    pub fn then_combine<M>(self, target: impl IntoTarget<M>) -> Self {
        self.push(target.into_target(), Vec::new(), Operator::Combine)
    }

    pub(crate) fn push(mut self, target: Target, args: Vec<Value>, op: Operator) -> Self {
        if self.master.get().is_some() {
            warn!(target_fn = %target.name(), %op, "step added after execute will not run");
        }
        self.steps.push(Arc::new(Step::new(target, args, op)));
        self
    }

    pub fn set_executor(mut self, executor: ExecutorService) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn operators(&self) -> Vec<Operator> {
        self.steps.iter().map(|step| step.op).collect()
    }

    /// Stage of the master future, `None` before [`execute`](Flow::execute).
    pub fn stage(&self) -> Option<Stage> {
        self.master.get().map(Future::stage)
    }

    /// Submits the scheduling loop. Only the first call has an effect.
    pub fn execute(&self) -> &Self {
        self.master.get_or_init(|| {
            let executor = self.executor.clone().unwrap_or_else(ExecutorService::global);
            let steps = self.steps.clone();
            let cancelled = Arc::clone(&self.cancelled);
            let loop_executor = executor.clone();
            let master = Future::from_invocation(
                "flow".to_string(),
                Box::new(move || scheduler::run_steps(&steps, &loop_executor, &cancelled)),
            );
            master.set_executor(executor).execute();
            master
        });
        self
    }

    /// Waits for the last step's result. `Duration::ZERO` waits without a deadline.
    ///
    /// With a deadline, every step that has not completed is cancelled once it
    /// passes.
    pub fn get(&self, timeout: Duration) -> Result<Vec<Value>> {
        let master = self.master.get().ok_or(WorkflowError::FlowNotExecuted)?;

        let _watchdog = if timeout.is_zero() {
            None
        } else {
            self.arm_watchdog(timeout)
        };

        let outcome = master.get(timeout);
        if matches!(outcome, Err(WorkflowError::TimedOut)) {
            cancel_pending(&self.steps, &self.cancelled);
        }
        outcome
    }

    /// Cancels the master future and every step future created so far, and
    /// stops the scheduling loop from launching further steps.
    ///
    /// A step whose target already started still runs to completion. Cancelling
    /// before `execute` is sticky: a later `execute` launches no step and `get`
    /// reports `FlowAbortedOrTimedOut`.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let Some(master) = self.master.get() else {
            return;
        };
        warn!("cancelling flow");
        master.cancel();
        for step in &self.steps {
            if let Some(future) = step.future() {
                future.cancel();
            }
        }
    }

    /// Spawns a thread that cancels pending steps when `timeout` elapses. Dropping
    /// the returned sender disarms it.
    fn arm_watchdog(&self, timeout: Duration) -> Option<Sender<()>> {
        let (disarm, disarmed) = bounded::<()>(0);
        let steps = self.steps.clone();
        let cancelled = Arc::clone(&self.cancelled);
        let spawned = thread::Builder::new()
            .name("taskflow-flow-timeout".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = disarmed.recv_timeout(timeout) {
                    warn!(timeout_ms = timeout.as_millis() as u64, "flow timeout triggered");
                    cancel_pending(&steps, &cancelled);
                }
            });
        match spawned {
            Ok(_) => Some(disarm),
            Err(err) => {
                warn!(error = %err, "failed to spawn flow timeout watchdog");
                None
            }
        }
    }
}

fn cancel_pending(steps: &[Arc<Step>], cancelled: &AtomicBool) {
    cancelled.store(true, Ordering::SeqCst);
    for step in steps {
        if let Some(future) = step.future() {
            if future.stage() != Stage::Completed {
                debug!(target_fn = %step.target.name(), op = %step.op, "cancelling pending step");
                future.cancel();
            }
        }
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("operators", &self.operators())
            .field("stage", &self.stage())
            .finish()
    }
}
