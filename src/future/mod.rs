mod signal;
mod stage;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{after, never, select};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, WorkflowError};
use crate::executor::ExecutorService;
use crate::target::{IntoTarget, Value};

use signal::{FireOnDrop, Signal};
use stage::AtomicStage;

pub use stage::Stage;

type Invocation = Box<dyn FnOnce() -> Result<Vec<Value>> + Send + 'static>;

/// Creates a [`Future`] for `target` bound to `args`.
///
/// The target is not invoked until [`Future::execute`] is called. Fails with
/// [`WorkflowError::ArgumentMismatch`] when a fixed-arity target does not take
/// `args.len()` parameters.
pub fn run_async<M>(target: impl IntoTarget<M>, args: Vec<Value>) -> Result<Future> {
    let target = target.into_target();
    target.check_args(args.len())?;
    let name = target.name().to_string();
    Ok(Future::from_invocation(
        name,
        Box::new(move || target.invoke(args)),
    ))
}

struct Inner {
    name: String,
    invocation: Mutex<Option<Invocation>>,
    outcome: Mutex<Option<Result<Vec<Value>>>>,
    stage: AtomicStage,
    submitted: AtomicBool,
    abort: Signal,
    done: Signal,
    executor: Mutex<Option<ExecutorService>>,
}

impl Inner {
    /// Body run by a pool worker.
    fn run(&self) {
        // Waiters unblock however this returns.
        let _done = FireOnDrop(&self.done);

        if self.abort.is_fired() {
            debug!(target_fn = %self.name, "abort signalled before start, skipping target");
            return;
        }
        if !self.stage.advance(Stage::Running) {
            return;
        }
        let Some(invocation) = self.invocation.lock().take() else {
            return;
        };

        debug!(target_fn = %self.name, "calling target");
        let outcome = panic::catch_unwind(AssertUnwindSafe(invocation)).unwrap_or_else(|payload| {
            Err(WorkflowError::Target {
                target: self.name.clone(),
                message: format!("panicked: {}", panic_message(payload.as_ref())),
            })
        });
        if self.stage.advance(Stage::TargetInvoked) {
            *self.outcome.lock() = Some(outcome);
        } else {
            debug!(target_fn = %self.name, "target finished after abort, result discarded");
        }
    }

    fn terminal_error(&self) -> Option<WorkflowError> {
        match self.stage.load() {
            Stage::Aborted => Some(WorkflowError::Aborted),
            Stage::TimedOut => Some(WorkflowError::TimedOut),
            Stage::Completed => Some(WorkflowError::AlreadyCompleted),
            _ => None,
        }
    }

    fn complete(&self) -> Result<Vec<Value>> {
        if self.stage.advance(Stage::Completed) {
            return self
                .outcome
                .lock()
                .take()
                .unwrap_or(Err(WorkflowError::Aborted));
        }
        // Cancellation or a timeout already won; the captured result is dropped.
        self.outcome.lock().take();
        Err(self.terminal_error().unwrap_or(WorkflowError::Aborted))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Handle to one asynchronous invocation of a target.
///
/// Clones share the same state machine. Cancellation is cooperative: it only
/// prevents the invocation when delivered before a worker starts the target;
/// a target that is already running always runs to completion and its result
/// is discarded.
#[derive(Clone)]
pub struct Future {
    inner: Arc<Inner>,
}

impl Future {
    pub(crate) fn from_invocation(name: String, invocation: Invocation) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                invocation: Mutex::new(Some(invocation)),
                outcome: Mutex::new(None),
                stage: AtomicStage::new(),
                submitted: AtomicBool::new(false),
                abort: Signal::new(),
                done: Signal::new(),
                executor: Mutex::new(None),
            }),
        }
    }

    /// Binds the pool used by [`execute`](Future::execute). Has no effect once submitted.
    pub fn set_executor(&self, executor: ExecutorService) -> &Self {
        if self.inner.submitted.load(Ordering::Acquire) {
            debug!(target_fn = %self.inner.name, "executor changed after submission, ignored");
        }
        *self.inner.executor.lock() = Some(executor);
        self
    }

    /// Submits the invocation to the bound pool. Only the first call submits;
    /// may block while the pool's queue is full.
    pub fn execute(&self) -> &Self {
        if self.inner.submitted.swap(true, Ordering::AcqRel) {
            return self;
        }
        self.inner.stage.advance(Stage::Submitted);

        let executor = self
            .inner
            .executor
            .lock()
            .clone()
            .unwrap_or_else(ExecutorService::global);
        let inner = Arc::clone(&self.inner);
        debug!(target_fn = %self.inner.name, "submitting target");
        executor.submit(move || inner.run());
        self
    }

    /// Waits for the outcome. `Duration::ZERO` waits without a deadline.
    ///
    /// When the deadline passes first, the future is aborted (best effort) and
    /// [`WorkflowError::TimedOut`] is returned. Once terminal, every call
    /// returns the terminal error at once, [`WorkflowError::AlreadyCompleted`]
    /// after a successful completion.
    pub fn get(&self, timeout: Duration) -> Result<Vec<Value>> {
        if let Some(err) = self.inner.terminal_error() {
            return Err(err);
        }

        let started = Instant::now();
        let deadline = if timeout.is_zero() {
            never()
        } else {
            after(timeout)
        };

        select! {
            recv(self.inner.abort.receiver()) -> _ => {
                debug!(target_fn = %self.inner.name, "aborted target");
                Err(WorkflowError::Aborted)
            },
            recv(deadline) -> _ => {
                warn!(
                    target_fn = %self.inner.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "timeout triggered, aborting target"
                );
                self.inner.abort.fire();
                if self.inner.stage.advance(Stage::TimedOut) {
                    self.inner.outcome.lock().take();
                    Err(WorkflowError::TimedOut)
                } else {
                    Err(self.inner.terminal_error().unwrap_or(WorkflowError::TimedOut))
                }
            },
            recv(self.inner.done.receiver()) -> _ => self.inner.complete(),
        }
    }

    /// Signals abort and marks the future `Aborted`.
    ///
    /// Returns false when the future already reached a terminal stage.
    pub fn cancel(&self) -> bool {
        if self.inner.stage.load() == Stage::Completed {
            return false;
        }
        let applied = self.inner.stage.advance(Stage::Aborted);
        if self.inner.abort.fire() {
            warn!(target_fn = %self.inner.name, "cancelling target");
        }
        if applied {
            self.inner.outcome.lock().take();
        }
        applied
    }

    pub fn stage(&self) -> Stage {
        self.inner.stage.load()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl std::fmt::Debug for Future {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future")
            .field("name", &self.inner.name)
            .field("stage", &self.stage())
            .finish()
    }
}
