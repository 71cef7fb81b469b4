use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, WorkflowError};
use crate::executor::ExecutorService;
use crate::future::run_async;
use crate::target::Value;

use super::{Operator, Step};

/// Launches the steps in declared order and returns the last step's result.
///
/// `Call`/`And` steps are submitted without waiting. `Apply` waits for the
/// step right before it, `Combine` for every step of the current independent
/// run, which starts at the closest earlier `Apply`/`Combine` step.
/// The first failure stops the loop; steps already launched keep running.
pub(crate) fn run_steps(
    steps: &[Arc<Step>],
    executor: &ExecutorService,
    cancelled: &AtomicBool,
) -> Result<Vec<Value>> {
    for (index, step) in steps.iter().enumerate() {
        if cancelled.load(Ordering::SeqCst) {
            warn!(step = index, op = %step.op, "flow cancelled, remaining steps skipped");
            break;
        }

        let args = match step.op {
            Operator::Call | Operator::And => step.args.clone(),
            Operator::Apply => {
                let Some(previous) = index.checked_sub(1) else {
                    let err = WorkflowError::InvalidFlow("apply needs a preceding step".to_string());
                    return Err(step_error(index, step, err));
                };
                wait_for(previous, &steps[previous])?
            }
            Operator::Combine => {
                let start = run_start(steps, index);
                let mut combined = Vec::new();
                for position in start..index {
                    combined.extend(wait_for(position, &steps[position])?);
                }
                combined
            }
        };

        if !launch(index, step, args, executor, cancelled)? {
            break;
        }
    }

    let last = steps.last().and_then(|step| step.future());
    let outcome = match last {
        Some(future) => future.get(Duration::ZERO),
        None => Err(WorkflowError::FlowAbortedOrTimedOut),
    };
    info!(steps = steps.len(), success = outcome.is_ok(), "completed flow");
    outcome
}

/// First index of the independent run feeding the `Combine` step at `index`.
/// The closest earlier `Apply`/`Combine` step opens the run and contributes
/// its own result.
pub(crate) fn run_start(steps: &[Arc<Step>], index: usize) -> usize {
    steps[..index]
        .iter()
        .rposition(|step| step.op.is_boundary())
        .unwrap_or(0)
}

fn wait_for(index: usize, step: &Step) -> Result<Vec<Value>> {
    let future = step
        .future()
        .ok_or_else(|| step_error(index, step, WorkflowError::FlowAbortedOrTimedOut))?;
    future.get(Duration::ZERO).map_err(|err| {
        warn!(step = index, op = %step.op, error = %err, "predecessor step failed");
        step_error(index, step, err)
    })
}

/// Publishes the step's future before submitting it so that a concurrent
/// `Flow::cancel` either sees the future or the loop sees the flag.
/// Returns false when the flow was cancelled in between.
fn launch(
    index: usize,
    step: &Step,
    args: Vec<Value>,
    executor: &ExecutorService,
    cancelled: &AtomicBool,
) -> Result<bool> {
    let future = run_async(step.target.clone(), args).map_err(|err| {
        warn!(step = index, op = %step.op, error = %err, "step could not be created");
        step_error(index, step, err)
    })?;
    future.set_executor(executor.clone());
    *step.future.lock() = Some(future.clone());

    if cancelled.load(Ordering::SeqCst) {
        future.cancel();
        return Ok(false);
    }

    debug!(step = index, op = %step.op, target_fn = %step.target.name(), "launching step");
    future.execute();
    Ok(true)
}

fn step_error(index: usize, step: &Step, source: WorkflowError) -> WorkflowError {
    WorkflowError::FlowStep {
        step: index,
        op: step.op,
        target: step.target.name().to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;

    fn steps(ops: &[Operator]) -> Vec<Arc<Step>> {
        ops.iter()
            .map(|op| Arc::new(Step::new(Target::new(|| {}), Vec::new(), *op)))
            .collect()
    }

    #[test]
    fn test_run_start_without_boundary() {
        let steps = steps(&[Operator::Call, Operator::And, Operator::Combine]);
        assert_eq!(run_start(&steps, 2), 0);
    }

    #[test]
    fn test_run_start_after_apply() {
        let steps = steps(&[
            Operator::Call,
            Operator::Apply,
            Operator::And,
            Operator::And,
            Operator::Combine,
        ]);
        assert_eq!(run_start(&steps, 4), 1);
    }

    #[test]
    fn test_run_start_after_combine() {
        let steps = steps(&[
            Operator::Call,
            Operator::And,
            Operator::Combine,
            Operator::And,
            Operator::Combine,
        ]);
        assert_eq!(run_start(&steps, 4), 2);
    }

    #[test]
    fn test_run_start_directly_after_apply() {
        let steps = steps(&[Operator::Call, Operator::Apply, Operator::Combine]);
        assert_eq!(run_start(&steps, 2), 1);
    }
}
