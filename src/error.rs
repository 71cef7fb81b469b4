use thiserror::Error;

use crate::flow::Operator;

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("mismatch in number of arguments for `{target}`, expected = {expected}, passed = {passed}")]
    ArgumentMismatch {
        target: String,
        expected: usize,
        passed: usize,
    },
    #[error("target `{0}` is not invocable")]
    UnsupportedTarget(String),
    #[error("aborted")]
    Aborted,
    #[error("timedout")]
    TimedOut,
    #[error("completed already")]
    AlreadyCompleted,
    #[error("step {step} ({op}) `{target}` failed: {source}")]
    FlowStep {
        step: usize,
        op: Operator,
        target: String,
        #[source]
        source: Box<WorkflowError>,
    },
    #[error("flow aborted/timedout")]
    FlowAbortedOrTimedOut,
    #[error("future not created for the flow, call execute first")]
    FlowNotExecuted,
    #[error("target `{target}` failed: {message}")]
    Target { target: String, message: String },
    #[error("invalid flow definition: {0}")]
    InvalidFlow(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkflowError {
    /// True for the errors a cancelled or timed out future reports.
    pub fn is_abort(&self) -> bool {
        match self {
            WorkflowError::Aborted
            | WorkflowError::TimedOut
            | WorkflowError::FlowAbortedOrTimedOut => true,
            WorkflowError::FlowStep { source, .. } => source.is_abort(),
            _ => false,
        }
    }
}
