use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use once_cell::sync::Lazy;
use tracing::{debug, error, info, warn};

use crate::config::ExecutorConfig;
use crate::error::{Result, WorkflowError};

/// Unit of work accepted by an [`ExecutorService`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

static DEFAULT_EXECUTOR: Lazy<ExecutorService> = Lazy::new(|| {
    let config = ExecutorConfig::from_env().unwrap_or_else(|err| {
        warn!(error = %err, "invalid executor environment, using defaults");
        ExecutorConfig::default()
    });
    ExecutorService::from_config(&config).expect("failed to start default executor service")
});

struct Shared {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    capacity: usize,
    workers: usize,
}

/// Fixed set of worker threads draining one bounded FIFO queue.
///
/// Workers run every task to completion before taking the next one. When the
/// queue is full, [`submit`](ExecutorService::submit) blocks the caller until
/// a worker frees a slot. Handles are cheap to clone and share the same pool.
#[derive(Clone)]
pub struct ExecutorService {
    shared: Arc<Shared>,
}

impl ExecutorService {
    pub fn new(queue_capacity: usize, workers: usize) -> Result<Self> {
        Self::from_config(&ExecutorConfig::new(queue_capacity, workers))
    }

    pub fn from_config(config: &ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let (sender, receiver) = bounded::<Task>(config.queue_capacity);

        for index in 0..config.workers {
            let tasks = receiver.clone();
            thread::Builder::new()
                .name(format!("taskflow-worker-{}", index))
                .spawn(move || {
                    // Ends once every handle is gone and the queue is drained.
                    for task in tasks.iter() {
                        task();
                    }
                })
                .map_err(|err| {
                    WorkflowError::Config(format!("failed to spawn worker {}: {}", index, err))
                })?;
        }

        info!(
            queue_capacity = config.queue_capacity,
            workers = config.workers,
            "executor service started"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                sender,
                receiver,
                capacity: config.queue_capacity,
                workers: config.workers,
            }),
        })
    }

    /// The process-wide pool used by futures and flows with no executor of their own.
    pub fn global() -> ExecutorService {
        DEFAULT_EXECUTOR.clone()
    }

    /// Enqueues `task`, blocking while the queue is at capacity.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shared.sender.is_full() {
            debug!(capacity = self.shared.capacity, "task queue full, waiting for a free slot");
        }
        // The pool keeps a receiver of its own, so the channel cannot disconnect here.
        if self.shared.sender.send(Box::new(task)).is_err() {
            error!("task queue disconnected, task dropped");
        }
    }

    /// Number of tasks waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.receiver.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn workers(&self) -> usize {
        self.shared.workers
    }
}

impl std::fmt::Debug for ExecutorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorService")
            .field("capacity", &self.shared.capacity)
            .field("workers", &self.shared.workers)
            .field("queued", &self.queued())
            .finish()
    }
}
