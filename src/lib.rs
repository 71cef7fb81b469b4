pub mod config;
pub mod error;
pub mod executor;
pub mod flow;
pub mod future;
pub mod registry;
pub mod target;
pub mod utils;

pub use config::ExecutorConfig;
pub use error::{Result, WorkflowError};
pub use executor::{ExecutorService, Task};
pub use flow::loader::{load_flow_from_str, load_flow_from_value, FlowDefinition, StepDefinition};
pub use flow::{Flow, Operator};
pub use future::{run_async, Future, Stage};
pub use registry::TargetRegistry;
pub use target::{Arity, Callable, IntoTarget, IntoValues, Target, Value};
pub use utils::logging;
