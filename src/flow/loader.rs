use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, WorkflowError};
use crate::registry::TargetRegistry;

use super::{Flow, Operator};

/// JSON description of a flow whose steps name registered targets.
///
/// ```json
/// {
///   "name": "bill",
///   "steps": [
///     { "op": "call", "target": "bill_amount", "args": [30] },
///     { "op": "and", "target": "dollar_value", "args": [30] },
///     { "op": "combine", "target": "multiply" },
///     { "op": "apply", "target": "format_bill" }
///   ]
/// }
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct FlowDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<StepDefinition>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StepDefinition {
    pub op: Operator,
    pub target: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl FlowDefinition {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Checks the step layout: a leading `call`, no later `call`, and no
    /// explicit arguments on `apply`/`combine`.
    pub fn validate(&self) -> Result<()> {
        self.split().map(|_| ())
    }

    /// Resolves every step against `registry` and builds the flow.
    pub fn build(&self, registry: &TargetRegistry) -> Result<Flow> {
        let (first, rest) = self.split()?;
        let mut flow = Flow::new(registry.get(&first.target)?, first.args.clone())?;
        for (step, op) in rest {
            let target = registry.get(&step.target)?;
            flow = match op {
                ChainedOp::And => flow.and_call(target, step.args.clone())?,
                ChainedOp::Apply => flow.then_apply(target),
                ChainedOp::Combine => flow.then_combine(target),
            };
        }
        Ok(flow)
    }

    fn split(&self) -> Result<(&StepDefinition, Vec<(&StepDefinition, ChainedOp)>)> {
        let Some((first, rest)) = self.steps.split_first() else {
            return Err(WorkflowError::InvalidFlow(
                "a flow needs at least one step".to_string(),
            ));
        };
        if first.op != Operator::Call {
            return Err(WorkflowError::InvalidFlow(format!(
                "first step `{}` must be call, found {}",
                first.target, first.op
            )));
        }

        let mut chained = Vec::with_capacity(rest.len());
        for (offset, step) in rest.iter().enumerate() {
            let index = offset + 1;
            let op = match step.op {
                Operator::And => ChainedOp::And,
                Operator::Apply => ChainedOp::Apply,
                Operator::Combine => ChainedOp::Combine,
                Operator::Call => {
                    return Err(WorkflowError::InvalidFlow(format!(
                        "step {} `{}`: only the first step may be call",
                        index, step.target
                    )))
                }
            };
            if step.op.is_boundary() && !step.args.is_empty() {
                return Err(WorkflowError::InvalidFlow(format!(
                    "step {} `{}`: {} takes its arguments from earlier steps",
                    index, step.target, step.op
                )));
            }
            chained.push((step, op));
        }
        Ok((first, chained))
    }
}

/// Operators allowed after the leading `call`.
#[derive(Clone, Copy)]
enum ChainedOp {
    And,
    Apply,
    Combine,
}

pub fn load_flow_from_str(raw: &str, registry: &TargetRegistry) -> Result<Flow> {
    FlowDefinition::parse(raw)?.build(registry)
}

pub fn load_flow_from_value(value: Value, registry: &TargetRegistry) -> Result<Flow> {
    let definition: FlowDefinition = serde_json::from_value(value)?;
    definition.build(registry)
}
