use std::time::Duration;

use serde_json::json;

use taskflow::{
    load_flow_from_str, load_flow_from_value, ExecutorService, FlowDefinition, Operator,
    TargetRegistry, WorkflowError,
};

fn bill_registry() -> TargetRegistry {
    let mut registry = TargetRegistry::new();
    registry
        .register("bill_amount", |_delay_ms: u64| 100)
        .register("dollar_value", |_delay_ms: u64| 60)
        .register("multiply", |a: i64, b: i64| a * b)
        .register("format_bill", |amount: i64| format!("Bill Amount = {}$", amount));
    registry
}

const BILL_FLOW: &str = r#"{
    "name": "bill",
    "steps": [
        { "op": "call", "target": "bill_amount", "args": [30] },
        { "op": "and", "target": "dollar_value", "args": [30] },
        { "op": "combine", "target": "multiply" },
        { "op": "apply", "target": "format_bill" }
    ]
}"#;

#[test]
fn json_flow_runs_against_registry() -> anyhow::Result<()> {
    let registry = bill_registry();
    let flow = load_flow_from_str(BILL_FLOW, &registry)?.set_executor(ExecutorService::new(10, 4)?);

    assert_eq!(
        flow.operators(),
        vec![Operator::Call, Operator::And, Operator::Combine, Operator::Apply]
    );
    flow.execute();
    assert_eq!(flow.get(Duration::ZERO)?, vec![json!("Bill Amount = 6000$")]);
    Ok(())
}

#[test]
fn definition_keeps_name_and_steps() -> anyhow::Result<()> {
    let definition = FlowDefinition::parse(BILL_FLOW)?;
    assert_eq!(definition.name.as_deref(), Some("bill"));
    assert_eq!(definition.steps.len(), 4);
    assert_eq!(definition.steps[0].args, vec![json!(30)]);
    assert!(definition.steps[2].args.is_empty());
    Ok(())
}

#[test]
fn unknown_target_is_unsupported() {
    let registry = bill_registry();
    let err = load_flow_from_value(
        json!({ "steps": [{ "op": "call", "target": "missing" }] }),
        &registry,
    )
    .unwrap_err();
    assert!(matches!(err, WorkflowError::UnsupportedTarget(ref name) if name == "missing"));
}

#[test]
fn malformed_definitions_are_rejected() {
    let registry = bill_registry();
    let cases = vec![
        json!({ "steps": [] }),
        json!({ "steps": [{ "op": "and", "target": "dollar_value", "args": [1] }] }),
        json!({ "steps": [
            { "op": "call", "target": "bill_amount", "args": [1] },
            { "op": "call", "target": "dollar_value", "args": [1] }
        ] }),
        json!({ "steps": [
            { "op": "call", "target": "bill_amount", "args": [1] },
            { "op": "apply", "target": "format_bill", "args": [1] }
        ] }),
    ];

    for case in cases {
        let err = load_flow_from_value(case.clone(), &registry).unwrap_err();
        assert!(
            matches!(err, WorkflowError::InvalidFlow(_)),
            "expected invalid flow for {}, got {:?}",
            case,
            err
        );
    }
}

#[test]
fn unknown_operator_is_a_serialization_error() {
    let registry = bill_registry();
    let err = load_flow_from_value(
        json!({ "steps": [{ "op": "fork", "target": "bill_amount" }] }),
        &registry,
    )
    .unwrap_err();
    assert!(matches!(err, WorkflowError::Serialization(_)));
}

#[test]
fn call_step_arity_is_checked_at_load() {
    let registry = bill_registry();
    let err = load_flow_from_value(
        json!({ "steps": [{ "op": "call", "target": "multiply", "args": [1] }] }),
        &registry,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::ArgumentMismatch { ref target, expected: 2, passed: 1 } if target == "multiply"
    ));
}

#[test]
fn validate_reports_layout_errors_without_registry() -> anyhow::Result<()> {
    let valid = FlowDefinition::parse(BILL_FLOW)?;
    valid.validate()?;

    let late_call = FlowDefinition::parse(
        r#"{ "steps": [
            { "op": "call", "target": "bill_amount", "args": [1] },
            { "op": "call", "target": "dollar_value", "args": [1] }
        ] }"#,
    )?;
    assert!(matches!(late_call.validate(), Err(WorkflowError::InvalidFlow(_))));

    let empty = FlowDefinition::parse(r#"{ "steps": [] }"#)?;
    assert!(matches!(empty.validate(), Err(WorkflowError::InvalidFlow(_))));
    Ok(())
}

#[test]
fn chained_combines_in_json_flow() -> anyhow::Result<()> {
    let mut registry = TargetRegistry::new();
    registry
        .register("one", || 1)
        .register("two", || 2)
        .register("ten", || 10)
        .register(
            "sum",
            taskflow::Target::variadic(|operands: Vec<i64>| operands.iter().sum::<i64>()),
        );

    let flow = load_flow_from_value(
        json!({ "steps": [
            { "op": "call", "target": "one" },
            { "op": "and", "target": "two" },
            { "op": "combine", "target": "sum" },
            { "op": "and", "target": "ten" },
            { "op": "combine", "target": "sum" }
        ] }),
        &registry,
    )?;
    flow.execute();
    assert_eq!(flow.get(Duration::ZERO)?, vec![json!(13)]);
    Ok(())
}
