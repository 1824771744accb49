use crate::output::{print_json, print_result, print_table};
use anyhow::Context;
use serde_json::{json, Value};
use stagehand_core::action::Params;
use stagehand_core::executors::sequence::check_steps;
use stagehand_core::executors::steps::canonicalize;
use stagehand_core::ActionType;
use std::path::Path;

pub fn run(
    root: &Path,
    steps: &str,
    check: bool,
    trusted: bool,
    continue_on_error: bool,
    json: bool,
) -> anyhow::Result<()> {
    let steps = parse_steps(steps)?;
    let (_workbench, mut session) = super::open_session(root, trusted)?;

    if check {
        return check_only(&steps, &session, json);
    }

    let mut params = Params::new();
    params.insert("steps".into(), steps);
    params.insert("stopOnError".into(), Value::Bool(!continue_on_error));

    let rt = super::runtime()?;
    let result = rt.block_on(session.invoke(ActionType::Sequence, params));

    if json {
        print_json(&result)?;
    } else {
        print_result("sequence", &result);
    }

    if !result.success {
        anyhow::bail!("sequence did not succeed");
    }
    Ok(())
}

/// JSON arrays and objects are taken as structured steps; anything else is
/// a compact step string.
fn parse_steps(text: &str) -> anyhow::Result<Value> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        serde_json::from_str(trimmed).context("steps look like JSON but do not parse")
    } else {
        Ok(Value::String(trimmed.to_string()))
    }
}

fn check_only(steps: &Value, session: &stagehand_core::Session, json: bool) -> anyhow::Result<()> {
    let specs = canonicalize(steps)?;
    let problems = check_steps(&specs, &session.context());

    if json {
        let problems: Vec<Value> = problems
            .iter()
            .map(|(i, e)| json!({ "step": i + 1, "error": e.to_string() }))
            .collect();
        print_json(&json!({ "steps": specs, "problems": problems }))?;
    } else {
        let rows = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let status = problems
                    .iter()
                    .find(|(p, _)| *p == i)
                    .map(|(_, e)| e.to_string())
                    .unwrap_or_else(|| "ok".to_string());
                vec![
                    (i + 1).to_string(),
                    spec.action_type.clone(),
                    Value::Object(spec.params.clone()).to_string(),
                    status,
                ]
            })
            .collect();
        print_table(&["#", "TYPE", "PARAMS", "CHECK"], rows);
    }

    if !problems.is_empty() {
        anyhow::bail!("{} of {} steps failed validation", problems.len(), specs.len());
    }
    Ok(())
}
