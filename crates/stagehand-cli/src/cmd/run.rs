use crate::output::{print_json, print_result};
use anyhow::Context;
use stagehand_core::action::Params;
use stagehand_core::executors::steps::coerce;
use stagehand_core::{ActionType, ExecuteOptions};
use std::path::Path;
use std::time::Duration;

pub fn run(
    root: &Path,
    action_type: &str,
    raw_params: &[String],
    trusted: bool,
    timeout_ms: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let action_type: ActionType = action_type.parse()?;
    let params = parse_params(raw_params)?;
    let options = ExecuteOptions {
        timeout: timeout_ms.map(Duration::from_millis),
        ..ExecuteOptions::default()
    };

    let (_workbench, mut session) = super::open_session(root, trusted)?;
    let rt = super::runtime()?;
    let result = rt.block_on(session.invoke_with(action_type, params, &options));

    if json {
        print_json(&result)?;
    } else {
        print_result(action_type.as_str(), &result);
    }

    if !result.success {
        anyhow::bail!("{action_type} did not succeed");
    }
    Ok(())
}

/// `key=value` pairs into a parameter object. Values are coerced the same
/// way compact step strings are.
pub(crate) fn parse_params(raw: &[String]) -> anyhow::Result<Params> {
    let mut params = Params::new();
    for pair in raw {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("parameter '{pair}' is not in key=value form"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("parameter '{pair}' has an empty key");
        }
        params.insert(key.to_string(), coerce(value));
    }
    Ok(params)
}
