use crate::output::{print_json, print_table};
use stagehand_core::Registry;

pub fn run(json: bool) -> anyhow::Result<()> {
    let descriptors = Registry::with_builtins().list();

    if json {
        return print_json(&descriptors);
    }

    let rows = descriptors
        .iter()
        .map(|d| {
            vec![
                d.action_type.to_string(),
                if d.requires_trust { "yes" } else { "no" }.to_string(),
                format!("{}ms", d.default_timeout.as_millis()),
                d.description.to_string(),
            ]
        })
        .collect();
    print_table(&["TYPE", "TRUST", "TIMEOUT", "DESCRIPTION"], rows);
    Ok(())
}
