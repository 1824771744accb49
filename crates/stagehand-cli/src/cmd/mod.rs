pub mod actions;
pub mod config;
pub mod present;
pub mod run;
pub mod sequence;

use stagehand_core::config::EngineConfig;
use stagehand_core::{Session, Workbench};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

/// A session over a workbench rooted at `root`, with real terminal
/// execution and the root's engine configuration.
pub(crate) fn open_session(root: &Path, trusted: bool) -> anyhow::Result<(Arc<Workbench>, Session)> {
    let config = EngineConfig::load(root).context("failed to load config")?;
    let workbench = Arc::new(Workbench::new(root).with_terminal_execution(true));
    workbench.set_trusted(trusted);
    let session = Session::new(workbench.clone(), config);
    Ok((workbench, session))
}

pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}
