//! Undo as data.
//!
//! Every undoable effect is described by an [`UndoOp`] rather than a captured
//! closure, so undo stacks can be inspected, serialized and unit-tested
//! without touching real resources. [`apply`] is the only place an undo
//! reaches the host.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, StagehandError};
use crate::host::Host;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum UndoOp {
    CloseEditor {
        path: PathBuf,
    },
    DisposeDecoration {
        id: String,
    },
    DisposeTerminal {
        name: String,
    },
    StopDebug {
        #[serde(rename = "configName")]
        config_name: String,
    },
    /// Ops in application order (already reversed relative to how the
    /// effects were performed).
    Composite {
        ops: Vec<UndoOp>,
    },
}

impl UndoOp {
    /// Build the inverse of a run of effects performed in `performed` order.
    pub fn reversing(performed: Vec<UndoOp>) -> Self {
        let mut ops = performed;
        ops.reverse();
        UndoOp::Composite { ops }
    }

    /// Leaf ops in application order.
    pub fn flatten(&self) -> Vec<&UndoOp> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(op) = stack.pop() {
            match op {
                UndoOp::Composite { ops } => stack.extend(ops.iter().rev()),
                leaf => out.push(leaf),
            }
        }
        out
    }

    pub fn describe(&self) -> String {
        match self {
            UndoOp::CloseEditor { path } => format!("close editor {}", path.display()),
            UndoOp::DisposeDecoration { id } => format!("dispose decoration {id}"),
            UndoOp::DisposeTerminal { name } => format!("dispose terminal {name}"),
            UndoOp::StopDebug { config_name } => format!("stop debug session {config_name}"),
            UndoOp::Composite { ops } => format!("{} undo steps", ops.len()),
        }
    }
}

async fn apply_leaf(host: &dyn Host, op: &UndoOp) -> Result<()> {
    match op {
        UndoOp::CloseEditor { path } => host.close_document(path).await,
        UndoOp::DisposeDecoration { id } => host.dispose_decoration(id).await,
        UndoOp::DisposeTerminal { name } => host.dispose_terminal(name).await,
        UndoOp::StopDebug { config_name } => host.stop_debugging(config_name).await,
        UndoOp::Composite { .. } => Ok(()),
    }
}

/// Apply `op` against the host.
///
/// Composite ops are best effort: every leaf is attempted, and failures are
/// gathered into a single error once all leaves have run.
pub async fn apply(host: &dyn Host, op: &UndoOp) -> Result<()> {
    apply_each(host, op, |_| {}).await
}

/// Like [`apply`], calling `applied` with every leaf the host accepted.
pub(crate) async fn apply_each<F>(host: &dyn Host, op: &UndoOp, mut applied: F) -> Result<()>
where
    F: FnMut(&UndoOp) + Send,
{
    let mut failures = Vec::new();
    for leaf in op.flatten() {
        match apply_leaf(host, leaf).await {
            Ok(()) => applied(leaf),
            Err(e) => {
                tracing::warn!(undo = %leaf.describe(), error = %e, "undo step failed");
                failures.push(format!("{}: {e}", leaf.describe()));
            }
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(StagehandError::host(failures.join("; ")))
    }
}
