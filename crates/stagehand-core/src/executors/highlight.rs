use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::file_open::open_owned;
use super::{ExecutionContext, Executor, ExecutorDescriptor};
use crate::action::{Action, Params};
use crate::error::Result;
use crate::host::OpenOptions;
use crate::params::{parse, HighlightParams};
use crate::result::ExecutionResult;
use crate::snapshot::DecorationRecord;
use crate::types::ActionType;
use crate::undo::UndoOp;

/// Highlights a line range, opening the file first and scrolling to the
/// start of the range.
pub struct HighlightExecutor;

#[async_trait]
impl Executor for HighlightExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor {
            action_type: ActionType::EditorHighlight,
            description: "Highlight a range of lines in a file",
            requires_trust: false,
            default_timeout: Duration::from_secs(5),
        }
    }

    fn validate(&self, params: &Params) -> Result<()> {
        parse::<HighlightParams>(params).map(|_| ())
    }

    async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let p: HighlightParams = parse(&action.params)?;
        let path = PathBuf::from(&p.path);

        let mut performed = Vec::new();
        let options = OpenOptions {
            line: Some(p.lines.start),
            ..OpenOptions::default()
        };
        if let Some(undo) = open_owned(ctx, &path, &options).await? {
            performed.push(undo);
        }

        let id = match ctx.host.decorate(&path, p.lines, p.style).await {
            Ok(id) => id,
            Err(e) => {
                if !performed.is_empty() {
                    let partial = UndoOp::reversing(performed);
                    if let Err(undo_err) = ctx.snapshots.apply_undo(&partial).await {
                        tracing::warn!(error = %undo_err, "could not close editor after failed highlight");
                    }
                }
                return Err(e);
            }
        };
        ctx.snapshots.track_decoration(
            &id,
            DecorationRecord {
                path,
                lines: p.lines,
                style: p.style,
            },
        );
        performed.push(UndoOp::DisposeDecoration { id });

        Ok(ExecutionResult::ok_with_undo(UndoOp::reversing(performed)))
    }
}
