use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ExecutionContext, Executor, ExecutorDescriptor};
use crate::action::{Action, Params};
use crate::error::Result;
use crate::host::OpenOptions;
use crate::params::{parse, FileOpenParams};
use crate::result::ExecutionResult;
use crate::types::ActionType;
use crate::undo::UndoOp;

pub struct FileOpenExecutor;

/// Open `path` unless it is already visible. Returns the undo for the open,
/// or `None` when the editor was the presenter's own.
pub(crate) async fn open_owned(
    ctx: &ExecutionContext,
    path: &Path,
    options: &OpenOptions,
) -> Result<Option<UndoOp>> {
    let already_visible = ctx
        .host
        .visible_documents()
        .await?
        .iter()
        .any(|d| d.path == path);
    ctx.host.open_document(path, options).await?;
    if already_visible && !ctx.snapshots.is_owned_editor(path) {
        return Ok(None);
    }
    ctx.snapshots.track_opened_editor(path);
    Ok(Some(UndoOp::CloseEditor {
        path: path.to_path_buf(),
    }))
}

#[async_trait]
impl Executor for FileOpenExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor {
            action_type: ActionType::FileOpen,
            description: "Open a file in the editor, optionally at a line",
            requires_trust: false,
            default_timeout: Duration::from_secs(5),
        }
    }

    fn validate(&self, params: &Params) -> Result<()> {
        parse::<FileOpenParams>(params).map(|_| ())
    }

    async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let p: FileOpenParams = parse(&action.params)?;
        let path = PathBuf::from(&p.path);
        let options = OpenOptions {
            line: p.line,
            column: p.column,
            view_column: p.view_column,
            preview: p.preview,
        };
        Ok(match open_owned(ctx, &path, &options).await? {
            Some(undo) => ExecutionResult::ok_with_undo(undo),
            None => ExecutionResult::ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::testing::{action, context};
    use crate::host::Host;
    use crate::workbench::Workbench;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn opens_and_returns_close_undo() {
        let wb = Arc::new(Workbench::in_memory());
        let ctx = context(wb.clone());
        let result = FileOpenExecutor
            .execute(
                &action(ActionType::FileOpen, json!({ "path": "src/lib.rs", "line": 12 })),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(
            result.undo,
            Some(UndoOp::CloseEditor {
                path: PathBuf::from("src/lib.rs")
            })
        );
        assert_eq!(wb.documents()[0].line, Some(12));
        assert!(ctx.snapshots.is_owned_editor(Path::new("src/lib.rs")));
    }

    #[tokio::test]
    async fn presenter_editor_is_not_claimed() {
        let wb = Arc::new(Workbench::in_memory());
        wb.open_document(Path::new("notes.md"), &OpenOptions::default())
            .await
            .unwrap();
        let ctx = context(wb.clone());
        let result = FileOpenExecutor
            .execute(&action(ActionType::FileOpen, json!({ "path": "notes.md" })), &ctx)
            .await
            .unwrap();
        assert!(result.success);
        assert!(!result.can_undo);
        assert!(!ctx.snapshots.is_owned_editor(Path::new("notes.md")));
    }

    #[tokio::test]
    async fn missing_file_is_an_error_on_a_rooted_host() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context(Arc::new(Workbench::new(dir.path())));
        let err = FileOpenExecutor
            .execute(&action(ActionType::FileOpen, json!({ "path": "nope.rs" })), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn rejects_zero_line() {
        let p = crate::executors::testing::params(json!({ "path": "a.rs", "line": 0 }));
        assert!(FileOpenExecutor.validate(&p).is_err());
    }
}
