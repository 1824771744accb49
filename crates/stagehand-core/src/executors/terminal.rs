use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::{require_trust, ExecutionContext, Executor, ExecutorDescriptor};
use crate::action::{Action, Params};
use crate::error::Result;
use crate::params::{parse, TerminalRunParams};
use crate::result::ExecutionResult;
use crate::types::ActionType;
use crate::undo::UndoOp;

const CLEAR_TERMINAL_COMMAND: &str = "workbench.action.terminal.clear";

/// Sends a command to a named terminal, creating the terminal on first use.
/// Only terminals this executor created are disposed on undo.
pub struct TerminalRunExecutor;

#[async_trait]
impl Executor for TerminalRunExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor {
            action_type: ActionType::TerminalRun,
            description: "Run a shell command in a named terminal",
            requires_trust: true,
            default_timeout: Duration::from_secs(30),
        }
    }

    fn validate(&self, params: &Params) -> Result<()> {
        parse::<TerminalRunParams>(params).map(|_| ())
    }

    async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        require_trust(&self.descriptor(), ctx)?;
        let p: TerminalRunParams = parse(&action.params)?;

        let existed = ctx.host.terminals().await?.contains(&p.name);
        let cwd = p.cwd.as_deref().map(PathBuf::from);
        ctx.host.create_terminal(&p.name, cwd.as_deref()).await?;
        if !existed {
            ctx.snapshots.track_terminal(&p.name, cwd);
        }

        let undo = (!existed).then(|| UndoOp::DisposeTerminal {
            name: p.name.clone(),
        });
        if let Err(e) = send(ctx, &p).await {
            if let Some(undo) = &undo {
                if let Err(undo_err) = ctx.snapshots.apply_undo(undo).await {
                    tracing::warn!(terminal = %p.name, error = %undo_err, "could not dispose terminal after failed send");
                }
            }
            return Err(e);
        }

        Ok(match undo {
            Some(undo) => ExecutionResult::ok_with_undo(undo),
            None => ExecutionResult::ok(),
        })
    }
}

async fn send(ctx: &ExecutionContext, p: &TerminalRunParams) -> Result<()> {
    if p.clear {
        ctx.host
            .execute_command(CLEAR_TERMINAL_COMMAND, &[])
            .await?;
    }
    tracing::debug!(terminal = %p.name, command = %p.command, "sending to terminal");
    ctx.host
        .send_to_terminal(&p.name, &p.command, &ctx.cancel)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StagehandError;
    use crate::executors::testing::{action, context};
    use crate::host::Host;
    use crate::params::DEFAULT_TERMINAL_NAME;
    use crate::workbench::Workbench;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn creates_terminal_and_sends_command() {
        let wb = Arc::new(Workbench::in_memory());
        let ctx = context(wb.clone());
        let result = TerminalRunExecutor
            .execute(&action(ActionType::TerminalRun, json!({ "command": "cargo test" })), &ctx)
            .await
            .unwrap();
        assert_eq!(
            result.undo,
            Some(UndoOp::DisposeTerminal {
                name: DEFAULT_TERMINAL_NAME.into()
            })
        );
        let transcript = wb.terminal(DEFAULT_TERMINAL_NAME).unwrap();
        assert_eq!(transcript.input, vec!["cargo test"]);
    }

    #[tokio::test]
    async fn reused_terminal_is_not_disposed_on_undo() {
        let wb = Arc::new(Workbench::in_memory());
        wb.create_terminal("build", None).await.unwrap();
        let ctx = context(wb.clone());
        let result = TerminalRunExecutor
            .execute(
                &action(
                    ActionType::TerminalRun,
                    json!({ "command": "make", "name": "build", "clear": true }),
                ),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.success);
        assert!(!result.can_undo);
        assert_eq!(wb.executed_commands()[0].0, CLEAR_TERMINAL_COMMAND);
    }

    #[tokio::test]
    async fn failed_send_disposes_the_new_terminal() {
        let wb = Arc::new(Workbench::in_memory());
        wb.inject_failure("send_to_terminal", "pty closed");
        let ctx = context(wb.clone());
        let err = TerminalRunExecutor
            .execute(
                &action(ActionType::TerminalRun, json!({ "command": "ls", "name": "demo" })),
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("pty closed"));
        assert!(wb.terminal("demo").is_none());
        assert!(ctx.snapshots.capture(0, "after").await.terminals.is_empty());
    }

    #[tokio::test]
    async fn failed_send_keeps_a_terminal_that_already_existed() {
        let wb = Arc::new(Workbench::in_memory());
        wb.create_terminal("build", None).await.unwrap();
        wb.inject_failure("send_to_terminal", "pty closed");
        let ctx = context(wb.clone());
        let result = TerminalRunExecutor
            .execute(
                &action(ActionType::TerminalRun, json!({ "command": "make", "name": "build" })),
                &ctx,
            )
            .await;
        assert!(result.is_err());
        assert!(wb.terminal("build").is_some());
    }

    #[tokio::test]
    async fn untrusted_context_is_refused_without_touching_the_host() {
        let wb = Arc::new(Workbench::in_memory());
        let ctx = context(wb.clone()).with_trusted(false);
        let err = TerminalRunExecutor
            .execute(&action(ActionType::TerminalRun, json!({ "command": "rm -rf /" })), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StagehandError::TrustDenied(_)));
        assert!(wb.journal().is_empty());
    }
}
