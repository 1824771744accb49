use async_trait::async_trait;
use std::time::Duration;

use super::{require_trust, ExecutionContext, Executor, ExecutorDescriptor};
use crate::action::{Action, Params};
use crate::error::Result;
use crate::params::{parse, DebugStartParams};
use crate::result::ExecutionResult;
use crate::types::ActionType;
use crate::undo::UndoOp;

pub struct DebugStartExecutor;

#[async_trait]
impl Executor for DebugStartExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor {
            action_type: ActionType::DebugStart,
            description: "Start a debug session from a named launch configuration",
            requires_trust: true,
            default_timeout: Duration::from_secs(10),
        }
    }

    fn validate(&self, params: &Params) -> Result<()> {
        parse::<DebugStartParams>(params).map(|_| ())
    }

    async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        require_trust(&self.descriptor(), ctx)?;
        let p: DebugStartParams = parse(&action.params)?;

        let started = ctx
            .host
            .start_debugging(&p.config_name, p.workspace_folder.as_deref())
            .await?;
        if !started {
            return Ok(ExecutionResult::failure(format!(
                "Debug configuration '{}' could not be started",
                p.config_name
            )));
        }
        Ok(ExecutionResult::ok_with_undo(UndoOp::StopDebug {
            config_name: p.config_name,
        }))
    }
}
