use async_trait::async_trait;
use std::time::Duration;

use super::{require_trust, ExecutionContext, Executor, ExecutorDescriptor};
use crate::action::{Action, Params};
use crate::error::Result;
use crate::params::{parse, HostCommandParams};
use crate::result::ExecutionResult;
use crate::types::ActionType;

/// Invokes an arbitrary host command by id. Host commands have no known
/// inverse, so the result is never undoable.
pub struct HostCommandExecutor;

#[async_trait]
impl Executor for HostCommandExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor {
            action_type: ActionType::HostCommand,
            description: "Execute a host command by id",
            requires_trust: true,
            default_timeout: Duration::from_secs(10),
        }
    }

    fn validate(&self, params: &Params) -> Result<()> {
        parse::<HostCommandParams>(params).map(|_| ())
    }

    async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        require_trust(&self.descriptor(), ctx)?;
        let p: HostCommandParams = parse(&action.params)?;
        let value = ctx.host.execute_command(&p.id, &p.args()).await?;
        let result = ExecutionResult::ok();
        Ok(match value {
            serde_json::Value::Null => result,
            serde_json::Value::String(s) => result.with_output(s),
            other => result.with_output(other.to_string()),
        })
    }
}
