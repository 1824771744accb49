//! Validation checks: read-only probes of the environment that report
//! success or failure and never produce undo.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{require_trust, ExecutionContext, Executor, ExecutorDescriptor};
use crate::action::{Action, Params};
use crate::error::Result;
use crate::host::ProcessRequest;
use crate::params::{parse, ValidateCommandParams, ValidateFileParams, ValidatePortParams};
use crate::result::ExecutionResult;
use crate::types::ActionType;

/// Connection attempts give up after this long, or the run budget if shorter.
const PORT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// validate.command
// ---------------------------------------------------------------------------

pub struct ValidateCommandExecutor;

#[async_trait]
impl Executor for ValidateCommandExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor {
            action_type: ActionType::ValidateCommand,
            description: "Run a command and check its exit code",
            requires_trust: true,
            default_timeout: Duration::from_secs(10),
        }
    }

    fn validate(&self, params: &Params) -> Result<()> {
        parse::<ValidateCommandParams>(params).map(|_| ())
    }

    async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let descriptor = self.descriptor();
        require_trust(&descriptor, ctx)?;
        let p: ValidateCommandParams = parse(&action.params)?;

        let request = ProcessRequest {
            command: p.command.clone(),
            cwd: p.cwd.as_deref().map(PathBuf::from),
            timeout: ctx.budget_or(descriptor.default_timeout),
        };
        let output = ctx.host.run_process(&request, &ctx.cancel).await?;

        if output.timed_out {
            return Ok(ExecutionResult::failure(format!(
                "Command timed out after {}ms: {}",
                request.timeout.as_millis(),
                p.command
            )));
        }
        if output.cancelled {
            return Ok(ExecutionResult::failure(format!(
                "Command cancelled: {}",
                p.command
            )));
        }

        let text = output.combined();
        let result = match output.exit_code {
            Some(code) if code == p.expect_exit_code => ExecutionResult::ok(),
            Some(code) => ExecutionResult::failure(format!(
                "Command exited with code {code} (expected {})",
                p.expect_exit_code
            )),
            None => ExecutionResult::failure("Command was terminated by a signal"),
        };
        Ok(if text.is_empty() {
            result
        } else {
            result.with_output(text)
        })
    }
}

// ---------------------------------------------------------------------------
// validate.file
// ---------------------------------------------------------------------------

pub struct ValidateFileExecutor;

#[async_trait]
impl Executor for ValidateFileExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor {
            action_type: ActionType::ValidateFile,
            description: "Check that a file or directory exists",
            requires_trust: false,
            default_timeout: Duration::from_secs(5),
        }
    }

    fn validate(&self, params: &Params) -> Result<()> {
        parse::<ValidateFileParams>(params).map(|_| ())
    }

    async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let p: ValidateFileParams = parse(&action.params)?;
        Ok(if ctx.host.path_exists(Path::new(&p.path)).await {
            ExecutionResult::ok()
        } else {
            ExecutionResult::failure(format!("File not found: {}", p.path))
        })
    }
}

// ---------------------------------------------------------------------------
// validate.port
// ---------------------------------------------------------------------------

pub struct ValidatePortExecutor;

#[async_trait]
impl Executor for ValidatePortExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor {
            action_type: ActionType::ValidatePort,
            description: "Check that something is listening on a TCP port",
            requires_trust: false,
            default_timeout: Duration::from_secs(5),
        }
    }

    fn validate(&self, params: &Params) -> Result<()> {
        parse::<ValidatePortParams>(params).map(|_| ())
    }

    async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let p: ValidatePortParams = parse(&action.params)?;
        let timeout = ctx.budget_or(PORT_PROBE_TIMEOUT).min(PORT_PROBE_TIMEOUT);
        Ok(if ctx.host.probe_port(&p.host, p.port, timeout).await? {
            ExecutionResult::ok()
        } else {
            ExecutionResult::failure(format!(
                "Nothing is listening on {}:{}",
                p.host, p.port
            ))
        })
    }
}
