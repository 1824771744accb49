//! The execution pipeline: trust gate, validation, then a time-boxed run.
//!
//! `Pipeline::execute` never returns an error. Unknown types, trust
//! denials, invalid parameters, executor errors, panics and timeouts all
//! come back as a failed [`ExecutionResult`] stamped with the action type
//! and target.
//!
//! The executor runs on its own task. When the budget elapses the pipeline
//! cancels the run's token and waits a short grace period for the task to
//! wind down. Whatever the task completed by then is undone, so a timed-out
//! action leaves nothing of its own behind. A task still running after the
//! grace period is abandoned.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::action::Action;
use crate::config::EngineConfig;
use crate::error::{Result, StagehandError};
use crate::executors::{ExecutionContext, ExecutorDescriptor};
use crate::params::target_for;
use crate::result::ExecutionResult;
use crate::types::{ActionStatus, ActionType};

/// How long a timed-out run may take to settle after being cancelled.
const SETTLE_GRACE: Duration = Duration::from_millis(500);

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub timeout: Option<Duration>,
    /// Run trust-requiring actions in an untrusted context.
    pub skip_trust_check: bool,
}

pub struct Pipeline {
    timeouts: HashMap<ActionType, Duration>,
    default_timeout: Duration,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let timeouts = ActionType::all()
            .iter()
            .filter_map(|t| config.timeout_for(*t).map(|d| (*t, d)))
            .collect();
        Self {
            timeouts,
            default_timeout: config.default_timeout(),
        }
    }

    /// Budget precedence: call options, configured override, executor
    /// default, then the global default.
    pub fn budget_for(&self, descriptor: &ExecutorDescriptor, options: &ExecuteOptions) -> Duration {
        options
            .timeout
            .or_else(|| self.timeouts.get(&descriptor.action_type).copied())
            .or_else(|| (!descriptor.default_timeout.is_zero()).then_some(descriptor.default_timeout))
            .unwrap_or(self.default_timeout)
    }

    pub async fn execute(
        &self,
        action: &mut Action,
        ctx: &ExecutionContext,
        options: &ExecuteOptions,
    ) -> ExecutionResult {
        let started = Instant::now();
        let target = target_for(action.action_type, &action.params);
        let result = self.run(action, ctx, options).await;
        let result = result
            .with_duration(started.elapsed().as_millis() as u64)
            .enrich(action.action_type, target);

        if result.success {
            action.transition(ActionStatus::Success);
            tracing::debug!(action = %action.action_type, id = %action.id, ms = result.duration_ms, "action succeeded");
        } else {
            let status = if result.timed_out {
                ActionStatus::Timeout
            } else {
                ActionStatus::Failed
            };
            let message = result.error.clone().unwrap_or_default();
            action.fail(status, message.clone());
            tracing::info!(action = %action.action_type, id = %action.id, error = %message, "action failed");
        }
        result
    }

    async fn run(
        &self,
        action: &mut Action,
        ctx: &ExecutionContext,
        options: &ExecuteOptions,
    ) -> ExecutionResult {
        let executor = match ctx.registry.get(action.action_type) {
            Ok(executor) => executor,
            Err(e) => return ExecutionResult::failure(e.to_string()),
        };
        let descriptor = executor.descriptor();

        if ctx.cancel.is_cancelled() {
            return ExecutionResult::failure(
                StagehandError::Cancelled(format!("{} was not started", action.action_type))
                    .to_string(),
            );
        }
        if descriptor.requires_trust && !ctx.trusted && !options.skip_trust_check {
            return ExecutionResult::failure(
                StagehandError::TrustDenied(action.action_type.to_string()).to_string(),
            );
        }
        if let Err(e) = executor.validate(&action.params) {
            return ExecutionResult::failure(e.to_string());
        }

        let budget = self.budget_for(&descriptor, options);
        let mut run_ctx = ctx.clone();
        run_ctx.cancel = ctx.cancel.child();
        run_ctx.budget = Some(budget);
        if options.skip_trust_check {
            run_ctx.trusted = true;
        }
        let run_cancel = run_ctx.cancel.clone();

        action.transition(ActionStatus::Running);
        tracing::debug!(action = %action.action_type, id = %action.id, budget_ms = budget.as_millis() as u64, "running action");

        let snapshot = action.clone();
        let mut task = tokio::spawn(async move { executor.execute(&snapshot, &run_ctx).await });

        match tokio::time::timeout(budget, &mut task).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => ExecutionResult::failure(e.to_string()),
            Ok(Err(join_error)) => {
                tracing::error!(action = %action.action_type, error = %join_error, "executor task panicked");
                ExecutionResult::failure(format!("executor panicked: {join_error}"))
            }
            Err(_) => {
                run_cancel.cancel();
                tracing::warn!(action = %action.action_type, budget_ms = budget.as_millis() as u64, "action timed out");
                settle_abandoned(action.action_type, task, ctx).await;
                ExecutionResult::timeout(budget.as_millis() as u64)
            }
        }
    }
}

/// Wait briefly for a cancelled run and undo whatever it reports having done.
async fn settle_abandoned(
    action_type: ActionType,
    task: JoinHandle<Result<ExecutionResult>>,
    ctx: &ExecutionContext,
) {
    match tokio::time::timeout(SETTLE_GRACE, task).await {
        Ok(Ok(Ok(late))) => {
            let Some(undo) = late.undo else { return };
            tracing::info!(action = %action_type, undo = %undo.describe(), "undoing timed-out action");
            if let Err(e) = ctx.snapshots.apply_undo(&undo).await {
                tracing::warn!(action = %action_type, error = %e, "undo after timeout failed");
            }
        }
        Ok(Ok(Err(e))) => {
            tracing::debug!(action = %action_type, error = %e, "timed-out action settled with an error");
        }
        Ok(Err(join_error)) => {
            tracing::error!(action = %action_type, error = %join_error, "timed-out executor task panicked");
        }
        Err(_) => {
            tracing::warn!(action = %action_type, grace_ms = SETTLE_GRACE.as_millis() as u64, "timed-out action did not settle; abandoning it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Params;
    use crate::executors::{builtins, Executor};
    use crate::registry::Registry;
    use crate::undo::UndoOp;
    use crate::workbench::Workbench;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts invocations; never settles unless `fast` is set. Records
    /// whether it observed cancellation after the pipeline gave up.
    #[derive(Default)]
    struct Recorder {
        calls: AtomicUsize,
        saw_cancel: Arc<AtomicUsize>,
        requires_trust: bool,
    }

    #[async_trait]
    impl Executor for Recorder {
        fn descriptor(&self) -> ExecutorDescriptor {
            ExecutorDescriptor {
                action_type: ActionType::HostCommand,
                description: "recorder",
                requires_trust: self.requires_trust,
                default_timeout: Duration::from_secs(10),
            }
        }

        fn validate(&self, params: &Params) -> Result<()> {
            if params.contains_key("bad") {
                return Err(StagehandError::validation("bad", "not allowed"));
            }
            Ok(())
        }

        async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if action.params.contains_key("fast") {
                return Ok(ExecutionResult::ok());
            }
            if action.params.contains_key("panic") {
                panic!("executor blew up");
            }
            if let Some(name) = action.params.get("terminal").and_then(|v| v.as_str()) {
                ctx.host.create_terminal(name, None).await?;
                ctx.cancel.cancelled().await;
                return Ok(ExecutionResult::ok_with_undo(UndoOp::DisposeTerminal {
                    name: name.to_string(),
                }));
            }
            ctx.cancel.cancelled().await;
            self.saw_cancel.fetch_add(1, Ordering::SeqCst);
            Ok(ExecutionResult::ok())
        }
    }

    fn setup(recorder: Recorder) -> (Arc<Recorder>, ExecutionContext) {
        let recorder = Arc::new(recorder);
        let mut registry = Registry::new();
        registry.register(recorder.clone());
        let ctx = ExecutionContext::new(Arc::new(Workbench::in_memory()), Arc::new(registry));
        (recorder, ctx)
    }

    fn host_command(params: serde_json::Value) -> Action {
        Action::new(
            ActionType::HostCommand,
            params.as_object().cloned().unwrap(),
            0,
        )
    }

    #[tokio::test]
    async fn unknown_type_is_a_failure_result() {
        let (_recorder, ctx) = setup(Recorder::default());
        let mut action = Action::new(
            ActionType::FileOpen,
            json!({ "path": "a.rs" }).as_object().cloned().unwrap(),
            0,
        );
        let result = Pipeline::new()
            .execute(&mut action, &ctx, &ExecuteOptions::default())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("unknown action type: file.open"));
        assert_eq!(result.action_type, Some(ActionType::FileOpen));
        assert_eq!(result.target.as_deref(), Some("a.rs"));
        assert_eq!(action.status, ActionStatus::Failed);
    }

    #[tokio::test]
    async fn trust_gate_never_invokes_the_executor() {
        let (recorder, ctx) = setup(Recorder {
            requires_trust: true,
            ..Recorder::default()
        });
        let ctx = ctx.with_trusted(false);
        let mut action = host_command(json!({ "id": "x", "fast": true }));
        let result = Pipeline::new()
            .execute(&mut action, &ctx, &ExecuteOptions::default())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("requires a trusted workspace"));
        assert_eq!(result.target.as_deref(), Some("x"));
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn trust_gate_can_be_bypassed_explicitly() {
        let (recorder, ctx) = setup(Recorder {
            requires_trust: true,
            ..Recorder::default()
        });
        let ctx = ctx.with_trusted(false);
        let options = ExecuteOptions {
            skip_trust_check: true,
            ..ExecuteOptions::default()
        };
        let mut action = host_command(json!({ "id": "x", "fast": true }));
        let result = Pipeline::new().execute(&mut action, &ctx, &options).await;
        assert!(result.success);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn validation_failure_is_converted_not_thrown() {
        let (recorder, ctx) = setup(Recorder::default());
        let mut action = host_command(json!({ "bad": 1 }));
        let result = Pipeline::new()
            .execute(&mut action, &ctx, &ExecuteOptions::default())
            .await;
        assert_eq!(
            result.error.as_deref(),
            Some("invalid parameter 'bad': not allowed")
        );
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn never_settling_executor_times_out_once_and_is_signalled() {
        let (recorder, ctx) = setup(Recorder::default());
        let options = ExecuteOptions {
            timeout: Some(Duration::from_millis(50)),
            ..ExecuteOptions::default()
        };
        let mut action = host_command(json!({ "id": "hang" }));
        let started = Instant::now();
        let result = Pipeline::new().execute(&mut action, &ctx, &options).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!result.success);
        assert!(result.timed_out);
        assert_eq!(result.error.as_deref(), Some("Action timed out after 50ms"));
        assert_eq!(action.status, ActionStatus::Timeout);
        assert!(!action.transition(ActionStatus::Success));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.saw_cancel.load(Ordering::SeqCst), 1);
        assert!(!ctx.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn work_finished_after_a_timeout_is_undone() {
        let wb = Arc::new(Workbench::in_memory());
        let mut registry = Registry::new();
        registry.register(Arc::new(Recorder::default()));
        let ctx = ExecutionContext::new(wb.clone(), Arc::new(registry));
        ctx.snapshots.track_terminal("late", None);

        let options = ExecuteOptions {
            timeout: Some(Duration::from_millis(30)),
            ..ExecuteOptions::default()
        };
        let mut action = host_command(json!({ "terminal": "late" }));
        let result = Pipeline::new().execute(&mut action, &ctx, &options).await;

        assert!(result.timed_out);
        assert!(!result.can_undo);
        assert!(wb.terminal("late").is_none());
        assert!(ctx.snapshots.capture(0, "after").await.terminals.is_empty());
    }

    #[tokio::test]
    async fn panics_become_failures() {
        let (_recorder, ctx) = setup(Recorder::default());
        let mut action = host_command(json!({ "panic": true }));
        let result = Pipeline::new()
            .execute(&mut action, &ctx, &ExecuteOptions::default())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("executor panicked"));
    }

    #[tokio::test]
    async fn cancelled_context_does_not_start() {
        let (recorder, ctx) = setup(Recorder::default());
        ctx.cancel.cancel();
        let mut action = host_command(json!({ "fast": true }));
        let result = Pipeline::new()
            .execute(&mut action, &ctx, &ExecuteOptions::default())
            .await;
        assert!(result.error.unwrap().starts_with("cancelled"));
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn budget_precedence() {
        let mut config = EngineConfig::default();
        config.timeouts.insert("file.open".into(), 1234);
        let pipeline = Pipeline::from_config(&config);
        let registry = {
            let mut r = Registry::new();
            for e in builtins() {
                r.register(e);
            }
            r
        };
        let open = registry.get(ActionType::FileOpen).unwrap().descriptor();
        let seq = registry.get(ActionType::Sequence).unwrap().descriptor();

        assert_eq!(
            pipeline.budget_for(&open, &ExecuteOptions::default()),
            Duration::from_millis(1234)
        );
        assert_eq!(
            pipeline.budget_for(&seq, &ExecuteOptions::default()),
            Duration::from_secs(120)
        );
        let options = ExecuteOptions {
            timeout: Some(Duration::from_millis(7)),
            ..ExecuteOptions::default()
        };
        assert_eq!(pipeline.budget_for(&open, &options), Duration::from_millis(7));

        let mut zero = seq.clone();
        zero.default_timeout = Duration::ZERO;
        assert_eq!(
            pipeline.budget_for(&zero, &ExecuteOptions::default()),
            Duration::from_secs(30)
        );
    }

    #[tokio::test]
    async fn end_to_end_with_builtins() {
        let wb = Arc::new(Workbench::in_memory());
        let ctx = ExecutionContext::new(wb.clone(), Arc::new(Registry::with_builtins()));
        let mut action = Action::new(
            ActionType::FileOpen,
            json!({ "path": "README.md" }).as_object().cloned().unwrap(),
            4,
        );
        let result = Pipeline::new()
            .execute(&mut action, &ctx, &ExecuteOptions::default())
            .await;
        assert!(result.success);
        assert!(result.can_undo);
        assert_eq!(action.status, ActionStatus::Success);
        assert!(action.started_at.is_some() && action.completed_at.is_some());
        assert_eq!(wb.documents().len(), 1);
    }
}
