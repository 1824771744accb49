//! Composite executor: runs an ordered list of steps as one action.
//!
//! Steps run strictly in order. Each step is resolved, validated and
//! executed directly (not through the pipeline), so every leaf executor
//! performs its own trust check. When a step fails under `stopOnError`, or
//! the run is cancelled, the undos collected so far are applied in reverse
//! and the remaining steps are reported as skipped.

use async_trait::async_trait;
use std::time::Duration;

use super::steps::{canonicalize, StepSpec};
use super::{ExecutionContext, Executor, ExecutorDescriptor};
use crate::action::{Action, Params};
use crate::error::{Result, StagehandError};
use crate::params::{parse, target_for, SequenceParams};
use crate::result::{ExecutionResult, SequenceReport, StepReport, StepStatus};
use crate::types::{ActionStatus, ActionType};
use crate::undo::UndoOp;

pub struct SequenceExecutor;

#[async_trait]
impl Executor for SequenceExecutor {
    fn descriptor(&self) -> ExecutorDescriptor {
        ExecutorDescriptor {
            action_type: ActionType::Sequence,
            description: "Run a list of actions in order, rolling back on failure",
            requires_trust: false,
            default_timeout: Duration::from_secs(120),
        }
    }

    fn validate(&self, params: &Params) -> Result<()> {
        parse::<SequenceParams>(params).map(|_| ())
    }

    async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let p: SequenceParams = parse(&action.params)?;
        let steps = canonicalize(&p.steps)?;
        let options = RunOptions {
            delay: Duration::from_millis(p.delay.unwrap_or(ctx.sequence.delay_ms)),
            stop_on_error: p.stop_on_error.unwrap_or(ctx.sequence.stop_on_error),
        };
        Ok(run(&steps, options, ctx).await)
    }
}

#[derive(Debug, Clone, Copy)]
struct RunOptions {
    delay: Duration,
    stop_on_error: bool,
}

fn report_for(spec: &StepSpec) -> StepReport {
    let target = spec
        .action_type
        .parse::<ActionType>()
        .ok()
        .and_then(|t| target_for(t, &spec.params));
    StepReport {
        action_type: spec.action_type.clone(),
        target,
        status: StepStatus::Skipped,
        error: None,
    }
}

/// Run one step. `Err` carries the message reported for the step.
async fn run_step(
    spec: &StepSpec,
    ctx: &ExecutionContext,
) -> std::result::Result<Option<UndoOp>, String> {
    let executor = ctx.registry.resolve(&spec.action_type).map_err(|e| e.to_string())?;
    executor.validate(&spec.params).map_err(|e| e.to_string())?;

    let mut step = Action::new(
        executor.descriptor().action_type,
        spec.params.clone(),
        ctx.slide_index,
    );
    step.transition(ActionStatus::Running);
    let outcome = executor
        .execute(&step, ctx)
        .await
        .unwrap_or_else(|e| ExecutionResult::failure(e.to_string()));

    if outcome.success {
        step.transition(ActionStatus::Success);
        Ok(outcome.undo)
    } else {
        let message = outcome
            .error
            .unwrap_or_else(|| "step failed".to_string());
        step.fail(ActionStatus::Failed, message.clone());
        Err(message)
    }
}

async fn rollback(ctx: &ExecutionContext, undos: Vec<UndoOp>) {
    for op in undos.into_iter().rev() {
        if let Err(e) = ctx.snapshots.apply_undo(&op).await {
            tracing::warn!(undo = %op.describe(), error = %e, "rollback step failed; continuing");
        }
    }
}

/// Sleep between steps, waking early if the run is cancelled.
async fn pause(delay: Duration, ctx: &ExecutionContext) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = ctx.cancel.cancelled() => {}
    }
}

async fn run(steps: &[StepSpec], options: RunOptions, ctx: &ExecutionContext) -> ExecutionResult {
    let total = steps.len();
    let mut reports: Vec<StepReport> = steps.iter().map(report_for).collect();
    let mut undos: Vec<UndoOp> = Vec::new();
    let mut failures = 0usize;
    let mut skipped = 0usize;
    let mut stopped: Option<(usize, String)> = None;

    for (i, spec) in steps.iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            tracing::info!(step = i + 1, total, "sequence cancelled; rolling back");
            rollback(ctx, std::mem::take(&mut undos)).await;
            stopped = Some((i, format!("Sequence cancelled before step {}", i + 1)));
            break;
        }

        tracing::debug!(step = i + 1, total, action = %spec.action_type, "running sequence step");
        match run_step(spec, ctx).await {
            Ok(undo) => {
                reports[i].status = StepStatus::Success;
                undos.extend(undo);
            }
            Err(message) => {
                reports[i].status = StepStatus::Failed;
                reports[i].error = Some(message.clone());

                let unknown = ctx.registry.resolve(&spec.action_type).is_err();
                if options.stop_on_error {
                    tracing::warn!(step = i + 1, action = %spec.action_type, error = %message, "sequence step failed; rolling back");
                    rollback(ctx, std::mem::take(&mut undos)).await;
                    stopped = Some((
                        i,
                        format!("Step {} ({}) failed: {message}", i + 1, spec.action_type),
                    ));
                    break;
                }
                if unknown {
                    reports[i].status = StepStatus::Skipped;
                    skipped += 1;
                } else {
                    failures += 1;
                }
                tracing::warn!(step = i + 1, action = %spec.action_type, error = %message, "sequence step failed; continuing");
            }
        }

        if i + 1 < total && !options.delay.is_zero() {
            pause(options.delay, ctx).await;
        }
    }

    let report = |failed: Option<usize>, reports: Vec<StepReport>| SequenceReport {
        total_steps: total,
        failed_index: failed,
        failed_type: failed.map(|i| steps[i].action_type.clone()),
        steps: reports,
    };

    let composite = (!undos.is_empty()).then(|| UndoOp::reversing(undos));
    let result = match stopped {
        Some((index, message)) => {
            ExecutionResult::failure(message).with_sequence(report(Some(index), reports))
        }
        None if failures > 0 || skipped > 0 => {
            let first = reports.iter().position(|r| r.status == StepStatus::Failed);
            let message = match (failures, skipped) {
                (0, s) => format!("{s} of {total} steps skipped"),
                (f, 0) => format!("{f} of {total} steps failed"),
                (f, s) => format!("{f} of {total} steps failed, {s} skipped"),
            };
            ExecutionResult::failure(message).with_sequence(report(first, reports))
        }
        None => ExecutionResult::ok().with_sequence(report(None, reports)),
    };
    match composite {
        Some(undo) => ExecutionResult {
            can_undo: true,
            undo: Some(undo),
            ..result
        },
        None => result,
    }
}

/// Resolve and validate every step without running anything.
pub fn check_steps(steps: &[StepSpec], ctx: &ExecutionContext) -> Vec<(usize, StagehandError)> {
    steps
        .iter()
        .enumerate()
        .filter_map(|(i, spec)| {
            ctx.registry
                .resolve(&spec.action_type)
                .and_then(|executor| executor.validate(&spec.params))
                .err()
                .map(|e| (i, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::testing::action;
    use crate::executors::{builtins, ExecutionContext};
    use crate::registry::Registry;
    use crate::workbench::Workbench;
    use serde_json::json;
    use std::sync::Arc;

    /// Fails with `"boom"` whenever `fail: true` is set; otherwise opens a
    /// terminal named after `name` so its undo is observable.
    struct Flaky;

    #[async_trait]
    impl Executor for Flaky {
        fn descriptor(&self) -> ExecutorDescriptor {
            ExecutorDescriptor {
                action_type: ActionType::DebugStart,
                description: "test step",
                requires_trust: false,
                default_timeout: Duration::from_secs(1),
            }
        }

        fn validate(&self, _params: &Params) -> Result<()> {
            Ok(())
        }

        async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
            if action.params.get("fail") == Some(&json!(true)) {
                return Err(StagehandError::host("boom"));
            }
            let name = action
                .params
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("step")
                .to_string();
            ctx.host.create_terminal(&name, None).await?;
            Ok(ExecutionResult::ok_with_undo(UndoOp::DisposeTerminal { name }))
        }
    }

    /// Cancels the surrounding run, then succeeds.
    struct Canceller;

    #[async_trait]
    impl Executor for Canceller {
        fn descriptor(&self) -> ExecutorDescriptor {
            ExecutorDescriptor {
                action_type: ActionType::ValidateFile,
                description: "test step",
                requires_trust: false,
                default_timeout: Duration::from_secs(1),
            }
        }

        fn validate(&self, _params: &Params) -> Result<()> {
            Ok(())
        }

        async fn execute(&self, _action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult> {
            ctx.cancel.cancel();
            Ok(ExecutionResult::ok())
        }
    }

    fn setup() -> (Arc<Workbench>, ExecutionContext) {
        let wb = Arc::new(Workbench::in_memory());
        let mut registry = Registry::new();
        for executor in builtins() {
            registry.register(executor);
        }
        registry.register(Arc::new(Flaky));
        registry.register(Arc::new(Canceller));
        let ctx = ExecutionContext::new(wb.clone(), Arc::new(registry));
        (wb, ctx)
    }

    async fn run_sequence(ctx: &ExecutionContext, value: serde_json::Value) -> ExecutionResult {
        SequenceExecutor
            .execute(&action(ActionType::Sequence, value), ctx)
            .await
            .unwrap()
    }

    fn disposals(wb: &Workbench) -> Vec<String> {
        wb.journal()
            .into_iter()
            .filter(|e| e.starts_with("dispose_terminal:"))
            .collect()
    }

    #[tokio::test]
    async fn all_steps_succeed_and_composite_undo_reverses() {
        let (wb, ctx) = setup();
        let result = run_sequence(
            &ctx,
            json!({
                "delay": 0,
                "steps": [
                    { "type": "debug.start", "name": "one" },
                    { "type": "debug.start", "name": "two" },
                    { "type": "debug.start", "name": "three" },
                ]
            }),
        )
        .await;

        assert!(result.success, "{:?}", result.error);
        let report = result.sequence.as_ref().unwrap();
        assert_eq!(report.statuses(), vec![StepStatus::Success; 3]);
        assert!(report.failed_index.is_none());
        assert!(disposals(&wb).is_empty());

        crate::undo::apply(wb.as_ref(), result.undo.as_ref().unwrap())
            .await
            .unwrap();
        assert_eq!(
            disposals(&wb),
            vec![
                "dispose_terminal:three",
                "dispose_terminal:two",
                "dispose_terminal:one"
            ]
        );
    }

    #[tokio::test]
    async fn failure_rolls_back_completed_steps_once() {
        let (wb, ctx) = setup();
        let result = run_sequence(
            &ctx,
            json!({
                "delay": 0,
                "stopOnError": true,
                "steps": [
                    { "type": "debug.start", "name": "one" },
                    { "type": "debug.start", "fail": true },
                    { "type": "debug.start", "name": "three" },
                ]
            }),
        )
        .await;

        assert!(!result.success);
        let error = result.error.as_deref().unwrap();
        assert!(error.contains("Step 2"), "{error}");
        assert!(error.contains("boom"));
        let report = result.sequence.as_ref().unwrap();
        assert_eq!(
            report.statuses(),
            vec![StepStatus::Success, StepStatus::Failed, StepStatus::Skipped]
        );
        assert_eq!(report.failed_index, Some(1));
        assert_eq!(report.failed_type.as_deref(), Some("debug.start"));
        assert_eq!(report.steps[1].error.as_deref(), Some("host error: boom"));
        assert_eq!(disposals(&wb), vec!["dispose_terminal:one"]);
        assert!(!result.can_undo);
        assert!(wb.terminal("three").is_none());
    }

    #[tokio::test]
    async fn cancellation_skips_remaining_steps() {
        let (wb, ctx) = setup();
        let result = run_sequence(
            &ctx,
            json!({
                "delay": 0,
                "steps": [
                    { "type": "validate.file", "path": "x" },
                    { "type": "debug.start", "name": "two" },
                    { "type": "debug.start", "name": "three" },
                    { "type": "debug.start", "name": "four" },
                ]
            }),
        )
        .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("cancelled before step 2"));
        let report = result.sequence.unwrap();
        assert_eq!(report.steps.len(), 4);
        assert_eq!(
            report.statuses(),
            vec![
                StepStatus::Success,
                StepStatus::Skipped,
                StepStatus::Skipped,
                StepStatus::Skipped
            ]
        );
        assert!(wb.terminal("two").is_none());
    }

    #[tokio::test]
    async fn unknown_step_type_aborts_under_stop_on_error() {
        let (_wb, ctx) = setup();
        let result = run_sequence(
            &ctx,
            json!({ "delay": 0, "steps": "debug.start?name=a,slide.zoom?level=2,debug.start?name=b" }),
        )
        .await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Step 2 (slide.zoom) failed"));
        assert_eq!(
            result.sequence.unwrap().statuses(),
            vec![StepStatus::Success, StepStatus::Failed, StepStatus::Skipped]
        );
    }

    #[tokio::test]
    async fn continue_on_error_runs_everything_and_keeps_undo() {
        let (wb, ctx) = setup();
        let result = run_sequence(
            &ctx,
            json!({
                "delay": 0,
                "stopOnError": false,
                "steps": [
                    { "type": "slide.zoom" },
                    { "type": "debug.start", "fail": true },
                    { "type": "debug.start", "name": "three" },
                ]
            }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("1 of 3 steps failed, 1 skipped"));
        let report = result.sequence.as_ref().unwrap();
        assert_eq!(
            report.statuses(),
            vec![StepStatus::Skipped, StepStatus::Failed, StepStatus::Success]
        );
        assert_eq!(report.failed_index, Some(1));
        assert!(result.can_undo);
        assert!(wb.terminal("three").is_some());
    }

    #[tokio::test]
    async fn unknown_steps_alone_are_reported_as_skipped() {
        let (_wb, ctx) = setup();
        let result = run_sequence(
            &ctx,
            json!({ "delay": 0, "stopOnError": false, "steps": "slide.zoom,debug.start?name=a" }),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("1 of 2 steps skipped"));
        assert_eq!(result.sequence.unwrap().failed_index, None);
    }

    #[tokio::test]
    async fn cancellation_rolls_back_completed_steps() {
        let (wb, ctx) = setup();
        let result = run_sequence(
            &ctx,
            json!({
                "delay": 0,
                "steps": [
                    { "type": "debug.start", "name": "one" },
                    { "type": "validate.file", "path": "x" },
                    { "type": "debug.start", "name": "three" },
                ]
            }),
        )
        .await;
        assert!(!result.success);
        assert!(!result.can_undo);
        assert_eq!(disposals(&wb), vec!["dispose_terminal:one"]);
        assert!(wb.terminal("three").is_none());
    }

    #[tokio::test]
    async fn outer_timeout_interrupts_the_delay_and_rolls_back() {
        let (wb, ctx) = setup();
        let options = crate::pipeline::ExecuteOptions {
            timeout: Some(Duration::from_millis(40)),
            ..Default::default()
        };
        let mut sequence = action(
            ActionType::Sequence,
            json!({ "delay": 10_000, "steps": "debug.start?name=one,debug.start?name=two" }),
        );
        let started = std::time::Instant::now();
        let result = crate::pipeline::Pipeline::new()
            .execute(&mut sequence, &ctx, &options)
            .await;

        assert!(result.timed_out);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(disposals(&wb), vec!["dispose_terminal:one"]);
        assert!(wb.terminal("two").is_none());
    }

    #[tokio::test]
    async fn leaf_trust_checks_apply_inside_sequences() {
        let wb = Arc::new(Workbench::in_memory());
        let ctx = ExecutionContext::new(wb.clone(), Arc::new(Registry::with_builtins()))
            .with_trusted(false);
        let result = run_sequence(
            &ctx,
            json!({ "delay": 0, "steps": [{ "type": "terminal.run", "command": "ls" }] }),
        )
        .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("requires a trusted workspace"));
        assert!(wb.terminal("Stagehand").is_none());
    }

    #[tokio::test]
    async fn delay_is_inserted_between_steps_only() {
        let (_wb, ctx) = setup();
        let started = std::time::Instant::now();
        let result = run_sequence(
            &ctx,
            json!({ "delay": 60, "steps": "debug.start?name=a,debug.start?name=b" }),
        )
        .await;
        assert!(result.success);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(60));
        assert!(elapsed < Duration::from_millis(120 + 500));
    }

    #[test]
    fn check_steps_reports_every_bad_step() {
        let (_wb, ctx) = setup();
        let specs = canonicalize(&json!([
            { "type": "file.open" },
            { "type": "validate.port", "port": 80 },
            { "type": "nope" },
        ]))
        .unwrap();
        let problems = check_steps(&specs, &ctx);
        let indices: Vec<_> = problems.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
