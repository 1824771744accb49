//! Executors: one implementation per [`ActionType`].
//!
//! An executor validates its raw parameters into a typed schema and performs
//! one operation against the [`Host`] carried by the [`ExecutionContext`],
//! returning an [`ExecutionResult`] with an optional [`UndoOp`].
//!
//! [`UndoOp`]: crate::undo::UndoOp

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::action::{Action, Params};
use crate::cancel::CancellationToken;
use crate::config::SequenceConfig;
use crate::error::{Result, StagehandError};
use crate::host::Host;
use crate::registry::Registry;
use crate::result::ExecutionResult;
use crate::snapshot::SnapshotFactory;
use crate::types::ActionType;

pub mod debug;
pub mod file_open;
pub mod highlight;
pub mod host_command;
pub mod sequence;
pub mod steps;
pub mod terminal;
pub mod validate;

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorDescriptor {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub description: &'static str,
    pub requires_trust: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub default_timeout: Duration,
}

fn serialize_millis<S: serde::Serializer>(
    d: &Duration,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[async_trait]
pub trait Executor: Send + Sync {
    fn descriptor(&self) -> ExecutorDescriptor;

    /// Check `params` against this executor's schema without side effects.
    fn validate(&self, params: &Params) -> Result<()>;

    /// Perform the operation. An `Err` is reported as a failed result by
    /// the caller; executors never need to catch their own errors.
    async fn execute(&self, action: &Action, ctx: &ExecutionContext) -> Result<ExecutionResult>;
}

/// Every built-in executor, in registration order.
pub fn builtins() -> Vec<Arc<dyn Executor>> {
    vec![
        Arc::new(file_open::FileOpenExecutor),
        Arc::new(highlight::HighlightExecutor),
        Arc::new(terminal::TerminalRunExecutor),
        Arc::new(debug::DebugStartExecutor),
        Arc::new(host_command::HostCommandExecutor),
        Arc::new(sequence::SequenceExecutor),
        Arc::new(validate::ValidateCommandExecutor),
        Arc::new(validate::ValidateFileExecutor),
        Arc::new(validate::ValidatePortExecutor),
    ]
}

/// Self-check used by trust-requiring executors, so steps run inside a
/// sequence are gated even though they bypass the pipeline.
pub fn require_trust(descriptor: &ExecutorDescriptor, ctx: &ExecutionContext) -> Result<()> {
    if descriptor.requires_trust && !ctx.trusted {
        return Err(StagehandError::TrustDenied(
            descriptor.action_type.to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Everything an executor may touch during one run. Cheap to clone.
#[derive(Clone)]
pub struct ExecutionContext {
    pub host: Arc<dyn Host>,
    pub registry: Arc<Registry>,
    pub snapshots: Arc<SnapshotFactory>,
    pub trusted: bool,
    pub slide_index: usize,
    pub cancel: CancellationToken,
    /// Budget granted by the pipeline for the current run, if any.
    pub budget: Option<Duration>,
    pub sequence: SequenceConfig,
}

impl ExecutionContext {
    /// A context whose trust posture is read from the host.
    pub fn new(host: Arc<dyn Host>, registry: Arc<Registry>) -> Self {
        let snapshots = Arc::new(SnapshotFactory::new(host.clone()));
        Self {
            trusted: host.is_trusted(),
            host,
            registry,
            snapshots,
            slide_index: 0,
            cancel: CancellationToken::new(),
            budget: None,
            sequence: SequenceConfig::default(),
        }
    }

    pub fn with_snapshots(mut self, snapshots: Arc<SnapshotFactory>) -> Self {
        self.snapshots = snapshots;
        self
    }

    pub fn with_trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    pub fn with_slide(mut self, slide_index: usize) -> Self {
        self.slide_index = slide_index;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_sequence_defaults(mut self, sequence: SequenceConfig) -> Self {
        self.sequence = sequence;
        self
    }

    /// The run budget, or `fallback` outside a pipeline.
    pub fn budget_or(&self, fallback: Duration) -> Duration {
        self.budget.unwrap_or(fallback)
    }
}
