//! Output shapes consumed by the reporting layer: `ExecutionResult` and the
//! structured per-step breakdown produced by sequences.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ActionType;
use crate::undo::UndoOp;

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub can_undo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undo: Option<UndoOp>,
    pub duration_ms: u64,
    /// True when the pipeline stopped waiting because the budget elapsed.
    #[serde(default)]
    pub timed_out: bool,
    /// Originating action type, stamped on failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    /// File path, command text, config name, command id or `host:port`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Captured text from validation checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<SequenceReport>,
}

impl ExecutionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            can_undo: false,
            undo: None,
            duration_ms: 0,
            timed_out: false,
            action_type: None,
            target: None,
            output: None,
            sequence: None,
        }
    }

    pub fn ok_with_undo(undo: UndoOp) -> Self {
        Self {
            can_undo: true,
            undo: Some(undo),
            ..Self::ok()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::ok()
        }
    }

    pub fn timeout(budget_ms: u64) -> Self {
        Self {
            timed_out: true,
            ..Self::failure(format!("Action timed out after {budget_ms}ms"))
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_sequence(mut self, report: SequenceReport) -> Self {
        self.sequence = Some(report);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Stamp a failure with its action type and target for display.
    /// Successful results are returned unchanged.
    pub fn enrich(mut self, action_type: ActionType, target: Option<String>) -> Self {
        if !self.success {
            self.action_type.get_or_insert(action_type);
            if self.target.is_none() {
                self.target = target;
            }
        }
        self
    }

    /// Timeouts and sequence failures stay on screen until dismissed; a
    /// simple single-action failure may auto-dismiss.
    pub fn is_persistent_failure(&self) -> bool {
        !self.success && (self.timed_out || self.sequence.is_some())
    }
}

// ---------------------------------------------------------------------------
// SequenceReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    /// The step's type as written in the deck; may be unknown.
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceReport {
    pub total_steps: usize,
    /// Zero-based index of the step that stopped the sequence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_type: Option<String>,
    pub steps: Vec<StepReport>,
}

impl SequenceReport {
    pub fn statuses(&self) -> Vec<StepStatus> {
        self.steps.iter().map(|s| s.status).collect()
    }
}
