use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ActionType
// ---------------------------------------------------------------------------

/// The closed set of operations a slide can embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionType {
    #[serde(rename = "file.open")]
    FileOpen,
    #[serde(rename = "editor.highlight")]
    EditorHighlight,
    #[serde(rename = "terminal.run")]
    TerminalRun,
    #[serde(rename = "debug.start")]
    DebugStart,
    #[serde(rename = "host.command", alias = "vscode.command")]
    HostCommand,
    #[serde(rename = "sequence")]
    Sequence,
    #[serde(rename = "validate.command")]
    ValidateCommand,
    #[serde(rename = "validate.file")]
    ValidateFile,
    #[serde(rename = "validate.port")]
    ValidatePort,
}

impl ActionType {
    pub fn all() -> &'static [ActionType] {
        &[
            ActionType::FileOpen,
            ActionType::EditorHighlight,
            ActionType::TerminalRun,
            ActionType::DebugStart,
            ActionType::HostCommand,
            ActionType::Sequence,
            ActionType::ValidateCommand,
            ActionType::ValidateFile,
            ActionType::ValidatePort,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::FileOpen => "file.open",
            ActionType::EditorHighlight => "editor.highlight",
            ActionType::TerminalRun => "terminal.run",
            ActionType::DebugStart => "debug.start",
            ActionType::HostCommand => "host.command",
            ActionType::Sequence => "sequence",
            ActionType::ValidateCommand => "validate.command",
            ActionType::ValidateFile => "validate.file",
            ActionType::ValidatePort => "validate.port",
        }
    }

    /// Validation-style checks report on the environment and never need undo.
    pub fn is_check(self) -> bool {
        matches!(
            self,
            ActionType::ValidateCommand | ActionType::ValidateFile | ActionType::ValidatePort
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = crate::error::StagehandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "file.open" => Ok(ActionType::FileOpen),
            "editor.highlight" => Ok(ActionType::EditorHighlight),
            "terminal.run" => Ok(ActionType::TerminalRun),
            "debug.start" => Ok(ActionType::DebugStart),
            "host.command" | "vscode.command" => Ok(ActionType::HostCommand),
            "sequence" => Ok(ActionType::Sequence),
            "validate.command" => Ok(ActionType::ValidateCommand),
            "validate.file" => Ok(ActionType::ValidateFile),
            "validate.port" => Ok(ActionType::ValidatePort),
            other => Err(crate::error::StagehandError::UnknownAction(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of an action.
///
/// Transitions: `Pending → Running → Success | Failed | Timeout`.
/// Terminal states are one-shot; a retry is always a new `Action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Timeout,
}

impl ActionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionStatus::Success | ActionStatus::Failed | ActionStatus::Timeout
        )
    }

    pub fn can_transition_to(self, next: ActionStatus) -> bool {
        match (self, next) {
            (ActionStatus::Pending, ActionStatus::Running) => true,
            // An action can fail before it ever runs (unknown type, trust, validation).
            (ActionStatus::Pending, ActionStatus::Failed) => true,
            (ActionStatus::Running, n) => n.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Running => "running",
            ActionStatus::Success => "success",
            ActionStatus::Failed => "failed",
            ActionStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
