//! The `Action` value: one requested operation, created fresh per invocation.
//!
//! Actions are never persisted or reused. A retry, and every step of a
//! sequence, gets its own `Action` with its own id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ActionStatus, ActionType};

/// String-keyed parameter map whose shape depends on the action type.
pub type Params = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub action_type: ActionType,
    pub params: Params,
    pub status: ActionStatus,
    /// Index of the slide that owns this action.
    pub slide_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Action {
    /// Create a new action in `Pending` state.
    pub fn new(action_type: ActionType, params: Params, slide_index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type,
            params,
            status: ActionStatus::Pending,
            slide_index,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Move to `next` if the lifecycle allows it. Returns false (and leaves
    /// the action untouched) for an illegal transition.
    pub fn transition(&mut self, next: ActionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                action = %self.action_type,
                id = %self.id,
                from = %self.status,
                to = %next,
                "ignoring illegal action status transition"
            );
            return false;
        }
        let now = Utc::now();
        if next == ActionStatus::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = next;
        true
    }

    /// Mark the action terminal with an error message.
    pub fn fail(&mut self, status: ActionStatus, error: impl Into<String>) -> bool {
        if self.transition(status) {
            self.error = Some(error.into());
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_actions_get_unique_ids() {
        let a = Action::new(ActionType::FileOpen, Params::new(), 0);
        let b = Action::new(ActionType::FileOpen, Params::new(), 0);
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, ActionStatus::Pending);
    }

    #[test]
    fn lifecycle_stamps_timestamps() {
        let mut action = Action::new(ActionType::ValidateFile, Params::new(), 3);
        assert!(action.transition(ActionStatus::Running));
        assert!(action.started_at.is_some());
        assert!(action.completed_at.is_none());
        assert!(action.transition(ActionStatus::Success));
        assert!(action.completed_at.is_some());
    }

    #[test]
    fn terminal_action_cannot_be_restarted() {
        let mut action = Action::new(ActionType::ValidateFile, Params::new(), 0);
        action.transition(ActionStatus::Running);
        assert!(action.fail(ActionStatus::Timeout, "too slow"));
        assert!(!action.transition(ActionStatus::Running));
        assert!(!action.fail(ActionStatus::Failed, "again"));
        assert_eq!(action.status, ActionStatus::Timeout);
        assert_eq!(action.error.as_deref(), Some("too slow"));
    }
}
