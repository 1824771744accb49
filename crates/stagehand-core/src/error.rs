use thiserror::Error;

#[derive(Debug, Error)]
pub enum StagehandError {
    #[error("unknown action type: {0}")]
    UnknownAction(String),

    #[error("invalid parameter '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("action '{0}' requires a trusted workspace")]
    TrustDenied(String),

    #[error("action timed out after {0}ms")]
    Timeout(u64),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("scene '{0}' is authored by the deck and cannot be modified")]
    SceneReadOnly(String),

    #[error("scene limit reached: at most {0} saved scenes are allowed")]
    SceneLimitReached(usize),

    #[error("scene not found: {0}")]
    SceneNotFound(String),

    #[error("host error: {0}")]
    Host(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StagehandError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }
}

pub type Result<T> = std::result::Result<T, StagehandError>;
