use agent_stream::ChannelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported synthetic id strategy '{value}' (expected 'random' or 'derived')")]
    InvalidSyntheticIds { value: String },
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to dispatch turn: {0}")]
    Dispatch(#[from] ChannelError),
}

/// Failure reported by the notification collaborator. Never escalated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification failed: {message}")]
pub struct NotifyError {
    message: String,
}

impl NotifyError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
