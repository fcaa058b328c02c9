use crate::error::ErrorCode;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    InternalError { message: String },

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

impl ProcessError {
    /// Registry code used when this error is lifted into a `PipelineError`
    pub fn error_code(&self) -> u16 {
        match self {
            ProcessError::CommandNotFound(_) => ErrorCode::EXEC_COMMAND_NOT_FOUND,
            ProcessError::Timeout(_) => ErrorCode::EXEC_TIMEOUT,
            ProcessError::SpawnFailed { .. } | ProcessError::Io(_) => ErrorCode::EXEC_SPAWN_FAILED,
            ProcessError::InternalError { .. } | ProcessError::MockExpectationNotMet(_) => {
                ErrorCode::EXEC_GENERIC
            }
        }
    }
}
