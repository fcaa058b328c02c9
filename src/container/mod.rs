//! Execution substrates for pipeline steps
//!
//! Steps run either directly on the host or inside one long-lived container.
//! Both implement [`ExecutionEnvironment`] with the same contract: blocking
//! execution, combined output appended to the session log, and an error
//! carrying the exit status when the tool fails.

pub mod docker;
pub mod host;

pub use docker::{ContainerHandle, ContainerSession, ContainerSettings, ContainerState, VolumeMount};
pub use host::HostEnvironment;

use crate::error::{ErrorCode, PipelineError, Result};
use crate::session::PathSet;
use crate::subprocess::{ExitStatus, OutputMode, ProcessError};
use async_trait::async_trait;

#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    /// Short description for banners and logs
    fn describe(&self) -> String;

    /// Whether tool paths are checked against the host filesystem
    fn runs_on_host(&self) -> bool;

    /// Acquire whatever the steps run in; called once before the first step
    async fn prepare(&mut self, paths: &PathSet) -> Result<()>;

    /// Run one resolved command to completion
    async fn execute(&self, step: &str, tokens: &[String], output: OutputMode) -> Result<()>;

    /// Release resources acquired by `prepare`; calling it again is a no-op
    async fn teardown(&mut self);
}

/// Map a finished process status onto the step contract
pub(crate) fn check_status(step: &str, command: &str, status: &ExitStatus) -> Result<()> {
    match status {
        ExitStatus::Success => Ok(()),
        ExitStatus::Error(code) => Err(PipelineError::step_execution(
            ErrorCode::EXEC_SUBPROCESS_FAILED,
            step,
            command,
            format!("external tool exited with {}", status),
        )
        .with_exit_code(*code)),
        ExitStatus::Signal(_) => Err(PipelineError::step_execution(
            ErrorCode::EXEC_SIGNAL_RECEIVED,
            step,
            command,
            format!("external tool was {}", status),
        )),
        ExitStatus::Timeout => Err(PipelineError::step_execution(
            ErrorCode::EXEC_TIMEOUT,
            step,
            command,
            "external tool timed out",
        )),
    }
}

/// Lift a process-layer failure into a step execution error
pub(crate) fn step_error(step: &str, command: &str, error: ProcessError) -> PipelineError {
    let message = match &error {
        ProcessError::CommandNotFound(program) => format!("command not found: {}", program),
        other => format!("could not run external tool: {}", other),
    };
    PipelineError::step_execution(error.error_code(), step, command, message).with_source(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status_carries_exit_code() {
        assert!(check_status("s", "true", &ExitStatus::Success).is_ok());

        let err = check_status("sfm", "false", &ExitStatus::Error(1)).unwrap_err();
        assert_eq!(err.failing_step(), Some("sfm"));
        assert_eq!(err.tool_exit_code(), Some(1));
        assert_eq!(err.exit_code(), 5);

        let err = check_status("sfm", "x", &ExitStatus::Signal(9)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EXEC_SIGNAL_RECEIVED);
        assert_eq!(err.tool_exit_code(), None);
    }

    #[test]
    fn test_step_error_for_missing_binary() {
        let err = step_error(
            "features",
            "openMVG_main_ComputeFeatures",
            ProcessError::CommandNotFound("openMVG_main_ComputeFeatures".into()),
        );
        assert_eq!(err.code(), ErrorCode::EXEC_COMMAND_NOT_FOUND);
        assert!(err.to_string().contains("command not found"));
    }
}
