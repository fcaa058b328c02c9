use super::{check_status, step_error, ExecutionEnvironment};
use crate::error::{ErrorCode, PipelineError, Result};
use crate::session::PathSet;
use crate::subprocess::{OutputMode, ProcessCommandBuilder, SubprocessManager};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Runs steps as direct child processes of photopipe
pub struct HostEnvironment {
    subprocess: SubprocessManager,
    working_dir: Option<PathBuf>,
}

impl HostEnvironment {
    pub fn new(subprocess: SubprocessManager) -> Self {
        Self {
            subprocess,
            working_dir: None,
        }
    }
}

#[async_trait]
impl ExecutionEnvironment for HostEnvironment {
    fn describe(&self) -> String {
        "host".to_string()
    }

    fn runs_on_host(&self) -> bool {
        true
    }

    async fn prepare(&mut self, paths: &PathSet) -> Result<()> {
        self.working_dir = Some(paths.session_dir().to_path_buf());
        Ok(())
    }

    async fn execute(&self, step: &str, tokens: &[String], output: OutputMode) -> Result<()> {
        let mut builder = ProcessCommandBuilder::from_tokens(tokens).ok_or_else(|| {
            PipelineError::step_execution(ErrorCode::EXEC_GENERIC, step, "", "empty command")
        })?;
        if let Some(dir) = &self.working_dir {
            builder = builder.current_dir(dir);
        }
        let command = builder.output(output).build();
        let rendered = command.display();
        debug!("Running step '{}' on host: {}", step, rendered);

        let result = self
            .subprocess
            .runner()
            .run(command)
            .await
            .map_err(|e| step_error(step, &rendered, e))?;
        check_status(step, &rendered, &result.status)
    }

    async fn teardown(&mut self) {}
}
