use super::definition::Step;
use super::log::SessionLog;
use crate::container::ExecutionEnvironment;
use crate::error::PipelineError;
use crate::subprocess::OutputMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of one step invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Failed {
        exit_code: Option<i32>,
        error: String,
    },
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StepOutcome::Success => Some(0),
            StepOutcome::Failed { exit_code, .. } => *exit_code,
        }
    }
}

/// Audit entry for one step invocation; never modified once appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub index: usize,
    pub label: String,
    pub command: String,
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub outcome: StepOutcome,
}

impl ExecutionRecord {
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.started_at
            + chrono::Duration::from_std(self.duration).unwrap_or_else(|_| chrono::Duration::zero())
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// A failed step: the record is kept for the audit trail, the error is propagated
#[derive(Debug)]
pub struct StepFailure {
    pub record: ExecutionRecord,
    pub error: PipelineError,
}

/// Runs one resolved command and accounts for it
pub struct StepRunner<'a> {
    environment: &'a dyn ExecutionEnvironment,
    log: &'a SessionLog,
    echo: bool,
}

impl<'a> StepRunner<'a> {
    pub fn new(environment: &'a dyn ExecutionEnvironment, log: &'a SessionLog) -> Self {
        Self {
            environment,
            log,
            echo: false,
        }
    }

    /// Also stream tool output to the terminal
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Execute `command` for the step at `index`
    ///
    /// A record is produced for success and failure alike; its duration covers
    /// the tool invocation only.
    pub async fn run(
        &self,
        index: usize,
        step: &Step,
        command: &[String],
    ) -> Result<ExecutionRecord, StepFailure> {
        let rendered = shell_words::join(command);
        let started_at = Utc::now();
        let start = Instant::now();

        let result = match self.log.step_started(index, &step.label, &rendered, started_at) {
            Ok(()) => {
                let output = if self.echo {
                    OutputMode::Tee(self.log.log_path().to_path_buf())
                } else {
                    OutputMode::AppendTo(self.log.log_path().to_path_buf())
                };
                self.environment
                    .execute(&step.label, command, output)
                    .await
            }
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(()) => StepOutcome::Success,
            Err(e) => StepOutcome::Failed {
                exit_code: e.tool_exit_code(),
                error: e.to_string(),
            },
        };
        let record = ExecutionRecord {
            index,
            label: step.label.clone(),
            command: rendered,
            started_at,
            duration: start.elapsed(),
            outcome,
        };
        debug!(
            "Step #{} '{}' finished in {:?}: {:?}",
            index, step.label, record.duration, record.outcome
        );

        if let Err(log_error) = self.log.step_finished(&record) {
            warn!("Could not persist record for step '{}': {}", step.label, log_error);
            if result.is_ok() {
                return Err(StepFailure {
                    record,
                    error: log_error,
                });
            }
        }

        match result {
            Ok(()) => Ok(record),
            Err(error) => Err(StepFailure { record, error }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::HostEnvironment;
    use crate::pipeline::definition::DefaultOptions;
    use crate::subprocess::SubprocessManager;
    use tempfile::TempDir;

    fn step(label: &str) -> Step {
        Step {
            label: label.to_string(),
            description: None,
            command: vec!["sh".to_string()],
            default_options: DefaultOptions::default(),
            on_success: None,
        }
    }

    fn session_log(temp: &TempDir) -> SessionLog {
        SessionLog::new(
            temp.path().join("processed.log"),
            temp.path().join("execution.jsonl"),
        )
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_success_produces_record_and_log() {
        let temp = TempDir::new().unwrap();
        let log = session_log(&temp);
        let host = HostEnvironment::new(SubprocessManager::production());

        let record = StepRunner::new(&host, &log)
            .run(0, &step("intrinsics"), &sh("echo listing"))
            .await
            .unwrap();

        assert!(record.is_success());
        assert_eq!(record.index, 0);
        assert_eq!(record.command, "sh -c 'echo listing'");

        let contents = std::fs::read_to_string(log.log_path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert!(lines[0].contains("START #0 intrinsics"));
        assert_eq!(lines[1], "listing");
        assert!(lines[2].contains("END #0 intrinsics :: ok"));
    }

    #[tokio::test]
    async fn test_failure_still_produces_record() {
        let temp = TempDir::new().unwrap();
        let log = session_log(&temp);
        let host = HostEnvironment::new(SubprocessManager::production());

        let failure = StepRunner::new(&host, &log)
            .run(3, &step("sfm"), &sh("sleep 0.1; exit 1"))
            .await
            .unwrap_err();

        assert_eq!(failure.record.outcome.exit_code(), Some(1));
        assert!(failure.record.duration >= Duration::from_millis(100));
        assert_eq!(failure.error.failing_step(), Some("sfm"));
        assert_eq!(failure.error.tool_exit_code(), Some(1));

        let persisted = crate::pipeline::log::read_records(log.records_path()).unwrap();
        assert_eq!(persisted, vec![failure.record]);
    }

    #[test]
    fn test_record_serializes_status_tag() {
        let record = ExecutionRecord {
            index: 2,
            label: "matches".into(),
            command: "openMVG_main_ComputeMatches".into(),
            started_at: Utc::now(),
            duration: Duration::from_secs(3),
            outcome: StepOutcome::Failed {
                exit_code: Some(2),
                error: "boom".into(),
            },
        };
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["exit_code"], 2);
        assert_eq!(json["duration"], "3s");
        assert!(record.finished_at() > record.started_at);
    }
}
