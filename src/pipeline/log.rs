//! Durable per-session logs
//!
//! `processed.log` carries the raw tool output framed by START/END marker
//! lines; `execution.jsonl` carries one serialized `ExecutionRecord` per line.

use super::runner::{ExecutionRecord, StepOutcome};
use crate::error::{ErrorCode, PipelineError, Result};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const START_MARKER: &str = "==>";
pub const END_MARKER: &str = "<==";

/// Append-only writer for one session's log files
#[derive(Debug, Clone)]
pub struct SessionLog {
    log_path: PathBuf,
    records_path: PathBuf,
}

impl SessionLog {
    pub fn new(log_path: impl Into<PathBuf>, records_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            records_path: records_path.into(),
        }
    }

    /// Path tool output is appended to
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    /// Write the boundary line preceding a step's output
    pub fn step_started(
        &self,
        index: usize,
        label: &str,
        command: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let line = format!(
            "{} {} START #{} {} :: {}\n",
            START_MARKER,
            at.to_rfc3339(),
            index,
            label,
            command
        );
        append(&self.log_path, line.as_bytes())
    }

    /// Write the boundary line after a step's output and persist its record
    pub fn step_finished(&self, record: &ExecutionRecord) -> Result<()> {
        let outcome = match &record.outcome {
            StepOutcome::Success => "ok".to_string(),
            StepOutcome::Failed {
                exit_code: Some(code),
                ..
            } => format!("failed({})", code),
            StepOutcome::Failed { exit_code: None, .. } => "failed".to_string(),
        };
        let line = format!(
            "{} {} END #{} {} :: {} in {:.2}s\n",
            END_MARKER,
            record.finished_at().to_rfc3339(),
            record.index,
            record.label,
            outcome,
            record.duration.as_secs_f64()
        );
        append(&self.log_path, line.as_bytes())?;

        let mut json = serde_json::to_string(record).map_err(|e| {
            PipelineError::storage_with_code(
                ErrorCode::STORAGE_LOG_WRITE_FAILED,
                "cannot serialize execution record",
                Some(self.records_path.clone()),
            )
            .with_source(e)
        })?;
        json.push('\n');
        append(&self.records_path, json.as_bytes())
    }
}

fn append(path: &Path, bytes: &[u8]) -> Result<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(bytes))
        .map_err(|e| {
            PipelineError::storage_with_code(
                ErrorCode::STORAGE_LOG_WRITE_FAILED,
                "cannot append to session log",
                Some(path.to_path_buf()),
            )
            .with_source(e)
        })
}

/// Read back the records persisted for a session
pub fn read_records(records_path: &Path) -> Result<Vec<ExecutionRecord>> {
    let content = match std::fs::read_to_string(records_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PipelineError::from(e).with_path(records_path)),
    };
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| PipelineError::from(e).with_path(records_path))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn record(index: usize, outcome: StepOutcome) -> ExecutionRecord {
        ExecutionRecord {
            index,
            label: "features".to_string(),
            command: "openMVG_main_ComputeFeatures -m SIFT".to_string(),
            started_at: Utc::now(),
            duration: Duration::from_millis(1500),
            outcome,
        }
    }

    #[test]
    fn test_markers_frame_step_output() {
        let temp = TempDir::new().unwrap();
        let log = SessionLog::new(
            temp.path().join("processed.log"),
            temp.path().join("execution.jsonl"),
        );

        let rec = record(1, StepOutcome::Success);
        log.step_started(1, "features", &rec.command, rec.started_at)
            .unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(log.log_path())
            .unwrap()
            .write_all(b"tool output\n")
            .unwrap();
        log.step_finished(&rec).unwrap();

        let contents = std::fs::read_to_string(log.log_path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("==> "));
        assert!(lines[0].ends_with("START #1 features :: openMVG_main_ComputeFeatures -m SIFT"));
        assert_eq!(lines[1], "tool output");
        assert!(lines[2].starts_with("<== "));
        assert!(lines[2].ends_with("END #1 features :: ok in 1.50s"));
    }

    #[test]
    fn test_failed_record_marker_and_jsonl() {
        let temp = TempDir::new().unwrap();
        let log = SessionLog::new(
            temp.path().join("processed.log"),
            temp.path().join("execution.jsonl"),
        );

        log.step_finished(&record(0, StepOutcome::Success)).unwrap();
        log.step_finished(&record(
            3,
            StepOutcome::Failed {
                exit_code: Some(1),
                error: "external tool exited with exit status 1".to_string(),
            },
        ))
        .unwrap();

        let contents = std::fs::read_to_string(log.log_path()).unwrap();
        assert!(contents.contains("END #3 features :: failed(1) in 1.50s"));

        let records = read_records(log.records_path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].index, 0);
        assert!(records[0].outcome.is_success());
        assert_eq!(records[1].outcome.exit_code(), Some(1));
    }

    #[test]
    fn test_read_records_of_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(read_records(&temp.path().join("none.jsonl"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unwritable_log_is_storage_error() {
        let temp = TempDir::new().unwrap();
        let log = SessionLog::new(
            temp.path().join("missing/processed.log"),
            temp.path().join("missing/execution.jsonl"),
        );
        let err = log
            .step_started(0, "intrinsics", "true", Utc::now())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::STORAGE_LOG_WRITE_FAILED);
        assert_eq!(err.exit_code(), 6);
    }
}
