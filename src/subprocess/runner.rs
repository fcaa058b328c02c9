use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use super::error::ProcessError;

#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub output: OutputMode,
}

impl ProcessCommand {
    /// Shell-quoted rendering of the full command line, for logs and messages
    pub fn display(&self) -> String {
        shell_words::join(std::iter::once(&self.program).chain(self.args.iter()))
    }
}

/// Where a process's stdout and stderr go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Capture both streams into the returned `ProcessOutput`
    Capture,
    /// Append combined stdout/stderr to a file
    AppendTo(PathBuf),
    /// Append combined output to a file and echo each line to the terminal
    Tee(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Timeout,
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitStatus::Success => write!(f, "exit status 0"),
            ExitStatus::Error(code) => write!(f, "exit status {}", code),
            ExitStatus::Timeout => write!(f, "timed out"),
            ExitStatus::Signal(signal) => write!(f, "terminated by signal {}", signal),
        }
    }
}

/// One raw output line, newline included when the tool wrote one
pub type ProcessStreamItem = Result<Vec<u8>, ProcessError>;
pub type ProcessStreamFut = Pin<Box<dyn Stream<Item = ProcessStreamItem> + Send>>;

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

pub struct TokioProcessRunner;

impl TokioProcessRunner {
    /// Strip a trailing `\n` or `\r\n`
    fn normalize_line(line: &[u8]) -> &[u8] {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        line.strip_suffix(b"\r").unwrap_or(line)
    }

    /// Create a stream of raw lines from a buffered reader
    ///
    /// Lines are bytes: tool output is not guaranteed to be UTF-8.
    fn create_line_stream<R>(reader: tokio::io::BufReader<R>) -> ProcessStreamFut
    where
        R: tokio::io::AsyncRead + Send + Unpin + 'static,
    {
        use tokio::io::AsyncBufReadExt;

        Box::pin(futures::stream::unfold(reader, |mut reader| async move {
            let mut line = Vec::new();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => None, // EOF
                Ok(_) => Some((Ok(line), reader)),
                Err(e) => Some((Err(ProcessError::Io(e)), reader)),
            }
        })) as ProcessStreamFut
    }

    fn log_command_start(command: &ProcessCommand) {
        tracing::debug!("Executing subprocess: {}", command.display());

        if !command.env.is_empty() {
            tracing::trace!("Environment overrides: {:?}", command.env);
        }

        if let Some(ref dir) = command.working_dir {
            tracing::trace!("Working directory: {:?}", dir);
        }

        match &command.output {
            OutputMode::Capture => tracing::trace!("Capturing output"),
            OutputMode::AppendTo(path) => tracing::trace!("Appending output to {:?}", path),
            OutputMode::Tee(path) => tracing::trace!("Echoing and appending output to {:?}", path),
        }
    }

    /// Configure the command with environment and working directory
    fn configure_command(command: &ProcessCommand) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);

        // Own process group: a Ctrl-C aimed at us must not kill the running tool
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        cmd.args(&command.args);

        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        if command.timeout.is_some() {
            cmd.kill_on_drop(true);
        }

        cmd.stdin(Stdio::null());
        cmd
    }

    /// Open a log file in append mode, creating it if needed
    fn open_log(path: &Path) -> Result<std::fs::File, ProcessError> {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(ProcessError::Io)
    }

    /// Map spawn error to ProcessError
    fn map_spawn_error(error: std::io::Error, command: &ProcessCommand) -> ProcessError {
        if error.kind() == std::io::ErrorKind::NotFound {
            ProcessError::CommandNotFound(command.program.clone())
        } else {
            tracing::error!(
                "Failed to spawn '{}': {:?} (kind: {:?})",
                command.program,
                error,
                error.kind()
            );
            ProcessError::SpawnFailed {
                command: command.display(),
                source: error,
            }
        }
    }

    /// Wait for a captured process with optional timeout
    async fn wait_with_timeout(
        child: tokio::process::Child,
        timeout: Option<Duration>,
    ) -> Result<std::process::Output, ProcessError> {
        match timeout {
            Some(duration) => {
                match tokio::time::timeout(duration, child.wait_with_output()).await {
                    Ok(result) => result.map_err(ProcessError::Io),
                    Err(_) => Err(ProcessError::Timeout(duration)),
                }
            }
            None => child.wait_with_output().await.map_err(ProcessError::Io),
        }
    }

    /// Wait for a process whose output is redirected, with optional timeout
    async fn wait_status(
        mut child: tokio::process::Child,
        timeout: Option<Duration>,
    ) -> Result<std::process::ExitStatus, ProcessError> {
        match timeout {
            Some(duration) => match tokio::time::timeout(duration, child.wait()).await {
                Ok(result) => result.map_err(ProcessError::Io),
                Err(_) => Err(ProcessError::Timeout(duration)),
            },
            None => child.wait().await.map_err(ProcessError::Io),
        }
    }

    /// Convert process exit status to our ExitStatus enum
    fn parse_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    /// Parse signal status on Unix systems
    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            ExitStatus::Signal(signal)
        } else {
            ExitStatus::Error(1)
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
        ExitStatus::Error(1)
    }

    /// Extract a stream from a child process, converting None to error
    fn extract_stream<T>(stream: Option<T>, stream_name: &str) -> Result<T, ProcessError> {
        stream.ok_or_else(|| ProcessError::InternalError {
            message: format!("Failed to capture {}", stream_name),
        })
    }

    async fn run_captured(
        command: &ProcessCommand,
    ) -> Result<(ExitStatus, String, String), ProcessError> {
        let mut cmd = Self::configure_command(command);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, command))?;
        let output = Self::wait_with_timeout(child, command.timeout).await?;

        Ok((
            Self::parse_exit_status(output.status),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        ))
    }

    async fn run_appending(command: &ProcessCommand, log: &Path) -> Result<ExitStatus, ProcessError> {
        let file = Self::open_log(log)?;
        let mut cmd = Self::configure_command(command);
        cmd.stdout(Stdio::from(file.try_clone()?));
        cmd.stderr(Stdio::from(file));

        let child = cmd
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, command))?;
        let status = Self::wait_status(child, command.timeout).await?;
        Ok(Self::parse_exit_status(status))
    }

    async fn run_teeing(command: &ProcessCommand, log: &Path) -> Result<ExitStatus, ProcessError> {
        use tokio::io::{AsyncWriteExt, BufReader};

        let mut log_file = tokio::fs::File::from_std(Self::open_log(log)?);
        let mut cmd = Self::configure_command(command);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, command))?;
        let stdout = Self::extract_stream(child.stdout.take(), "stdout")?;
        let stderr = Self::extract_stream(child.stderr.take(), "stderr")?;
        let mut lines = futures::stream::select(
            Self::create_line_stream(BufReader::new(stdout)),
            Self::create_line_stream(BufReader::new(stderr)),
        );

        let pump = async {
            while let Some(line) = lines.next().await {
                let line = line?;
                println!("{}", String::from_utf8_lossy(Self::normalize_line(&line)));
                log_file.write_all(&line).await?;
                if !line.ends_with(b"\n") {
                    log_file.write_all(b"\n").await?;
                }
            }
            log_file.flush().await?;
            Ok::<(), ProcessError>(())
        };
        let finished = async {
            pump.await?;
            child.wait().await.map_err(ProcessError::Io)
        };

        let outcome = match command.timeout {
            Some(duration) => tokio::time::timeout(duration, finished)
                .await
                .unwrap_or(Err(ProcessError::Timeout(duration))),
            None => finished.await,
        };

        match outcome {
            Ok(status) => Ok(Self::parse_exit_status(status)),
            Err(e) => {
                // The tool may still be running in its own process group
                if let Err(kill_err) = child.kill().await {
                    tracing::debug!("Could not kill '{}': {}", command.program, kill_err);
                }
                Err(e)
            }
        }
    }

    /// Log the process execution result
    fn log_result(result: &ProcessOutput, command: &ProcessCommand) {
        let command_str = command.display();

        match &result.status {
            ExitStatus::Success => {
                tracing::debug!(
                    "Subprocess completed successfully in {:?}: {}",
                    result.duration,
                    command_str
                );
                tracing::trace!("Stdout length: {} bytes", result.stdout.len());
            }
            ExitStatus::Error(code) => {
                tracing::debug!(
                    "Subprocess failed with exit code {} in {:?}: {}",
                    code,
                    result.duration,
                    command_str
                );
                if !result.stderr.is_empty() {
                    tracing::trace!("Stderr: {}", result.stderr);
                }
            }
            ExitStatus::Signal(signal) => {
                tracing::warn!(
                    "Subprocess terminated by signal {} in {:?}: {}",
                    signal,
                    result.duration,
                    command_str
                );
            }
            ExitStatus::Timeout => {
                tracing::warn!(
                    "Subprocess timed out after {:?}: {}",
                    result.duration,
                    command_str
                );
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let start = std::time::Instant::now();

        Self::log_command_start(&command);

        let (status, stdout, stderr) = match &command.output {
            OutputMode::Capture => Self::run_captured(&command).await?,
            OutputMode::AppendTo(log) => (
                Self::run_appending(&command, log).await?,
                String::new(),
                String::new(),
            ),
            OutputMode::Tee(log) => (
                Self::run_teeing(&command, log).await?,
                String::new(),
                String::new(),
            ),
        };

        let result = ProcessOutput {
            status,
            stdout,
            stderr,
            duration: start.elapsed(),
        };

        Self::log_result(&result, &command);

        Ok(result)
    }
}
