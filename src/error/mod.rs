use std::error::Error as StdError;
use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

type BoxedSource = Box<dyn StdError + Send + Sync>;

/// The unified error type for pipeline preparation and execution
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Configuration {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Unknown step '{selector}' in pipeline '{pipeline}'")]
    UnknownStep {
        code: u16,
        selector: String,
        pipeline: String,
    },

    #[error("[E{code:04}] Template error in step '{step}': {message}")]
    Template {
        code: u16,
        step: String,
        placeholder: Option<String>,
        message: String,
    },

    #[error("[E{code:04}] Provisioning error: {message}")]
    Provisioning {
        code: u16,
        message: String,
        exit_code: Option<i32>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Step '{step}' failed: {message}")]
    StepExecution {
        code: u16,
        step: String,
        command: String,
        exit_code: Option<i32>,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Storage error: {message}")]
    Storage {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Run cancelled before step '{next_step}'")]
    Cancelled { code: u16, next_step: String },
}

impl PipelineError {
    /// Create a configuration error with default code
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::configuration_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn configuration_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Configuration {
            code,
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Create an unknown-step error for a label or index that does not resolve
    pub fn unknown_step(
        code: u16,
        selector: impl Into<String>,
        pipeline: impl Into<String>,
    ) -> Self {
        Self::UnknownStep {
            code,
            selector: selector.into(),
            pipeline: pipeline.into(),
        }
    }

    /// Create a template error for a step token
    pub fn template(
        code: u16,
        step: impl Into<String>,
        placeholder: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Template {
            code,
            step: step.into(),
            placeholder,
            message: message.into(),
        }
    }

    /// Create a provisioning error with specific code
    pub fn provisioning(code: u16, message: impl Into<String>) -> Self {
        Self::Provisioning {
            code,
            message: message.into(),
            exit_code: None,
            source: None,
        }
    }

    /// Create a step execution error
    pub fn step_execution(
        code: u16,
        step: impl Into<String>,
        command: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::StepExecution {
            code,
            step: step.into(),
            command: command.into(),
            exit_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error with specific code and path
    pub fn storage_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    pub fn cancelled(next_step: impl Into<String>) -> Self {
        Self::Cancelled {
            code: ErrorCode::PIPELINE_CANCELLED,
            next_step: next_step.into(),
        }
    }

    /// Add a source error to this error
    ///
    /// Variants without a source slot are returned unchanged.
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Configuration { source: src, .. }
            | Self::Provisioning { source: src, .. }
            | Self::StepExecution { source: src, .. }
            | Self::Storage { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::UnknownStep { .. } | Self::Template { .. } | Self::Cancelled { .. } => {}
        }
        self
    }

    /// Attach the path a configuration or storage error refers to
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        match &mut self {
            Self::Configuration { path: p, .. } | Self::Storage { path: p, .. } => {
                *p = Some(path.into());
            }
            _ => {}
        }
        self
    }

    /// Set the exit code reported by the external tool or container runtime
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        match &mut self {
            Self::StepExecution { exit_code: ec, .. } | Self::Provisioning { exit_code: ec, .. } => {
                *ec = Some(exit_code);
            }
            _ => {}
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Configuration { message, .. }
            | Self::Template { message, .. }
            | Self::Provisioning { message, .. }
            | Self::StepExecution { message, .. }
            | Self::Storage { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
            Self::UnknownStep { .. } | Self::Cancelled { .. } => {}
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Configuration { code, .. }
            | Self::UnknownStep { code, .. }
            | Self::Template { code, .. }
            | Self::Provisioning { code, .. }
            | Self::StepExecution { code, .. }
            | Self::Storage { code, .. }
            | Self::Cancelled { code, .. } => *code,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownStep { .. } => 2,
            Self::Configuration { .. } | Self::Template { .. } => 3,
            Self::Provisioning { .. } => 4,
            Self::StepExecution { .. } => 5,
            Self::Storage { .. } => 6,
            Self::Cancelled { .. } => 130,
        }
    }

    /// Label of the step this error is attributed to, if any
    pub fn failing_step(&self) -> Option<&str> {
        match self {
            Self::Template { step, .. } | Self::StepExecution { step, .. } => Some(step.as_str()),
            _ => None,
        }
    }

    /// Exit status of the external tool, if it ran and reported one
    pub fn tool_exit_code(&self) -> Option<i32> {
        match self {
            Self::StepExecution { exit_code, .. } | Self::Provisioning { exit_code, .. } => {
                *exit_code
            }
            _ => None,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration { message, path, .. } => match path {
                Some(p) => format!("Configuration problem ({}): {}", p.display(), message),
                None => format!("Configuration problem: {}", message),
            },
            Self::UnknownStep {
                selector, pipeline, ..
            } => format!(
                "Pipeline '{}' has no step '{}' (run `photopipe steps --pipeline {}` to list them)",
                pipeline, selector, pipeline
            ),
            Self::Template {
                step,
                placeholder,
                message,
                ..
            } => match placeholder {
                Some(name) => format!(
                    "Step '{}' uses unknown placeholder '{{{}}}': {}",
                    step, name, message
                ),
                None => format!("Step '{}' has an invalid command template: {}", step, message),
            },
            Self::Provisioning {
                message, exit_code, ..
            } => match exit_code {
                Some(code) => format!(
                    "Could not start container (runtime exit status {}): {}",
                    code, message
                ),
                None => format!("Could not start container: {}", message),
            },
            Self::StepExecution {
                step,
                command,
                exit_code,
                message,
                ..
            } => {
                let status = exit_code
                    .map(|c| format!("exit status {}", c))
                    .unwrap_or_else(|| "no exit status".to_string());
                format!(
                    "Step '{}' failed ({}): {}\n  command: {}",
                    step, status, message, command
                )
            }
            Self::Storage { message, path, .. } => match path {
                Some(p) => format!("Storage error at {}: {}", p.display(), message),
                None => format!("Storage error: {}", message),
            },
            Self::Cancelled { next_step, .. } => {
                format!("Cancelled; step '{}' and later steps were not run", next_step)
            }
        }
    }

    /// Get a developer-friendly error message with full chain
    pub fn developer_message(&self) -> String {
        let mut message = format!("{} ({})", self, describe_error_code(self.code()));
        let mut current = StdError::source(self);
        while let Some(cause) = current {
            message.push_str(&format!("\n  caused by: {}", cause));
            current = cause.source();
        }
        message
    }
}

/// Type alias for Results using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, message) = match err.kind() {
            ErrorKind::NotFound => (ErrorCode::STORAGE_NOT_FOUND, "File or directory not found"),
            ErrorKind::PermissionDenied => {
                (ErrorCode::STORAGE_PERMISSION_DENIED, "Permission denied")
            }
            _ => (ErrorCode::STORAGE_IO_ERROR, "IO operation failed"),
        };

        PipelineError::storage_with_code(code, message, None).with_source(err)
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::configuration_with_code(ErrorCode::CONFIG_INVALID_YAML, "Invalid YAML syntax")
            .with_source(err)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::configuration_with_code(ErrorCode::CONFIG_INVALID_JSON, "Invalid JSON syntax")
            .with_source(err)
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::configuration_with_code(ErrorCode::CONFIG_INVALID_TOML, "Invalid TOML syntax")
            .with_source(err)
    }
}
