//! Pipeline definitions and their execution
//!
//! A [`PipelineDefinition`] is loaded or built once and never mutated. A
//! [`PipelineExecutor`] turns a [`Selection`] plus [`PassthroughArgs`] into an
//! [`ExecutionPlan`] and runs it step by step through a [`StepRunner`].

pub mod builtin;
pub mod definition;
pub mod executor;
pub mod log;
pub mod options;
pub mod runner;
pub mod selection;
pub mod template;

pub use builtin::{builtin_names, resolve_pipeline, DEFAULT_PIPELINE};
pub use definition::{DefaultOptions, PipelineDefinition, Step};
pub use executor::{
    CancellationFlag, ExecutionPlan, ExecutorOptions, ExecutorState, PipelineExecutor,
    PlannedStep, ResolvedStep, RunReport,
};
pub use log::SessionLog;
pub use options::{merge, user_options, CliOption};
pub use runner::{ExecutionRecord, StepFailure, StepOutcome, StepRunner};
pub use selection::{PassthroughArgs, Selection, StepSelector};
pub use template::CommandTemplate;
