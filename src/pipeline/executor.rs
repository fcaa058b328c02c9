//! Sequential execution of a selected part of a pipeline
//!
//! The executor resolves a selection to concrete steps before anything runs,
//! prepares the execution environment once, runs the steps one at a time and
//! stops at the first failure. The environment is torn down exactly once
//! after it was prepared, whatever the outcome.

use super::definition::PipelineDefinition;
use super::log::SessionLog;
use super::options::{merge, CliOption};
use super::runner::{ExecutionRecord, StepRunner};
use super::selection::{PassthroughArgs, Selection};
use super::template::CommandTemplate;
use crate::container::ExecutionEnvironment;
use crate::error::{ErrorCode, PipelineError, Result};
use crate::session::PathSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Selecting,
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorOptions {
    /// Stream tool output to the terminal as well as the log
    pub echo: bool,
    /// Print resolved commands instead of running them
    pub dry_run: bool,
}

/// Shared flag checked before each step
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub index: usize,
    pub user_options: Vec<CliOption>,
}

/// Concrete, ordered steps of one run with their pass-through options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    steps: Vec<PlannedStep>,
}

impl ExecutionPlan {
    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    pub fn indices(&self) -> Vec<usize> {
        self.steps.iter().map(|s| s.index).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A step with its final command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStep {
    pub index: usize,
    pub label: String,
    pub tokens: Vec<String>,
}

/// What a run did, for the end-of-run summary
#[derive(Debug, Clone)]
pub struct RunReport {
    pub pipeline: String,
    pub records: Vec<ExecutionRecord>,
}

impl RunReport {
    pub fn total_duration(&self) -> Duration {
        self.records.iter().map(|r| r.duration).sum()
    }

    pub fn succeeded(&self) -> bool {
        self.records.iter().all(ExecutionRecord::is_success)
    }

    /// Human-readable summary, one line per executed step
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Pipeline '{}' summary:", self.pipeline)];
        for record in &self.records {
            let outcome = match record.outcome.exit_code() {
                _ if record.is_success() => "ok".to_string(),
                Some(code) => format!("FAILED (exit status {})", code),
                None => "FAILED".to_string(),
            };
            lines.push(format!(
                "  #{:<2} {:<28} {:>10.2}s  {}",
                record.index,
                record.label,
                record.duration.as_secs_f64(),
                outcome
            ));
        }
        lines.push(format!(
            "  {} step(s) in {:.2}s",
            self.records.len(),
            self.total_duration().as_secs_f64()
        ));
        lines.join("\n")
    }
}

pub struct PipelineExecutor {
    definition: PipelineDefinition,
    environment: Box<dyn ExecutionEnvironment>,
    options: ExecutorOptions,
    cancellation: CancellationFlag,
    state: ExecutorState,
    records: Vec<ExecutionRecord>,
}

impl PipelineExecutor {
    pub fn new(definition: PipelineDefinition, environment: Box<dyn ExecutionEnvironment>) -> Self {
        Self {
            definition,
            environment,
            options: ExecutorOptions::default(),
            cancellation: CancellationFlag::new(),
            state: ExecutorState::Idle,
            records: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Records of every step invoked so far, in execution order
    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            pipeline: self.definition.name.clone(),
            records: self.records.clone(),
        }
    }

    /// Resolve the selection and pass-through arguments to concrete steps
    ///
    /// Fails before anything is provisioned or executed.
    pub fn plan(&mut self, selection: &Selection, passthrough: &PassthroughArgs) -> Result<ExecutionPlan> {
        self.state = ExecutorState::Selecting;
        let planned = self.resolve_plan(selection, passthrough);
        if planned.is_err() {
            self.state = ExecutorState::Aborted;
        }
        planned
    }

    fn resolve_plan(&self, selection: &Selection, passthrough: &PassthroughArgs) -> Result<ExecutionPlan> {
        let indices = selection.resolve(&self.definition)?;
        let mut user = passthrough.resolve(&self.definition)?;

        for index in user.keys().filter(|index| !indices.contains(index)) {
            warn!(
                "Options for step #{} ({}) ignored: step is not selected",
                index, self.definition.steps[*index].label
            );
        }

        let steps = indices
            .into_iter()
            .map(|index| PlannedStep {
                index,
                user_options: user.remove(&index).unwrap_or_default(),
            })
            .collect();
        Ok(ExecutionPlan { steps })
    }

    /// Final command line of one planned step
    pub fn resolve_step(&self, planned: &PlannedStep, paths: &PathSet) -> Result<ResolvedStep> {
        let step = self.definition.step(planned.index).ok_or_else(|| {
            PipelineError::unknown_step(
                ErrorCode::SELECT_INDEX_OUT_OF_RANGE,
                planned.index.to_string(),
                &self.definition.name,
            )
        })?;
        let template = CommandTemplate::new(step);
        let mut tokens = template.resolve(paths)?;
        let defaults = template.resolve_defaults(paths)?;
        tokens.extend(merge(&defaults, &planned.user_options));

        Ok(ResolvedStep {
            index: planned.index,
            label: step.label.clone(),
            tokens,
        })
    }

    /// Final command lines of the whole plan, without running anything
    pub fn preview(&self, plan: &ExecutionPlan, paths: &PathSet) -> Result<Vec<ResolvedStep>> {
        plan.steps()
            .iter()
            .map(|planned| self.resolve_step(planned, paths))
            .collect()
    }

    /// Run the plan against a materialized session
    pub async fn execute(&mut self, plan: &ExecutionPlan, paths: &PathSet) -> Result<RunReport> {
        self.state = ExecutorState::Running;

        if self.options.dry_run {
            return self.dry_run(plan, paths);
        }

        if let Err(e) = self.check_prerequisites(plan, paths) {
            self.state = ExecutorState::Aborted;
            return Err(e);
        }

        if let Err(e) = self.environment.prepare(paths).await {
            self.state = ExecutorState::Aborted;
            return Err(e);
        }
        info!(
            "Running {} step(s) of '{}' in {}",
            plan.len(),
            self.definition.name,
            self.environment.describe()
        );

        let log = SessionLog::new(paths.log_path(), paths.records_path());
        let outcome = self.run_steps(plan, paths, &log).await;
        self.environment.teardown().await;

        match outcome {
            Ok(()) => {
                self.state = ExecutorState::Completed;
                Ok(self.report())
            }
            Err(e) => {
                self.state = ExecutorState::Aborted;
                Err(e)
            }
        }
    }

    fn check_prerequisites(&self, plan: &ExecutionPlan, paths: &PathSet) -> Result<()> {
        if !self.environment.runs_on_host() {
            return Ok(());
        }
        let needs_database = plan.steps().iter().any(|planned| {
            self.definition
                .step(planned.index)
                .map(|step| step.references("camera_database"))
                .unwrap_or(false)
        });
        if needs_database && !paths.camera_database().is_file() {
            return Err(PipelineError::configuration_with_code(
                ErrorCode::CONFIG_CAMERA_DATABASE_MISSING,
                "camera sensor database not found; set tools.camera_database",
            )
            .with_path(paths.camera_database()));
        }
        Ok(())
    }

    fn dry_run(&mut self, plan: &ExecutionPlan, paths: &PathSet) -> Result<RunReport> {
        match self.preview(plan, paths) {
            Ok(resolved) => {
                for step in resolved {
                    println!("[#{}] {}", step.index, step.label);
                    println!("    {}", shell_words::join(&step.tokens));
                }
                self.state = ExecutorState::Completed;
                Ok(self.report())
            }
            Err(e) => {
                self.state = ExecutorState::Aborted;
                Err(e)
            }
        }
    }

    async fn run_steps(&mut self, plan: &ExecutionPlan, paths: &PathSet, log: &SessionLog) -> Result<()> {
        for planned in plan.steps() {
            let step = &self.definition.steps[planned.index];
            if self.cancellation.is_cancelled() {
                warn!("Cancellation requested; not starting step '{}'", step.label);
                return Err(PipelineError::cancelled(&step.label));
            }

            let resolved = self.resolve_step(planned, paths)?;
            println!(">>> [#{}] {}", planned.index, step.title());
            debug!("Command: {}", shell_words::join(&resolved.tokens));

            let runner = StepRunner::new(self.environment.as_ref(), log).with_echo(self.options.echo);
            match runner.run(planned.index, step, &resolved.tokens).await {
                Ok(record) => {
                    println!("<<< done in {:.2}s", record.duration.as_secs_f64());
                    self.records.push(record);
                }
                Err(failure) => {
                    println!(
                        "<<< failed after {:.2}s",
                        failure.record.duration.as_secs_f64()
                    );
                    self.records.push(failure.record);
                    return Err(failure.error);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
