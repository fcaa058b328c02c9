//! CLI argument structures
//!
//! Per-step overrides (`--<N> ...` and `--step-args ...`) are not declared
//! here; they are removed from argv by [`super::passthrough`] before parsing.

use crate::pipeline::{StepSelector, DEFAULT_PIPELINE};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const RUN_AFTER_HELP: &str = "\
Per-step options:
  --<N> TOKEN...              Options for step N, e.g. `--1 p ULTRA` sets `-p ULTRA`
  --step-args SEL TOKEN...    Same, addressing the step by index or label

Tokens are read in name/value pairs up to the next flag. User options replace
default options with the same flag.";

/// Drive openMVG/openMVS reconstruction pipelines
#[derive(Parser, Debug)]
#[command(name = "photopipe")]
#[command(about = "photopipe - Run photogrammetry pipelines step by step", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file (default: ./photopipe.toml, then the user config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconstruct a scene from a directory of images
    #[command(name = "run", after_help = RUN_AFTER_HELP)]
    Run(RunArgs),

    /// List the steps of a pipeline
    #[command(name = "steps")]
    Steps {
        /// Built-in pipeline name or path to a definition file
        #[arg(short, long, default_value = DEFAULT_PIPELINE)]
        pipeline: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory containing the source images
    pub source: PathBuf,

    /// Session directory (default: <data-dir>/<uid>)
    pub output_dir: Option<PathBuf>,

    /// Session id; reuse one to resume a previous run
    #[arg(long, value_name = "ID")]
    pub uid: Option<String>,

    /// Built-in pipeline name or path to a definition file
    #[arg(short, long, default_value = DEFAULT_PIPELINE)]
    pub pipeline: String,

    /// Parent directory for generated sessions
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// First step to run (index or label)
    #[arg(long, value_name = "SEL", conflicts_with_all = ["entrypoint", "chain"])]
    pub from: Option<StepSelector>,

    /// Last step to run, inclusive (index or label)
    #[arg(long, value_name = "SEL", conflicts_with_all = ["entrypoint", "chain"])]
    pub to: Option<StepSelector>,

    /// Follow on_success links starting at this step
    #[arg(long, value_name = "LABEL")]
    pub entrypoint: Option<StepSelector>,

    /// Follow on_success links from the pipeline's declared entrypoint
    #[arg(long, conflicts_with = "entrypoint")]
    pub chain: bool,

    /// Run the tools inside a container
    #[arg(long, conflicts_with = "no_container")]
    pub container: bool,

    /// Run the tools on the host even if settings enable the container
    #[arg(long)]
    pub no_container: bool,

    /// Container image to use
    #[arg(long, value_name = "IMAGE")]
    pub image: Option<String>,

    /// Print the resolved commands without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Stream tool output to the terminal as well as the session log
    #[arg(long)]
    pub echo: bool,
}

impl RunArgs {
    /// `Some(true)` for `--container`, `Some(false)` for `--no-container`
    pub fn container_override(&self) -> Option<bool> {
        match (self.container, self.no_container) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
