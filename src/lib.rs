//! # photopipe
//!
//! Runs openMVG/openMVS style photogrammetry pipelines one external tool at a
//! time, on the host or inside a container, with step selection, per-step
//! option overrides and a persistent per-session log.
//!
//! ## Usage
//!
//! ```bash
//! photopipe run <SOURCE_DIR> [OUTPUT_DIR] [--from SEL] [--to SEL] [--1 p ULTRA]
//! photopipe steps [--pipeline NAME]
//! ```
//!
//! ## Modules
//!
//! - `app` - Settings, logging and fatal error reporting
//! - `cli` - Argument parsing and subcommands
//! - `container` - Host and container execution environments
//! - `error` - Error taxonomy and error codes
//! - `pipeline` - Pipeline definitions, selection, templating and the executor
//! - `session` - Session directories and source image ingestion
//! - `subprocess` - Unified subprocess abstraction layer for testing
pub mod app;
pub mod cli;
pub mod container;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod subprocess;

pub use error::{PipelineError, Result};
