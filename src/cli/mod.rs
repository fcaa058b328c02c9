//! CLI command handlers
//!
//! This module contains all CLI-related functionality including:
//! - Argument parsing structures
//! - Per-step option extraction
//! - Command implementations

pub mod args;
pub mod commands;
pub mod passthrough;
pub mod router;

// Re-export the main CLI structures for convenience
pub use args::{Cli, Commands, RunArgs};
pub use passthrough::{extract_passthrough, ExtractedArgs};
pub use router::execute_command;
