//! Error handling utilities
//!
//! This module provides centralized error handling for the application.

use crate::error::PipelineError;
use tracing::error;

/// Exit code for errors that did not originate in the pipeline
pub const GENERAL_ERROR: i32 = 1;

/// Handle fatal errors and exit with appropriate status code
///
/// - For `PipelineError`: shows the user message always, the developer message in verbose mode
/// - For other errors: shows the error and, in verbose mode, its chain
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);
    eprintln!("{}", render_error(&error, verbose));
    std::process::exit(exit_code_for(&error))
}

/// Process exit code for a top-level error
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<PipelineError>()
        .map(PipelineError::exit_code)
        .unwrap_or(GENERAL_ERROR)
}

/// Text printed to stderr for a top-level error
pub fn render_error(error: &anyhow::Error, verbose: u8) -> String {
    if let Some(pipeline_err) = error.downcast_ref::<PipelineError>() {
        let mut text = format!("Error: {}", pipeline_err.user_message());
        if verbose >= 1 {
            text.push_str(&format!(
                "\n\nContext Chain:\n{}",
                pipeline_err.developer_message()
            ));
        }
        return text;
    }

    let mut text = format!("Error: {error}");
    if verbose >= 1 {
        text.push_str("\n\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            text.push_str(&format!("\n  {}: {}", i, cause));
        }
    }
    text
}
