//! Command routing and execution
//!
//! This module handles routing CLI commands to their respective implementations.

use crate::app::{AppConfig, Settings};
use crate::cli::args::Commands;
use crate::cli::commands::{list_steps, run_pipeline};
use crate::pipeline::{CancellationFlag, PassthroughArgs};
use crate::subprocess::SubprocessManager;
use anyhow::Result;
use tracing::warn;

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(
    command: Commands,
    passthrough: PassthroughArgs,
    config: &AppConfig,
    cancellation: CancellationFlag,
) -> Result<()> {
    let settings = Settings::load(config.config_path.as_deref())?;

    match command {
        Commands::Run(args) => {
            run_pipeline(
                args,
                passthrough,
                settings,
                SubprocessManager::production(),
                cancellation,
            )
            .await
        }
        Commands::Steps { pipeline } => {
            if !passthrough.is_empty() {
                warn!("Per-step options only apply to `run`; ignoring them");
            }
            list_steps(&pipeline, &settings)
        }
    }
}
