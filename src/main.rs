use clap::Parser;
use photopipe::app::{handle_fatal_error, init_logging, AppConfig};
use photopipe::cli::{execute_command, extract_passthrough, Cli};
use photopipe::pipeline::CancellationFlag;
use tracing::warn;

#[tokio::main]
async fn main() {
    let extracted = match extract_passthrough(std::env::args()) {
        Ok(extracted) => extracted,
        Err(e) => handle_fatal_error(e.into(), 0),
    };
    let cli = Cli::parse_from(extracted.argv);

    let config = AppConfig::new(cli.verbose, cli.config.clone());
    init_logging(&config);

    let cancellation = CancellationFlag::new();
    let on_interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping before the next step");
            on_interrupt.cancel();
        }
    });

    let result = execute_command(cli.command, extracted.passthrough, &config, cancellation).await;

    if let Err(e) = result {
        handle_fatal_error(e, config.verbose);
    }
}
