//! Application module
//!
//! Process-level concerns shared by the subcommands:
//! - Configuration and settings loading
//! - Logging setup
//! - Fatal error reporting

pub mod config;
pub mod error_handling;
pub mod logging;

pub use config::{AppConfig, Settings};
pub use error_handling::handle_fatal_error;
pub use logging::init_logging;
