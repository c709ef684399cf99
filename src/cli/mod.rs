//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use crate::application::BATCH_FATAL_EXIT;

/// Print a startup or wiring failure and exit.
///
/// Uses a fixed exit code outside the per-job error range so callers can
/// tell "the coordinator never ran" apart from "N charts failed".
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let payload = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!("{payload}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(BATCH_FATAL_EXIT)
}
