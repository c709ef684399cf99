//! CLI output formatting module
//!
//! Progress display and summary tables for terminal output.

pub mod progress;
pub mod table;

pub use table::TableFormatter;
