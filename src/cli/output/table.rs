//! Table output formatting for CLI commands
//!
//! Renders the end-of-batch job summary with comfy-table. Supports
//! color-coded status cells, automatic column sizing, and plain icon
//! output for terminals without color.

use crate::domain::models::{Job, JobStatus};
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Create a new table formatter with custom settings
    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format the jobs of a batch as a summary table
    pub fn format_jobs(&self, jobs: &[Job]) -> String {
        let mut table = self.create_base_table();

        // Header row
        table.set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Chart").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Errors").add_attribute(Attribute::Bold),
            Cell::new("Output").add_attribute(Attribute::Bold),
        ]);

        // Data rows
        for job in jobs {
            let chart = truncate_text(&job.input.display().to_string(), 40);

            let status_cell = if self.use_colors {
                Cell::new(job.status.to_string()).fg(status_color(job.status))
            } else {
                Cell::new(format!("{} {}", status_icon(job.status), job.status))
            };

            let errors = if job.errors.is_empty() {
                "-".to_string()
            } else {
                job.errors.len().to_string()
            };

            let output = if job.status == JobStatus::Completed {
                truncate_text(&job.output.display().to_string(), 40)
            } else {
                "-".to_string()
            };

            table.add_row(vec![
                Cell::new(job.id.to_string()),
                Cell::new(&chart),
                status_cell,
                Cell::new(&errors),
                Cell::new(&output),
            ]);
        }

        table.to_string()
    }

    /// Create a base table with common settings
    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        // Use UTF-8 preset for nice borders
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
pub fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    // Check for dumb terminal
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

/// Map job status to color
fn status_color(status: JobStatus) -> Color {
    match status {
        JobStatus::Completed => Color::Green,
        JobStatus::Sampling => Color::Cyan,
        JobStatus::Assigned => Color::Yellow,
        JobStatus::Failed => Color::Red,
        JobStatus::Pending => Color::White,
    }
}

/// Map job status to icon
fn status_icon(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Completed => "✓",
        JobStatus::Sampling => "⟳",
        JobStatus::Assigned => "●",
        JobStatus::Failed => "✗",
        JobStatus::Pending => "○",
    }
}

/// Truncate text to max length with ellipsis
fn truncate_text(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        format!("{}...", &text[..max_len.saturating_sub(3)])
    }
}
