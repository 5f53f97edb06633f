//! Output formatting for the kg CLI
//!
//! Commands render their results either as human-readable tables or as JSON
//! for scripts. Colors and truncation follow whether stdout is a TTY.

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use kg_daemon::storage::ConstructionStatus;
use serde::Serialize;
use std::io::IsTerminal;

mod json;
mod table;

pub use self::json::JsonOutput;
pub use self::table::TableOutput;

/// Output format for CLI results
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables (default)
    #[default]
    Table,
    /// JSON for machine consumption
    Json,
}

/// Configuration for output rendering
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Disable colored output
    pub no_color: bool,
    /// Disable truncation of long values
    pub no_truncate: bool,
    /// Override terminal width (None = auto-detect)
    pub width: Option<usize>,
    /// Compact mode (blank table borders, single-line JSON)
    pub compact: bool,
}

impl OutputConfig {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            no_color: false,
            no_truncate: false,
            width: None,
            compact: false,
        }
    }

    /// When stdout is not a TTY (piped or redirected), colors and
    /// truncation are disabled.
    pub fn auto_detect(format: OutputFormat) -> Self {
        let is_tty = std::io::stdout().is_terminal();
        Self {
            format,
            no_color: !is_tty,
            no_truncate: !is_tty,
            width: None,
            compact: false,
        }
    }

    pub fn effective_width(&self) -> usize {
        self.width.unwrap_or_else(terminal_width)
    }

    pub fn use_colors(&self) -> bool {
        !self.no_color
    }

    pub fn should_truncate(&self) -> bool {
        !self.no_truncate
    }

    pub fn without_colors(mut self) -> Self {
        self.no_color = true;
        self
    }

    pub fn without_truncation(mut self) -> Self {
        self.no_truncate = true;
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub fn compact(mut self) -> Self {
        self.compact = true;
        self
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::auto_detect(OutputFormat::Table)
    }
}

/// Types with a human-readable rendering; JSON comes from `Serialize`.
pub trait TableDisplay: Serialize {
    fn to_table(&self, config: &OutputConfig) -> String;
}

impl<T: TableDisplay> TableDisplay for Vec<T> {
    fn to_table(&self, config: &OutputConfig) -> String {
        self.iter()
            .map(|item| item.to_table(config))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Result wrapper that picks the rendering from the configured format
pub struct Output<T> {
    data: T,
    config: OutputConfig,
}

impl<T: TableDisplay> Output<T> {
    pub fn new(data: T, format: OutputFormat) -> Self {
        Self {
            data,
            config: OutputConfig::auto_detect(format),
        }
    }

    pub fn with_config(data: T, config: OutputConfig) -> Self {
        Self { data, config }
    }

    /// Render the output to stdout
    pub fn render(&self) -> anyhow::Result<()> {
        println!("{}", self.render_to_string());
        Ok(())
    }

    pub fn render_to_string(&self) -> String {
        match self.config.format {
            OutputFormat::Table => self.data.to_table(&self.config),
            OutputFormat::Json => JsonOutput::format(&self.data, &self.config),
        }
    }
}

/// Status name, colored by lifecycle stage when colors are enabled.
pub fn status_label(status: ConstructionStatus, config: &OutputConfig) -> ColoredString {
    let label = status.as_str();
    if !config.use_colors() {
        return label.normal();
    }
    match status {
        ConstructionStatus::Running | ConstructionStatus::Validating => label.cyan(),
        ConstructionStatus::Cancelling => label.yellow(),
        ConstructionStatus::Completed => label.green().bold(),
        ConstructionStatus::Failed => label.red().bold(),
        ConstructionStatus::Cancelled => label.dimmed(),
        ConstructionStatus::NotStarted => label.normal(),
    }
}

/// Section heading, bold cyan when colors are enabled.
pub fn heading(text: &str, config: &OutputConfig) -> String {
    if config.use_colors() {
        text.cyan().bold().to_string()
    } else {
        text.to_string()
    }
}

/// Truncate a string to a maximum width with ellipsis
pub fn truncate(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let truncated: String = s.chars().take(max_width - 3).collect();
        format!("{}...", truncated)
    }
}

/// Get terminal width, defaulting to 80 if unavailable
pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}
