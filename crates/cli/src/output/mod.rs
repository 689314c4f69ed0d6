//! Output formatting utilities
//!
//! This module provides formatters for CLI output in both human-readable
//! and JSON formats. It also handles progress bars and colored output.

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::ProgressBar;

use qx_core::config::{ColorMode, Defaults, OutputFormat};

/// Output configuration derived from CLI flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Disable progress bar
    pub no_progress: bool,
    /// Suppress non-error output
    pub quiet: bool,
}

impl OutputConfig {
    /// Fold the configured defaults into flags left unset on the command line
    pub fn with_defaults(mut self, defaults: &Defaults) -> Self {
        self.json |= defaults.output == OutputFormat::Json;
        self.no_color |= defaults.color == ColorMode::Never;
        self.no_progress |= !defaults.progress;
        self
    }
}
