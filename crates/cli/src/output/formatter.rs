//! Output formatter for human-readable and JSON output
//!
//! Results go to stdout. Status lines, warnings and errors go to stderr,
//! except the final success line, which belongs to the command output.

use serde::Serialize;

use super::OutputConfig;
use crate::exit_code::ExitCode;

const GREEN: &str = "32";
const RED: &str = "31";
const YELLOW: &str = "33";

/// Formatter for CLI output
///
/// In JSON mode every command prints exactly one JSON document on success,
/// and failures print a JSON error object on stderr.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: OutputConfig,
}

/// JSON error document
#[derive(Debug, Serialize)]
struct ErrorOutput<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Check if JSON output mode is enabled
    pub fn is_json(&self) -> bool {
        self.config.json
    }

    /// Check if colors are enabled
    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    fn mark(&self, symbol: &str, color: &str) -> String {
        if self.colors_enabled() {
            format!("\x1b[{color}m{symbol}\x1b[0m")
        } else {
            symbol.to_string()
        }
    }

    /// Output a success message (human mode only)
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        println!("{} {message}", self.mark("✓", GREEN));
    }

    /// Output a warning message
    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        eprintln!("{} {message}", self.mark("⚠", YELLOW));
    }

    /// Output an error message
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        self.emit_error(message, None);
    }

    /// Report a failed operation and map it to an exit code
    pub fn fail(&self, err: &qx_core::Error) -> ExitCode {
        let code = ExitCode::from(err);
        self.emit_error(&err.to_string(), Some(code));
        code
    }

    fn emit_error(&self, message: &str, code: Option<ExitCode>) {
        if self.config.json {
            let output = ErrorOutput {
                error: message,
                exit_code: code.map(ExitCode::as_i32),
            };
            match serde_json::to_string_pretty(&output) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{message}"),
            }
        } else {
            eprintln!("{} {message}", self.mark("✗", RED));
        }
    }

    /// Output a pre-built JSON document
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text (respects quiet mode)
    pub fn println(&self, message: &str) {
        if !self.config.quiet {
            println!("{message}");
        }
    }
}
