//! Exit code definitions for the qx CLI
//!
//! Scripts wrapping `qx` depend on these values; changing one is a breaking change.

use std::fmt;

/// Process exit codes, grouped by what a calling script can do about them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Local I/O or an unexpected failure
    GeneralError = 1,

    /// Bad arguments, malformed path or an impossible upload destination
    UsageError = 2,

    /// Server unreachable, timed out or failing (retryable)
    NetworkError = 3,

    /// Login rejected or access denied
    AuthError = 4,

    /// No project, subject, session, file or profile at the given name
    NotFound = 5,

    /// The target file or object already exists
    Conflict = 6,

    /// Operation not supported for this path, e.g. deleting a single file
    UnsupportedOperation = 7,

    /// Interrupted by Ctrl+C
    Interrupted = 130,
}

impl ExitCode {
    const ALL: [ExitCode; 9] = [
        Self::Success,
        Self::GeneralError,
        Self::UsageError,
        Self::NetworkError,
        Self::AuthError,
        Self::NotFound,
        Self::Conflict,
        Self::UnsupportedOperation,
        Self::Interrupted,
    ];

    /// Convert exit code to i32 for use with std::process::exit
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Look up the exit code with the given value
    pub fn from_i32(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_i32() == code)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "Operation completed successfully",
            Self::GeneralError => "General error",
            Self::UsageError => "Invalid arguments or path format",
            Self::NetworkError => "Network error (retryable)",
            Self::AuthError => "Authentication or permission failure",
            Self::NotFound => "Resource not found",
            Self::Conflict => "Target already exists",
            Self::UnsupportedOperation => "Operation not supported",
            Self::Interrupted => "Operation interrupted",
        }
    }
}

impl From<&qx_core::Error> for ExitCode {
    fn from(err: &qx_core::Error) -> Self {
        Self::from_i32(err.exit_code()).unwrap_or(Self::GeneralError)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}
