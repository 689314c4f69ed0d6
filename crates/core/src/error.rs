//! Error types for qx-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use thiserror::Error;

/// Result type alias for qx-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for qx-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Path string violates the path grammar or the schema nesting
    #[error("Malformed path: {0}")]
    MalformedPath(String),

    /// Upload destination lacks the project/subject/experiment prefix
    /// or cannot be completed into a resource
    #[error("Invalid upload target: {0}")]
    InvalidUploadTarget(String),

    /// A required resolution step matched nothing
    #[error("No such XNAT object: {0}")]
    ChildNotFound(String),

    /// Upload session does not exist and cannot be created without a modality
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The requested operation is rejected for this object type
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// An argument is not acceptable where it was given
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Profile not found
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Profile already exists
    #[error("Profile already exists: {0}")]
    ProfileExists(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Remote or local resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// Conflict error
    #[error("Conflict: {0}")]
    Conflict(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::MalformedPath(_)
            | Error::InvalidUploadTarget(_)
            | Error::InvalidArgument(_)
            | Error::Config(_) => 2, // UsageError
            Error::Network(_) => 3, // NetworkError
            Error::Auth(_) => 4,    // AuthError
            Error::ChildNotFound(_)
            | Error::SessionNotFound(_)
            | Error::NotFound(_)
            | Error::ProfileNotFound(_) => 5, // NotFound
            Error::Conflict(_) | Error::ProfileExists(_) => 6, // Conflict
            Error::UnsupportedOperation(_) => 7, // UnsupportedOperation
            _ => 1,                              // GeneralError
        }
    }

    /// Whether the error only reports that nothing matched
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ChildNotFound(_) | Error::SessionNotFound(_) | Error::NotFound(_)
        )
    }
}
