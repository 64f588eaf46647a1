//! Error types for CLI operations

use std::fmt;

use appleid_auth::AppleIdError;
use thiserror::Error;

/// CLI errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Library error talking to or about Apple
    #[error("{0}")]
    Apple(#[from] AppleIdError),

    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl CliError {
    /// Get user-friendly suggestions for resolving the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Apple(AppleIdError::Fetch(_)) => vec![
                "Check network access to appleid.apple.com",
                "Verify --endpoint or APPLEID_ENDPOINT",
            ],
            Self::Apple(AppleIdError::KeyNotFound(_)) => vec![
                "The token may not have been issued by Apple",
                "Run `appleid keys --no-cache` to list the key IDs Apple publishes",
            ],
            Self::Apple(AppleIdError::Input(_)) | Self::InvalidArguments(_) => {
                vec!["Use --help to see expected arguments"]
            }
            Self::Config(_) => vec!["Check the --config file and APPLEID_* environment variables"],
            _ => vec![],
        }
    }

    /// Render the error for stderr: message, category, then suggestions
    pub fn report(&self) -> String {
        let mut report = format!("Error: {self}\n  Category: {}", self.category());
        for suggestion in self.suggestions() {
            report.push_str("\n  - ");
            report.push_str(suggestion);
        }
        report
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Apple(AppleIdError::Fetch(_)) => ErrorCategory::Connection,
            Self::Apple(AppleIdError::Verification { .. } | AppleIdError::KeyNotFound(_)) => {
                ErrorCategory::Rejected
            }
            Self::Apple(AppleIdError::Input(_)) | Self::InvalidArguments(_) => ErrorCategory::User,
            Self::Apple(_) | Self::Json(_) => ErrorCategory::Parsing,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connection,
    Rejected,
    User,
    Parsing,
    Config,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "Connection"),
            Self::Rejected => write!(f, "Rejected"),
            Self::User => write!(f, "User Input"),
            Self::Parsing => write!(f, "Parsing"),
            Self::Config => write!(f, "Configuration"),
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
