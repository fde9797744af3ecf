//! Error types for ledgerlift-core

use std::fmt;

use thiserror::Error;

/// Result type alias using ledgerlift-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// A single field-level validation failure reported by the destination server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field path, when the server reported one (e.g. `username`)
    pub field: Option<String>,
    /// Human-readable message
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Errors that can occur in ledgerlift-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// An entry failed authentication against its chain position
    #[error("Chain integrity error in journal {journal} at entry {entry}: {reason}")]
    ChainIntegrity {
        journal: String,
        entry: String,
        reason: String,
    },

    /// A decrypted entry carried an action tag outside {ADD, CHANGE, DELETE}
    #[error("Unknown sync action '{action}' in journal {journal}")]
    UnknownAction { journal: String, action: String },

    /// A decrypted entry was not a well-formed sync record
    #[error("Invalid sync entry in journal {journal}: {reason}")]
    InvalidSyncEntry { journal: String, reason: String },

    /// The derived key could not open the account's key material
    #[error("Wrong encryption password: {0}")]
    Authentication(String),

    /// The destination does not look like a supported server
    #[error("Server not found at {0}. Please check the server URL.")]
    ServerNotFound(String),

    /// Field-level errors returned by the destination server
    #[error("Validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// The destination rejected the credentials
    #[error("Wrong username or password")]
    Unauthorized,

    /// Generic destination API failure
    #[error("API error: {0}")]
    Api(String),

    /// Key handling or cipher failure outside of chain verification
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Destination store misuse or failure
    #[error("Store error: {0}")]
    Store(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The run was cancelled between chunks or journals
    #[error("Migration cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error must abort the whole run instead of a single journal.
    #[must_use]
    pub const fn is_account_level(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_)
                | Self::ServerNotFound(_)
                | Self::Validation(_)
                | Self::Unauthorized
                | Self::Cancelled
        )
    }

    pub(crate) fn chain(
        journal: impl Into<String>,
        entry: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ChainIntegrity {
            journal: journal.into(),
            entry: entry.into(),
            reason: reason.into(),
        }
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_level_errors_abort_the_run() {
        assert!(Error::Unauthorized.is_account_level());
        assert!(Error::Authentication("bad".into()).is_account_level());
        assert!(Error::ServerNotFound("https://x".into()).is_account_level());
        assert!(!Error::chain("j", "e", "mac").is_account_level());
        assert!(!Error::Store("down".into()).is_account_level());
    }

    #[test]
    fn validation_message_lists_fields() {
        let error = Error::Validation(vec![
            FieldError {
                field: Some("username".into()),
                message: "already taken".into(),
            },
            FieldError {
                field: None,
                message: "try again".into(),
            },
        ]);
        assert_eq!(
            error.to_string(),
            "Validation failed: username: already taken; try again"
        );
    }
}
