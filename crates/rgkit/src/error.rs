//! Error types for resource group operations.
//!
//! Driver failures are categorized so callers can decide how to react:
//! this crate never retries, but it tells the orchestration layer whether a
//! failure looks transient. Statement failures carry the statement
//! category and how many plan steps had already been applied, so a caller
//! can tell whether partial convergence occurred.

use std::fmt;
use thiserror::Error;

/// The category of a DDL statement, used for error reporting and logs.
///
/// Errors report the category instead of the literal SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// `CREATE RESOURCE GROUP`
    Create,
    /// `ALTER RESOURCE GROUP ... WITH (...)`
    AlterProperties,
    /// `ALTER RESOURCE GROUP ... ADD (...)`
    AddClassifier,
    /// `ALTER RESOURCE GROUP ... DROP (<id>)`
    DropClassifier,
    /// `DROP RESOURCE GROUP`
    DropGroup,
}

impl StatementKind {
    /// Short label for this statement category.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::AlterProperties => "alter-properties",
            Self::AddClassifier => "add-classifier",
            Self::DropClassifier => "drop-classifier",
            Self::DropGroup => "drop-group",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Categories of driver errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection dropped, refused or timed out
    Network,
    /// Authentication or privilege failure
    Permission,
    /// The resource group does not exist
    NotFound,
    /// The resource group or classifier already exists
    Conflict,
    /// The database rejected the statement (syntax or incompatible settings)
    Rejected,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this failure is typically transient.
    ///
    /// Advisory only: retry policy belongs to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Database connection issue",
            Self::Permission => "Access denied",
            Self::NotFound => "Resource group not found",
            Self::Conflict => "Resource group or classifier already exists",
            Self::Rejected => "Statement rejected by the database",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the host and port and that the frontend is reachable",
            Self::Permission => "Check the username and password, and that the user may manage resource groups",
            Self::NotFound => "Check the resource group name, or create it first",
            Self::Conflict => "Import the existing group or pick a different name",
            Self::Rejected => "Check for incompatible CPU settings or overlapping classifiers",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// A failure reported by the connection gateway.
///
/// `code` is the server error code; it is absent for transport failures
/// (connection refused, broken pipe, malformed packets).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{message}", code_prefix(.code.as_ref()))]
pub struct DriverError {
    /// Server error code, if the server answered
    pub code: Option<u16>,
    /// Error message
    pub message: String,
}

impl DriverError {
    /// An error answered by the server.
    pub fn server(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// A transport-level failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Categorize this failure.
    pub fn category(&self) -> ErrorCategory {
        let message = self.message.to_lowercase();

        match self.code {
            None => ErrorCategory::Network,
            Some(1044 | 1045 | 1142 | 1227) => ErrorCategory::Permission,
            Some(2002 | 2003 | 2006 | 2013) => ErrorCategory::Network,
            Some(_) if message.contains("not exist") || message.contains("not found") => {
                ErrorCategory::NotFound
            }
            Some(_) if message.contains("already exist") || message.contains("duplicate") => {
                ErrorCategory::Conflict
            }
            Some(_) if message.contains("access denied") => ErrorCategory::Permission,
            Some(1064 | 1105) => ErrorCategory::Rejected,
            Some(_) => ErrorCategory::Other,
        }
    }
}

fn code_prefix(code: Option<&u16>) -> String {
    code.map(|code| format!("server error {code}: "))
        .unwrap_or_default()
}

/// Errors that can occur during resource group operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Could not open a connection
    #[error("could not connect to {address}")]
    Connect {
        /// host:port that was dialed
        address: String,
        /// Underlying driver failure
        #[source]
        source: DriverError,
    },

    /// A DDL statement failed
    #[error("{kind} statement failed for resource group '{group}' after {completed} applied step(s)")]
    Statement {
        /// Category of the failing statement
        kind: StatementKind,
        /// Resource group name
        group: String,
        /// Plan steps that succeeded before the failure
        completed: usize,
        /// Underlying driver failure
        #[source]
        source: DriverError,
    },

    /// The introspection query failed
    #[error("could not read resource group '{group}'")]
    Query {
        /// Resource group name
        group: String,
        /// Underlying driver failure
        #[source]
        source: DriverError,
    },

    /// The resource group does not exist
    #[error("resource group not found: {name}")]
    NotFound {
        /// Resource group name
        name: String,
    },

    /// A classifier has no conditions set
    #[error("classifier #{index} of resource group '{group}' has no conditions set")]
    EmptyClassifier {
        /// Resource group name
        group: String,
        /// Position of the classifier in the desired list (0-indexed)
        index: usize,
    },

    /// A string value cannot be embedded in a quoted SQL literal
    #[error("{field} of resource group '{group}' contains a quote or backslash: {value:?}")]
    UnsafeLiteral {
        /// Resource group name
        group: String,
        /// Field holding the value
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// An observed classifier must be dropped but its id could not be decoded
    #[error("classifier of resource group '{group}' has no id and cannot be dropped: {classifier}")]
    UnidentifiedClassifier {
        /// Resource group name
        group: String,
        /// Rendered condition list of the classifier
        classifier: String,
    },

    /// A value could not be interpreted
    #[error("invalid {field}: {message}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// What was wrong
        message: String,
    },
}

impl Error {
    /// Get the error category of the underlying driver failure, if any.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connect { source, .. }
            | Error::Statement { source, .. }
            | Error::Query { source, .. } => source.category(),
            Error::NotFound { .. } => ErrorCategory::NotFound,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether some plan steps were applied before this error.
    pub fn is_partial(&self) -> bool {
        matches!(self, Error::Statement { completed, .. } if *completed > 0)
    }
}

/// Result type for resource group operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_network() {
        let err = DriverError::transport("connection refused");
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.category().is_retryable());
    }

    #[test]
    fn test_access_denied() {
        let err = DriverError::server(1045, "Access denied for user 'root'");
        assert_eq!(err.category(), ErrorCategory::Permission);
        assert!(!err.category().is_retryable());
    }

    #[test]
    fn test_not_found_by_message() {
        let err = DriverError::server(1064, "resource group rg1 does not exist");
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_conflict_by_message() {
        let err = DriverError::server(1064, "resource group rg1 already exists");
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_rejected_syntax() {
        let err = DriverError::server(1064, "Getting syntax error at line 1");
        assert_eq!(err.category(), ErrorCategory::Rejected);
    }

    #[test]
    fn test_statement_error_reports_category_not_sql() {
        let err = Error::Statement {
            kind: StatementKind::AlterProperties,
            group: "rg1".to_string(),
            completed: 2,
            source: DriverError::server(1064, "incompatible cpu settings"),
        };
        let text = err.to_string();
        assert!(text.contains("alter-properties"));
        assert!(text.contains("after 2 applied step(s)"));
        assert!(!text.contains("ALTER RESOURCE GROUP"));
        assert!(!text.contains("incompatible cpu settings"));
        assert!(err.is_partial());

        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("server error 1064: incompatible cpu settings")
        );
    }

    #[test]
    fn test_driver_error_display() {
        assert_eq!(
            DriverError::server(1045, "denied").to_string(),
            "server error 1045: denied"
        );
        assert_eq!(DriverError::transport("broken pipe").to_string(), "broken pipe");
    }
}
