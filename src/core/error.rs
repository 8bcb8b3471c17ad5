//! Error types for the database system
//!
//! This module defines all error types that can occur while opening a database
//! or executing a transaction, plus the numeric codes the legacy API reports.

use serde::{Deserialize, Serialize};

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error codes exposed by the legacy browser database API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum SqlErrorCode {
    /// The transaction failed for reasons unrelated to the database itself
    Unknown = 0,
    /// The statement failed for database reasons not covered by another code
    Database = 1,
    /// The database version did not match the expected version
    Version = 2,
    /// The statement returned more data than can be handled
    TooLarge = 3,
    /// Not enough remaining storage space
    Quota = 4,
    /// Syntax error, wrong number of arguments, or a disallowed statement
    Syntax = 5,
    /// A constraint failure occurred
    Constraint = 6,
    /// A lock could not be acquired in a reasonable time
    Timeout = 7,
}

impl SqlErrorCode {
    /// Numeric value of the code
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Error types for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Opening or creating the underlying connection failed
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Statement execution failed
    #[error("Statement error in `{sql}`: {message}")]
    StatementError { sql: String, message: String },

    /// A write statement was issued inside a read-only transaction
    #[error("Statement is not allowed in a read-only transaction: {0}")]
    ReadOnlyViolation(String),

    /// The driver produced a result that cannot be shaped into a result set
    #[error("Malformed result: {0}")]
    MalformedResult(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// The serialized operation queue no longer accepts work
    #[error("Operation queue closed: {0}")]
    QueueClosed(String),

    /// A user callback panicked while the transaction was running
    #[error("Callback panicked: {0}")]
    CallbackPanic(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Create a new connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionError(msg.into())
    }

    /// Create a new statement error
    pub fn statement(sql: impl Into<String>, message: impl Into<String>) -> Self {
        DatabaseError::StatementError {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Create a read-only violation for the given statement
    pub fn read_only<S: Into<String>>(sql: S) -> Self {
        DatabaseError::ReadOnlyViolation(sql.into())
    }

    /// Create a malformed result error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        DatabaseError::MalformedResult(msg.into())
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        DatabaseError::TransactionError(msg.into())
    }

    /// Create a queue closed error
    pub fn queue_closed<S: Into<String>>(msg: S) -> Self {
        DatabaseError::QueueClosed(msg.into())
    }

    /// Create a callback panic error from the panic message
    pub fn callback_panic<S: Into<String>>(msg: S) -> Self {
        DatabaseError::CallbackPanic(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }

    /// Whether this error came from executing a statement (engine failure,
    /// read-only violation or malformed result) rather than from the
    /// connection or the transaction machinery
    pub fn is_statement_error(&self) -> bool {
        match self {
            DatabaseError::StatementError { .. }
            | DatabaseError::ReadOnlyViolation(_)
            | DatabaseError::MalformedResult(_) => true,
            #[cfg(feature = "sqlite")]
            DatabaseError::SqliteError(_) => true,
            _ => false,
        }
    }

    /// Legacy error code for this error
    pub fn code(&self) -> SqlErrorCode {
        match self {
            DatabaseError::StatementError { .. } => SqlErrorCode::Database,
            DatabaseError::ReadOnlyViolation(_) => SqlErrorCode::Syntax,
            DatabaseError::MalformedResult(_) => SqlErrorCode::Database,
            #[cfg(feature = "sqlite")]
            DatabaseError::SqliteError(e) => sqlite_error_code(e),
            _ => SqlErrorCode::Unknown,
        }
    }
}

#[cfg(feature = "sqlite")]
fn sqlite_error_code(err: &rusqlite::Error) -> SqlErrorCode {
    use rusqlite::ErrorCode;

    match err {
        rusqlite::Error::InvalidParameterCount(_, _)
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::MultipleStatement => return SqlErrorCode::Syntax,
        _ => {}
    }

    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => SqlErrorCode::Constraint,
        Some(ErrorCode::TooBig) => SqlErrorCode::TooLarge,
        Some(ErrorCode::DiskFull) => SqlErrorCode::Quota,
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => SqlErrorCode::Timeout,
        _ if err.to_string().contains("syntax error") => SqlErrorCode::Syntax,
        _ => SqlErrorCode::Database,
    }
}
