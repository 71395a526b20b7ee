//! Error types for hashdb.
//!
//! Every error names the operation that failed (`op`) followed by the
//! offending condition, so a message reads like
//! `"begin_transaction: transaction already begun"`.
//!
//! Error codes are organized by category:
//!
//! - **HDB-E001 to HDB-E099**: Argument validation errors
//! - **HDB-E100 to HDB-E199**: Database type and open errors
//! - **HDB-E200 to HDB-E299**: Procedure (capability / transaction state) errors
//! - **HDB-E900 to HDB-E999**: Backend-internal errors (I/O, SQLite, index files)

use thiserror::Error;

/// Coarse error taxonomy callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid argument: bad hash length, bad hint, bad create path.
    Argument,
    /// The database type could not be determined (no match or ambiguous).
    UnknownType,
    /// A database or index file could not be opened.
    Open,
    /// Operation not supported by this backend, or transaction misuse.
    Procedure,
    /// Failure inside a backend while reading or writing data.
    Backend,
}

/// Main error type for hashdb operations.
#[derive(Error, Debug)]
pub enum HashDbError {
    /// An argument failed validation.
    #[error("{op}: {reason}")]
    InvalidArgument { op: &'static str, reason: String },

    /// Format detection found no match, or more than one.
    #[error("{op}: error determining hash database type of {path}")]
    UnknownType { op: &'static str, path: String },

    /// A database or index file could not be opened.
    #[error("{op}: failed to open {path}: {reason}")]
    OpenFailed {
        op: &'static str,
        path: String,
        reason: String,
    },

    /// The backend does not support the operation.
    #[error("{op}: operation not supported for this database type ({db_type})")]
    Unsupported { op: &'static str, db_type: String },

    /// The operation is not valid in the current transaction state.
    #[error("{op}: {reason}")]
    TransactionState { op: &'static str, reason: String },

    /// An index file exists but its contents are malformed.
    #[error("{op}: corrupt index {path}: {reason}")]
    CorruptIndex {
        op: &'static str,
        path: String,
        reason: String,
    },

    /// A database record could not be parsed.
    #[error("{op}: malformed record in {path} at offset {offset}")]
    MalformedRecord {
        op: &'static str,
        path: String,
        offset: u64,
    },

    /// I/O error occurred.
    #[error("{op}: I/O error: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// SQLite error occurred.
    #[error("{op}: SQLite error: {source}")]
    Sqlite {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HashDbError>;

impl HashDbError {
    pub(crate) fn argument(op: &'static str, reason: impl Into<String>) -> Self {
        HashDbError::InvalidArgument {
            op,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(op: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| HashDbError::Io { op, source }
    }

    pub(crate) fn sqlite(op: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| HashDbError::Sqlite { op, source }
    }

    /// Returns the taxonomy bucket for this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            HashDbError::InvalidArgument { .. } => ErrorKind::Argument,
            HashDbError::UnknownType { .. } => ErrorKind::UnknownType,
            HashDbError::OpenFailed { .. } => ErrorKind::Open,
            HashDbError::Unsupported { .. } | HashDbError::TransactionState { .. } => {
                ErrorKind::Procedure
            }
            HashDbError::CorruptIndex { .. }
            | HashDbError::MalformedRecord { .. }
            | HashDbError::Io { .. }
            | HashDbError::Sqlite { .. } => ErrorKind::Backend,
        }
    }

    /// Name of the operation that failed.
    pub const fn operation(&self) -> &'static str {
        match self {
            HashDbError::InvalidArgument { op, .. }
            | HashDbError::UnknownType { op, .. }
            | HashDbError::OpenFailed { op, .. }
            | HashDbError::Unsupported { op, .. }
            | HashDbError::TransactionState { op, .. }
            | HashDbError::CorruptIndex { op, .. }
            | HashDbError::MalformedRecord { op, .. }
            | HashDbError::Io { op, .. }
            | HashDbError::Sqlite { op, .. } => op,
        }
    }

    /// Returns the error code for this error.
    pub const fn error_code(&self) -> &'static str {
        match self {
            HashDbError::InvalidArgument { .. } => "HDB-E001",
            HashDbError::UnknownType { .. } => "HDB-E101",
            HashDbError::OpenFailed { .. } => "HDB-E102",
            HashDbError::Unsupported { .. } => "HDB-E201",
            HashDbError::TransactionState { .. } => "HDB-E202",
            HashDbError::CorruptIndex { .. } => "HDB-E901",
            HashDbError::MalformedRecord { .. } => "HDB-E902",
            HashDbError::Io { .. } => "HDB-E903",
            HashDbError::Sqlite { .. } => "HDB-E904",
        }
    }

    /// Returns the severity level for this error.
    pub const fn severity(&self) -> &'static str {
        match self {
            HashDbError::TransactionState { .. } => "warning",
            _ => "error",
        }
    }

    /// Returns remediation hints for this error, if available.
    pub const fn remediation(&self) -> Option<&'static str> {
        match self {
            HashDbError::InvalidArgument { .. } => {
                Some("Hashes must be 32 (MD5), 40 (SHA-1) or 64 (SHA-256) hex characters.")
            }
            HashDbError::UnknownType { .. } => Some(
                "Supported formats: NSRL, md5sum, EnCase, HashKeeper and SQLite (.kdb) hash sets.",
            ),
            HashDbError::OpenFailed { .. } => {
                Some("Ensure the database path is correct and the file is readable.")
            }
            HashDbError::Unsupported { .. } => {
                Some("Only SQLite (.kdb) hash databases accept updates.")
            }
            HashDbError::TransactionState { .. } => {
                Some("Begin a transaction before committing; roll back or commit before beginning another.")
            }
            HashDbError::CorruptIndex { .. } => {
                Some("Rebuild the index with `hashdb index`.")
            }
            HashDbError::MalformedRecord { .. } => {
                Some("The database changed after the index was built. Rebuild the index.")
            }
            HashDbError::Io { .. } => Some("Check file permissions and disk space."),
            HashDbError::Sqlite { .. } => {
                Some("The database may be locked or corrupted. Try reopening the database.")
            }
        }
    }
}
