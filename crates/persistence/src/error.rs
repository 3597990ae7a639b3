// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use revtrail_audit::AuditError;
use revtrail_domain::DomainError;

/// Errors that can occur during persistence operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// A database error occurred.
    DatabaseError(String),
    /// Database connection failed.
    DatabaseConnectionFailed(String),
    /// Database migration failed.
    MigrationFailed(String),
    /// Query execution failed.
    QueryFailed(String),
    /// Serialization/deserialization error.
    SerializationError(String),
    /// Initialization error.
    InitializationError(String),
    /// Foreign key enforcement is not enabled.
    ForeignKeyEnforcementNotEnabled,
    /// A stored row could not be turned back into domain values.
    InvalidRow(String),
    /// The requested resource was not found.
    NotFound(String),
    /// The session has been closed.
    SessionClosed,
    /// The operation requires an active transaction.
    NoActiveTransaction,
    /// A transaction is already in progress on the session.
    TransactionAlreadyActive,
    /// Temporary sessions cannot begin or complete transactions.
    TemporarySession,
    /// A manual flush session was committed with this many unflushed
    /// entity writes.
    UnflushedWrites(usize),
    /// Audit processing failed.
    Audit(AuditError),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::DatabaseConnectionFailed(msg) => {
                write!(f, "Database connection failed: {msg}")
            }
            Self::MigrationFailed(msg) => write!(f, "Migration failed: {msg}"),
            Self::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
            Self::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            Self::InitializationError(msg) => write!(f, "Initialization error: {msg}"),
            Self::ForeignKeyEnforcementNotEnabled => {
                write!(f, "Foreign key enforcement is not enabled")
            }
            Self::InvalidRow(msg) => write!(f, "Invalid stored row: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::SessionClosed => write!(f, "Session is closed"),
            Self::NoActiveTransaction => write!(f, "No transaction is in progress"),
            Self::TransactionAlreadyActive => write!(f, "A transaction is already in progress"),
            Self::TemporarySession => {
                write!(f, "Temporary sessions cannot begin or complete transactions")
            }
            Self::UnflushedWrites(count) => {
                write!(f, "Commit with {count} unflushed writes in manual flush mode")
            }
            Self::Audit(err) => write!(f, "Audit error: {err}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<diesel::result::Error> for PersistenceError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Self::NotFound("Record not found".to_string()),
            _ => Self::DatabaseError(err.to_string()),
        }
    }
}

impl From<diesel::ConnectionError> for PersistenceError {
    fn from(err: diesel::ConnectionError) -> Self {
        Self::DatabaseConnectionFailed(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<AuditError> for PersistenceError {
    fn from(err: AuditError) -> Self {
        Self::Audit(err)
    }
}

impl From<DomainError> for PersistenceError {
    fn from(err: DomainError) -> Self {
        Self::Audit(AuditError::Domain(err))
    }
}

impl From<PersistenceError> for AuditError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Audit(inner) => inner,
            PersistenceError::SessionClosed => Self::SessionClosed,
            PersistenceError::NoActiveTransaction => Self::NoActiveTransaction,
            other => Self::Storage(other.to_string()),
        }
    }
}
