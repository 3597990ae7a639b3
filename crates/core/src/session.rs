// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The capabilities the audit engine needs from a host session.
//!
//! The host persistence layer implements [`AuditSession`]; the engine never
//! inspects concrete session types. The decision of where pending audit
//! work runs is made from [`SessionKind`], [`FlushMode`] and
//! [`AuditSession::is_closed`] alone.

use std::sync::atomic::{AtomicU64, Ordering};

use revtrail_audit::{AuditError, AuditRow, AuditRowKey};
use revtrail_domain::EntityName;
use tracing::{debug, warn};

use crate::revision::RevisionData;

static TRANSACTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Whether a session keeps an identity map and first-level cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Defers writes to flush and caches what it wrote.
    Stateful,
    /// Writes immediately and caches nothing.
    Stateless,
}

/// When a stateful session pushes pending writes to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlushMode {
    /// Before queries and before commit.
    #[default]
    Auto,
    /// Before commit only.
    Commit,
    /// Only when `flush` is called explicitly.
    Manual,
}

/// Stable identity of one host transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocates an identifier unique within this process.
    #[must_use]
    pub fn allocate() -> Self {
        Self(TRANSACTION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// How a transaction finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// The transaction committed.
    Committed,
    /// The transaction rolled back.
    RolledBack,
}

/// Runs just before the transaction completes; an error aborts the commit.
pub type BeforeCompletionCallback =
    Box<dyn FnOnce(&mut dyn AuditSession) -> Result<(), AuditError> + Send>;

/// Runs after the transaction completes, on commit and on rollback.
pub type AfterCompletionCallback =
    Box<dyn FnOnce(&mut dyn AuditSession, TransactionOutcome) + Send>;

/// A host session as seen by the audit engine.
pub trait AuditSession {
    /// Stateful or stateless.
    fn kind(&self) -> SessionKind;

    /// Whether the session has been closed.
    fn is_closed(&self) -> bool;

    /// The session's flush mode.
    fn flush_mode(&self) -> FlushMode;

    /// Identity of the transaction the session is enlisted in.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NoActiveTransaction` when none is in progress.
    fn current_transaction(&self) -> Result<TransactionId, AuditError>;

    /// Whether the transaction is still going to commit.
    ///
    /// Returns `false` once the transaction has been marked rollback-only.
    fn is_transaction_active(&self) -> bool;

    /// Registers a callback to run before the transaction completes.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is in progress.
    fn register_before_completion(
        &mut self,
        callback: BeforeCompletionCallback,
    ) -> Result<(), AuditError>;

    /// Registers a callback to run after the transaction completes.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is in progress.
    fn register_after_completion(
        &mut self,
        callback: AfterCompletionCallback,
    ) -> Result<(), AuditError>;

    /// Opens a short-lived session on the same connection and transaction.
    ///
    /// The temporary session carries no audit listener, so writes made
    /// through it never produce further audit work.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is unavailable.
    fn open_temporary_session(
        &mut self,
        kind: SessionKind,
    ) -> Result<Box<dyn AuditSession>, AuditError>;

    /// Pushes pending writes to storage.
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails.
    fn flush(&mut self) -> Result<(), AuditError>;

    /// Closes the session.
    ///
    /// # Errors
    ///
    /// Returns an error if pending resources cannot be released.
    fn close(&mut self) -> Result<(), AuditError>;

    /// Whether the revision is already persisted and visible to this session.
    fn contains_revision(&self, revision: &RevisionData) -> bool;

    /// Persists the revision and assigns its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn save_revision(&mut self, revision: &mut RevisionData) -> Result<(), AuditError>;

    /// Records that an entity with `entity_name` changed in `revision`.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn record_changed_entity(
        &mut self,
        revision: i64,
        entity_name: &EntityName,
    ) -> Result<(), AuditError>;

    /// Writes an audit row.
    ///
    /// # Errors
    ///
    /// Returns an error if the revision does not exist or the insert fails.
    fn insert_audit_row(&mut self, row: AuditRow) -> Result<(), AuditError>;

    /// Removes a previously written audit row.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_audit_row(&mut self, key: &AuditRowKey) -> Result<(), AuditError>;

    /// Sets the end revision of open rows matching `key` (other than `key.revision`)
    /// to `key.revision` and returns how many rows were closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    fn close_previous_revision(&mut self, key: &AuditRowKey) -> Result<usize, AuditError>;

    /// Re-opens rows matching `key` that were closed at `key.revision`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    fn reopen_previous_revision(&mut self, key: &AuditRowKey) -> Result<usize, AuditError>;

    /// Drops a written audit row from the first-level cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot evict.
    fn evict_audit_data(&mut self, key: &AuditRowKey) -> Result<(), AuditError>;
}

/// A temporary session that is closed when it goes out of scope.
///
/// Call [`ScopedSession::finish`] on the success path to observe close
/// errors; on early return the session is closed on drop and a close
/// failure is only logged.
pub struct ScopedSession {
    session: Box<dyn AuditSession>,
    closed: bool,
}

impl ScopedSession {
    /// Opens a temporary session of `kind` from `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent cannot open a temporary session.
    pub fn open(parent: &mut dyn AuditSession, kind: SessionKind) -> Result<Self, AuditError> {
        let session: Box<dyn AuditSession> = parent.open_temporary_session(kind)?;
        debug!(?kind, "Opened temporary session");
        Ok(Self {
            session,
            closed: false,
        })
    }

    /// The wrapped session.
    pub fn session(&mut self) -> &mut dyn AuditSession {
        self.session.as_mut()
    }

    /// Flushes the wrapped session.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> Result<(), AuditError> {
        self.session.flush()
    }

    /// Closes the wrapped session.
    ///
    /// # Errors
    ///
    /// Returns an error if closing fails.
    pub fn finish(mut self) -> Result<(), AuditError> {
        self.closed = true;
        self.session.close()
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.session.close() {
            warn!(error = %err, "Failed to close temporary session");
        }
    }
}
