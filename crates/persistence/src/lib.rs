// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! SQLite host persistence for revtrail.
//!
//! A [`Database`] owns the schema (embedded Diesel migrations) and opens
//! [`SqliteSession`]s. Each session has its own connection and reports the
//! entity changes it makes to the shared [`AuditEventListener`], so audit
//! rows are written in the same transaction as the changes they describe.
//!
//! The reader methods on [`Database`] answer history questions: in which
//! revisions an entity changed, what it looked like at a given revision, and
//! what a revision contains.
//!
//! ## Testing
//!
//! In-memory databases use a uniquely named shared-cache URL so every
//! session of one database sees the same data while separate databases
//! stay isolated.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use diesel::SqliteConnection;
use revtrail::{AuditContext, AuditEventListener, RevisionData};
use revtrail_audit::middle_entity_name;
use revtrail_domain::{EntityId, EntityName};
use tracing::info;

mod backend;
mod data_models;
mod diesel_schema;
mod error;
mod mutations;
mod queries;
mod session;

#[cfg(test)]
mod tests;

pub use data_models::AuditRecord;
pub use error::PersistenceError;
pub use revtrail::{AuditSession, FlushMode, SessionKind, TransactionOutcome};
pub use session::SqliteSession;

/// Atomic counter for generating unique in-memory database names.
///
/// Each call to `new_in_memory()` receives a unique sequential ID.
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An audited SQLite database.
pub struct Database {
    url: String,
    conn: SqliteConnection,
    listener: AuditEventListener,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("url", &self.url)
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates an in-memory database.
    ///
    /// Each call receives a unique database instance via atomic counter. The
    /// database lives as long as this value.
    ///
    /// # Arguments
    ///
    /// * `context` - Audit configuration, strategy, and revision generator
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new_in_memory(context: Arc<AuditContext>) -> Result<Self, PersistenceError> {
        let db_id: u64 = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        let url: String = format!("file:revtrail_memdb_{db_id}?mode=memory&cache=shared");

        let mut conn: SqliteConnection = backend::initialize_database(&url)?;
        backend::verify_foreign_key_enforcement(&mut conn)?;

        Ok(Self {
            url,
            conn,
            listener: AuditEventListener::new(context),
        })
    }

    /// Creates or opens a file-based database.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the `SQLite` database file
    /// * `context` - Audit configuration, strategy, and revision generator
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new_with_file<P: AsRef<Path>>(
        path: P,
        context: Arc<AuditContext>,
    ) -> Result<Self, PersistenceError> {
        let url: String = path
            .as_ref()
            .to_str()
            .ok_or_else(|| {
                PersistenceError::InitializationError("Invalid database path".to_string())
            })?
            .to_string();

        let mut conn: SqliteConnection = backend::initialize_database(&url)?;
        backend::enable_wal_mode(&mut conn)?;
        backend::verify_foreign_key_enforcement(&mut conn)?;

        Ok(Self {
            url,
            conn,
            listener: AuditEventListener::new(context),
        })
    }

    /// The audit context sessions of this database report to.
    #[must_use]
    pub const fn context(&self) -> &Arc<AuditContext> {
        self.listener.manager().context()
    }

    /// The listener shared by all sessions of this database.
    #[must_use]
    pub const fn listener(&self) -> &AuditEventListener {
        &self.listener
    }

    /// Opens a session with its own connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_session(
        &self,
        kind: SessionKind,
        flush_mode: FlushMode,
    ) -> Result<SqliteSession, PersistenceError> {
        let conn: SqliteConnection = backend::open_connection(&self.url)?;
        info!(?kind, ?flush_mode, "Opened session");
        Ok(SqliteSession::new(
            conn,
            kind,
            flush_mode,
            self.listener.clone(),
        ))
    }

    /// All revision numbers, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_revisions(&mut self) -> Result<Vec<i64>, PersistenceError> {
        queries::revisions::list_revisions(&mut self.conn)
    }

    /// Revisions in which the entity changed, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_revisions(
        &mut self,
        entity_name: &EntityName,
        id: &EntityId,
    ) -> Result<Vec<i64>, PersistenceError> {
        let audit_entity: EntityName = self.audit_entity_name(entity_name);
        queries::audit::get_revisions(&mut self.conn, &audit_entity, id)
    }

    /// Every audit row of the entity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn get_history(
        &mut self,
        entity_name: &EntityName,
        id: &EntityId,
    ) -> Result<Vec<AuditRecord>, PersistenceError> {
        let audit_entity: EntityName = self.audit_entity_name(entity_name);
        queries::audit::get_history(&mut self.conn, &audit_entity, id)
    }

    /// The audit row describing the entity as of revision `revision`.
    ///
    /// # Returns
    ///
    /// `None` if the entity did not exist at that revision.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decoded.
    pub fn find_at_revision(
        &mut self,
        entity_name: &EntityName,
        id: &EntityId,
        revision: i64,
    ) -> Result<Option<AuditRecord>, PersistenceError> {
        let audit_entity: EntityName = self.audit_entity_name(entity_name);
        queries::audit::find_at_revision(&mut self.conn, &audit_entity, id, revision)
    }

    /// Element changes of one owner's `role` collection, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn get_collection_history(
        &mut self,
        entity_name: &EntityName,
        owner_id: &EntityId,
        role: &str,
    ) -> Result<Vec<AuditRecord>, PersistenceError> {
        let audit_entity: EntityName =
            self.audit_entity_name(&middle_entity_name(entity_name, role));
        queries::audit::get_collection_history(&mut self.conn, &audit_entity, owner_id)
    }

    /// The revision with its properties and changed entity names.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::NotFound` if the revision does not exist.
    pub fn get_revision(&mut self, revision: i64) -> Result<RevisionData, PersistenceError> {
        queries::revisions::get_revision(&mut self.conn, revision)
    }

    /// Every audit row written in `revision`, in write order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn get_entities_changed_at(
        &mut self,
        revision: i64,
    ) -> Result<Vec<AuditRecord>, PersistenceError> {
        queries::audit::get_rows_at_revision(&mut self.conn, revision)
    }

    /// Number of audit rows, for one entity or overall.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_audit_rows(
        &mut self,
        entity_name: Option<&EntityName>,
    ) -> Result<i64, PersistenceError> {
        let audit_entity: Option<EntityName> =
            entity_name.map(|name| self.audit_entity_name(name));
        queries::audit::count_audit_rows(&mut self.conn, audit_entity.as_ref())
    }

    fn audit_entity_name(&self, entity_name: &EntityName) -> EntityName {
        self.context().config().audit_entity_name(entity_name)
    }
}
