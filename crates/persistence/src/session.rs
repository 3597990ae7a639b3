// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Sessions over a SQLite connection.
//!
//! A [`SqliteSession`] owns one connection (shared with the temporary
//! sessions it opens), runs at most one transaction at a time, and reports
//! entity lifecycle events to its [`AuditEventListener`].
//!
//! Stateful sessions keep an identity map of entity states and defer entity
//! and audit row writes until [`AuditSession::flush`]; revision markers are
//! inserted immediately because their identifier is needed right away.
//! Stateless sessions write through and cache nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use diesel::SqliteConnection;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use parking_lot::{Mutex, MutexGuard};
use revtrail::{
    AfterCompletionCallback, AuditEventListener, AuditSession, BeforeCompletionCallback,
    FlushMode, RevisionData, SessionKind, TransactionId, TransactionOutcome,
};
use revtrail_audit::{AuditError, AuditRow, AuditRowKey, ElementChange};
use revtrail_domain::{
    EntityDescriptor, EntityId, EntityName, EntityState, RevisionType, Value,
};
use tracing::{debug, info, warn};

use crate::error::PersistenceError;
use crate::mutations::{audit, entities, revisions};
use crate::queries;

type EntityKey = (EntityName, EntityId);

/// A write a stateful session holds until flush.
#[derive(Debug, Clone)]
enum PendingWrite {
    InsertEntity {
        entity_name: EntityName,
        id: EntityId,
        state: EntityState,
    },
    UpdateEntity {
        entity_name: EntityName,
        id: EntityId,
        state: EntityState,
    },
    DeleteEntity {
        entity_name: EntityName,
        id: EntityId,
    },
    Collection {
        entity_name: EntityName,
        owner_id: EntityId,
        role: String,
        changes: Vec<ElementChange>,
    },
    AuditRow(AuditRow),
}

impl PendingWrite {
    fn apply(&self, conn: &mut SqliteConnection) -> Result<(), PersistenceError> {
        match self {
            Self::InsertEntity {
                entity_name,
                id,
                state,
            } => entities::insert_entity(conn, entity_name, id, state),
            Self::UpdateEntity {
                entity_name,
                id,
                state,
            } => entities::update_entity_state(conn, entity_name, id, state),
            Self::DeleteEntity { entity_name, id } => {
                entities::delete_entity(conn, entity_name, id)
            }
            Self::Collection {
                entity_name,
                owner_id,
                role,
                changes,
            } => entities::apply_collection_changes(conn, entity_name, owner_id, role, changes),
            Self::AuditRow(row) => audit::insert_audit_row(conn, row),
        }
    }

    fn is_audit_row(&self, key: &AuditRowKey) -> bool {
        matches!(self, Self::AuditRow(row) if &row.key == key)
    }
}

/// The transaction a session is enlisted in.
struct ActiveTransaction {
    id: TransactionId,
    rollback_only: bool,
    before_completion: Vec<BeforeCompletionCallback>,
    after_completion: Vec<AfterCompletionCallback>,
}

impl ActiveTransaction {
    const fn new(id: TransactionId, rollback_only: bool) -> Self {
        Self {
            id,
            rollback_only,
            before_completion: Vec::new(),
            after_completion: Vec::new(),
        }
    }
}

/// A unit of work over one SQLite connection.
pub struct SqliteSession {
    connection: Arc<Mutex<SqliteConnection>>,
    kind: SessionKind,
    flush_mode: FlushMode,
    listener: Option<AuditEventListener>,
    transaction: Option<ActiveTransaction>,
    temporary: bool,
    closed: bool,
    pending: Vec<PendingWrite>,
    identity_map: HashMap<EntityKey, Option<EntityState>>,
    audit_cache: BTreeMap<AuditRowKey, AuditRow>,
    temporary_sessions_opened: Arc<AtomicUsize>,
}

impl std::fmt::Debug for SqliteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSession")
            .field("kind", &self.kind)
            .field("flush_mode", &self.flush_mode)
            .field("transaction", &self.transaction.as_ref().map(|tx| tx.id))
            .field("temporary", &self.temporary)
            .field("closed", &self.closed)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl SqliteSession {
    pub(crate) fn new(
        connection: SqliteConnection,
        kind: SessionKind,
        flush_mode: FlushMode,
        listener: AuditEventListener,
    ) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
            kind,
            flush_mode,
            listener: Some(listener),
            transaction: None,
            temporary: false,
            closed: false,
            pending: Vec::new(),
            identity_map: HashMap::new(),
            audit_cache: BTreeMap::new(),
            temporary_sessions_opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or temporary, a transaction
    /// is already in progress, or `BEGIN` fails.
    pub fn begin(&mut self) -> Result<TransactionId, PersistenceError> {
        self.ensure_open()?;
        if self.temporary {
            return Err(PersistenceError::TemporarySession);
        }
        if self.transaction.is_some() {
            return Err(PersistenceError::TransactionAlreadyActive);
        }

        AnsiTransactionManager::begin_transaction(&mut *self.conn())?;
        let id: TransactionId = TransactionId::allocate();
        self.transaction = Some(ActiveTransaction::new(id, false));
        debug!(transaction = %id, kind = ?self.kind, "Began transaction");
        Ok(id)
    }

    /// Marks the transaction so that it can only roll back.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::NoActiveTransaction` if none is in progress.
    pub fn set_rollback_only(&mut self) -> Result<(), PersistenceError> {
        let transaction: &mut ActiveTransaction = self
            .transaction
            .as_mut()
            .ok_or(PersistenceError::NoActiveTransaction)?;
        transaction.rollback_only = true;
        debug!(transaction = %transaction.id, "Transaction marked rollback-only");
        Ok(())
    }

    /// Completes the transaction.
    ///
    /// Pending writes are flushed unless the session is in manual flush
    /// mode; a session closed inside the transaction is still flushed, so its
    /// close takes effect once the transaction ends. Before-completion
    /// callbacks run next and the transaction is committed; a rollback-only
    /// transaction is rolled back instead. After-completion callbacks run in
    /// both cases.
    ///
    /// # Errors
    ///
    /// Returns an error, after rolling back, if flushing, a before-completion
    /// callback, or `COMMIT` fails. A manual flush session that still holds
    /// unflushed entity writes fails with `PersistenceError::UnflushedWrites`.
    pub fn commit(&mut self) -> Result<TransactionOutcome, PersistenceError> {
        if self.temporary {
            return Err(PersistenceError::TemporarySession);
        }
        let rollback_only: bool = self
            .transaction
            .as_ref()
            .ok_or(PersistenceError::NoActiveTransaction)?
            .rollback_only;

        if !rollback_only && let Err(err) = self.flush_for_commit() {
            warn!(error = %err, "Flush before commit failed; rolling back");
            self.complete(TransactionOutcome::RolledBack)?;
            return Err(err);
        }

        if let Err(err) = self.run_before_completion() {
            warn!(error = %err, "Before-completion callback failed; rolling back");
            self.complete(TransactionOutcome::RolledBack)?;
            return Err(err.into());
        }

        let rollback_only: bool = self
            .transaction
            .as_ref()
            .is_some_and(|transaction| transaction.rollback_only);
        let outcome: TransactionOutcome = if rollback_only {
            TransactionOutcome::RolledBack
        } else {
            TransactionOutcome::Committed
        };
        self.complete(outcome)?;
        Ok(outcome)
    }

    /// Rolls the transaction back without running before-completion
    /// callbacks.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is in progress or `ROLLBACK` fails.
    pub fn rollback(&mut self) -> Result<(), PersistenceError> {
        if self.temporary {
            return Err(PersistenceError::TemporarySession);
        }
        if self.transaction.is_none() {
            return Err(PersistenceError::NoActiveTransaction);
        }
        self.complete(TransactionOutcome::RolledBack)
    }

    /// Makes a new entity persistent and reports the insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed, the state does not match
    /// the descriptor, the write fails, or the event cannot be audited.
    pub fn persist(
        &mut self,
        descriptor: &Arc<EntityDescriptor>,
        id: &EntityId,
        state: EntityState,
    ) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        descriptor.validate_state(&state)?;
        self.write(PendingWrite::InsertEntity {
            entity_name: descriptor.name().clone(),
            id: id.clone(),
            state: state.clone(),
        })?;
        self.remember(descriptor.name(), id, Some(state.clone()));

        if let Some(listener) = self.listener.clone() {
            listener.on_post_insert(self, descriptor, id, &state)?;
        }
        Ok(())
    }

    /// Loads the current state of an entity.
    ///
    /// Stateful sessions answer from the identity map first; in automatic
    /// flush mode pending writes are flushed before the database is queried.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or the query fails.
    pub fn load(
        &mut self,
        descriptor: &EntityDescriptor,
        id: &EntityId,
    ) -> Result<Option<EntityState>, PersistenceError> {
        self.ensure_open()?;
        let key: EntityKey = (descriptor.name().clone(), id.clone());
        if let Some(known) = self.identity_map.get(&key) {
            return Ok(known.clone());
        }
        if self.kind == SessionKind::Stateful && self.flush_mode == FlushMode::Auto {
            self.flush_pending()?;
        }
        let state: Option<EntityState> =
            queries::entities::load_entity_state(&mut self.conn(), descriptor.name(), id)?;
        if state.is_some() {
            self.remember(descriptor.name(), id, state.clone());
        }
        Ok(state)
    }

    /// Loads the current elements of an entity's `role` collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or the query fails.
    pub fn load_collection(
        &mut self,
        descriptor: &EntityDescriptor,
        owner_id: &EntityId,
        role: &str,
    ) -> Result<Vec<Value>, PersistenceError> {
        self.ensure_open()?;
        if self.kind == SessionKind::Stateful && self.flush_mode == FlushMode::Auto {
            self.flush_pending()?;
        }
        queries::entities::load_collection(&mut self.conn(), descriptor.name(), owner_id, role)
    }

    /// Replaces the state of a managed entity and reports the update.
    ///
    /// The previous state comes from the identity map or the database.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::NotFound` if the entity does not exist, or
    /// an error if the write or the audit event fails.
    pub fn update(
        &mut self,
        descriptor: &Arc<EntityDescriptor>,
        id: &EntityId,
        state: EntityState,
    ) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        descriptor.validate_state(&state)?;
        let old_state: EntityState = self.require_current(descriptor, id)?;

        self.write(PendingWrite::UpdateEntity {
            entity_name: descriptor.name().clone(),
            id: id.clone(),
            state: state.clone(),
        })?;
        self.remember(descriptor.name(), id, Some(state.clone()));

        if let Some(listener) = self.listener.clone() {
            listener.on_post_update(self, descriptor, id, &state, Some(&old_state))?;
        }
        Ok(())
    }

    /// Writes the state of a detached entity over the stored one.
    ///
    /// The stored state is handed to the listener before the update so the
    /// audit row can be diffed against it.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::NotFound` if the entity does not exist, or
    /// an error if the write or the audit events fail.
    pub fn merge(
        &mut self,
        descriptor: &Arc<EntityDescriptor>,
        id: &EntityId,
        state: EntityState,
    ) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        descriptor.validate_state(&state)?;
        if self.kind == SessionKind::Stateful && self.flush_mode == FlushMode::Auto {
            self.flush_pending()?;
        }
        let database_state: EntityState =
            queries::entities::load_entity_state(&mut self.conn(), descriptor.name(), id)?
                .ok_or_else(|| {
                    PersistenceError::NotFound(format!("{} with id {id}", descriptor.name()))
                })?;

        let listener: Option<AuditEventListener> = self.listener.clone();
        if let Some(listener) = &listener {
            listener.on_pre_update(self, descriptor, id, &database_state)?;
        }
        self.write(PendingWrite::UpdateEntity {
            entity_name: descriptor.name().clone(),
            id: id.clone(),
            state: state.clone(),
        })?;
        self.remember(descriptor.name(), id, Some(state.clone()));

        if let Some(listener) = &listener {
            listener.on_post_update(self, descriptor, id, &state, None)?;
        }
        Ok(())
    }

    /// Removes an entity and reports the delete with its last state.
    ///
    /// Elements still held by the entity's collections are dropped with the
    /// row and reported as removals before the delete itself.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::NotFound` if the entity does not exist, or
    /// an error if the write or the audit event fails.
    pub fn delete(
        &mut self,
        descriptor: &Arc<EntityDescriptor>,
        id: &EntityId,
    ) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        let state: EntityState = self.require_current(descriptor, id)?;
        let listener: Option<AuditEventListener> = self.listener.clone();

        let mut removals: Vec<(String, Vec<ElementChange>)> = Vec::new();
        if listener.is_some() && descriptor.is_audited() {
            for property in descriptor
                .properties()
                .iter()
                .filter(|p| p.collection && p.audited)
            {
                let elements: Vec<Value> =
                    self.current_elements(descriptor, id, &property.name)?;
                if !elements.is_empty() {
                    removals.push((
                        property.name.clone(),
                        elements.into_iter().map(ElementChange::removed).collect(),
                    ));
                }
            }
        }

        self.write(PendingWrite::DeleteEntity {
            entity_name: descriptor.name().clone(),
            id: id.clone(),
        })?;
        self.remember(descriptor.name(), id, None);

        if let Some(listener) = listener {
            for (role, changes) in removals {
                listener.on_collection_change(self, descriptor, id, &state, &role, changes)?;
            }
            listener.on_post_delete(self, descriptor, id, &state)?;
        }
        Ok(())
    }

    /// Stored elements of `role` with this session's unflushed writes to the
    /// owner applied.
    fn current_elements(
        &mut self,
        descriptor: &EntityDescriptor,
        owner_id: &EntityId,
        role: &str,
    ) -> Result<Vec<Value>, PersistenceError> {
        let mut elements: Vec<Value> = self.load_collection(descriptor, owner_id, role)?;
        for write in &self.pending {
            match write {
                PendingWrite::DeleteEntity { entity_name, id }
                    if entity_name == descriptor.name() && id == owner_id =>
                {
                    elements.clear();
                }
                PendingWrite::Collection {
                    entity_name,
                    owner_id: pending_owner,
                    role: pending_role,
                    changes,
                } if entity_name == descriptor.name()
                    && pending_owner == owner_id
                    && pending_role == role =>
                {
                    for change in changes {
                        elements.retain(|element| *element != change.element);
                        if change.revision_type != RevisionType::Del {
                            elements.push(change.element.clone());
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(elements)
    }

    /// Adds and removes elements of an entity's `role` collection and
    /// reports the change.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::NotFound` if the owner does not exist, or
    /// an error if `role` is unknown, the write fails, or the audit event
    /// fails.
    pub fn update_collection(
        &mut self,
        descriptor: &Arc<EntityDescriptor>,
        owner_id: &EntityId,
        role: &str,
        changes: Vec<ElementChange>,
    ) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        descriptor.property_index(role)?;
        let owner_state: EntityState = self.require_current(descriptor, owner_id)?;

        self.write(PendingWrite::Collection {
            entity_name: descriptor.name().clone(),
            owner_id: owner_id.clone(),
            role: role.to_string(),
            changes: changes.clone(),
        })?;

        if let Some(listener) = self.listener.clone() {
            listener.on_collection_change(self, descriptor, owner_id, &owner_state, role, changes)?;
        }
        Ok(())
    }

    /// Sets properties of one stored entity with a single update statement,
    /// without loading it into the session, and reports the update.
    ///
    /// # Returns
    ///
    /// The number of entities updated (zero or one).
    ///
    /// # Errors
    ///
    /// Returns an error if a property is unknown, the statement fails, or the
    /// audit event fails.
    pub fn execute_update(
        &mut self,
        descriptor: &Arc<EntityDescriptor>,
        id: &EntityId,
        assignments: &[(&str, Value)],
    ) -> Result<usize, PersistenceError> {
        self.ensure_open()?;
        if self.kind == SessionKind::Stateful {
            self.flush_pending()?;
        }

        let old_state: Option<EntityState> =
            queries::entities::load_entity_state(&mut self.conn(), descriptor.name(), id)?;
        let Some(old_state) = old_state else {
            debug!(entity_name = %descriptor.name(), %id, "Bulk update matched no entity");
            return Ok(0);
        };

        let mut state: EntityState = old_state.clone();
        for (property, value) in assignments {
            let index: usize = descriptor.property_index(property)?;
            state.set(index, value.clone());
        }
        let Some(stored) = entities::update_entity_state_returning(
            &mut self.conn(),
            descriptor.name(),
            id,
            &state,
        )?
        else {
            return Ok(0);
        };
        self.identity_map
            .insert((descriptor.name().clone(), id.clone()), Some(stored.clone()));

        if let Some(listener) = self.listener.clone() {
            listener.on_post_update(self, descriptor, id, &stored, Some(&old_state))?;
        }
        Ok(1)
    }

    /// Number of audit rows held in the first-level cache.
    #[must_use]
    pub fn cached_audit_rows(&self) -> usize {
        self.audit_cache.len()
    }

    /// Number of writes waiting for the next flush.
    #[must_use]
    pub const fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// How many temporary sessions have been opened from this session.
    #[must_use]
    pub fn temporary_sessions_opened(&self) -> usize {
        self.temporary_sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of sessions currently holding this session's connection.
    #[must_use]
    pub fn connection_holders(&self) -> usize {
        Arc::strong_count(&self.connection)
    }

    fn conn(&self) -> MutexGuard<'_, SqliteConnection> {
        self.connection.lock()
    }

    const fn ensure_open(&self) -> Result<(), PersistenceError> {
        if self.closed {
            return Err(PersistenceError::SessionClosed);
        }
        Ok(())
    }

    /// Applies `write` now, or queues it on a stateful session.
    fn write(&mut self, write: PendingWrite) -> Result<(), PersistenceError> {
        match self.kind {
            SessionKind::Stateful => {
                self.pending.push(write);
                Ok(())
            }
            SessionKind::Stateless => write.apply(&mut self.conn()),
        }
    }

    fn remember(&mut self, entity_name: &EntityName, id: &EntityId, state: Option<EntityState>) {
        if self.kind == SessionKind::Stateful {
            self.identity_map
                .insert((entity_name.clone(), id.clone()), state);
        }
    }

    fn require_current(
        &mut self,
        descriptor: &EntityDescriptor,
        id: &EntityId,
    ) -> Result<EntityState, PersistenceError> {
        let key: EntityKey = (descriptor.name().clone(), id.clone());
        let known: Option<EntityState> = match self.identity_map.get(&key) {
            Some(known) => known.clone(),
            None => queries::entities::load_entity_state(&mut self.conn(), descriptor.name(), id)?,
        };
        known.ok_or_else(|| PersistenceError::NotFound(format!("{} with id {id}", key.0)))
    }

    fn flush_for_commit(&mut self) -> Result<(), PersistenceError> {
        match self.flush_mode {
            FlushMode::Auto | FlushMode::Commit => self.flush_pending(),
            FlushMode::Manual => {
                let unflushed: usize = self
                    .pending
                    .iter()
                    .filter(|write| !matches!(write, PendingWrite::AuditRow(_)))
                    .count();
                if unflushed > 0 {
                    return Err(PersistenceError::UnflushedWrites(unflushed));
                }
                Ok(())
            }
        }
    }

    fn flush_pending(&mut self) -> Result<(), PersistenceError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending: Vec<PendingWrite> = std::mem::take(&mut self.pending);
        let count: usize = pending.len();
        {
            let mut conn: MutexGuard<'_, SqliteConnection> = self.conn();
            for write in &pending {
                write.apply(&mut conn)?;
            }
        }
        debug!(writes = count, temporary = self.temporary, "Flushed session");
        Ok(())
    }

    fn run_before_completion(&mut self) -> Result<(), AuditError> {
        loop {
            let callbacks: Vec<BeforeCompletionCallback> = self
                .transaction
                .as_mut()
                .map(|transaction| std::mem::take(&mut transaction.before_completion))
                .unwrap_or_default();
            if callbacks.is_empty() {
                return Ok(());
            }
            for callback in callbacks {
                callback(self)?;
            }
        }
    }

    /// Ends the transaction with `outcome` and runs the after-completion
    /// callbacks.
    fn complete(&mut self, outcome: TransactionOutcome) -> Result<(), PersistenceError> {
        let Some(transaction) = self.transaction.take() else {
            return Err(PersistenceError::NoActiveTransaction);
        };

        let (result, outcome): (Result<(), PersistenceError>, TransactionOutcome) = match outcome {
            TransactionOutcome::Committed => {
                match AnsiTransactionManager::commit_transaction(&mut *self.conn()) {
                    Ok(()) => (Ok(()), TransactionOutcome::Committed),
                    Err(err) => (Err(err.into()), TransactionOutcome::RolledBack),
                }
            }
            TransactionOutcome::RolledBack => {
                let result: diesel::QueryResult<()> =
                    AnsiTransactionManager::rollback_transaction(&mut *self.conn());
                (result.map_err(PersistenceError::from), TransactionOutcome::RolledBack)
            }
        };

        if outcome == TransactionOutcome::RolledBack {
            self.pending.clear();
            self.identity_map.clear();
        }
        info!(transaction = %transaction.id, ?outcome, "Transaction completed");

        for callback in transaction.after_completion {
            callback(self, outcome);
        }
        result
    }
}

impl AuditSession for SqliteSession {
    fn kind(&self) -> SessionKind {
        self.kind
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    fn current_transaction(&self) -> Result<TransactionId, AuditError> {
        self.transaction
            .as_ref()
            .map(|transaction| transaction.id)
            .ok_or(AuditError::NoActiveTransaction)
    }

    fn is_transaction_active(&self) -> bool {
        self.transaction
            .as_ref()
            .is_some_and(|transaction| !transaction.rollback_only)
    }

    fn register_before_completion(
        &mut self,
        callback: BeforeCompletionCallback,
    ) -> Result<(), AuditError> {
        let transaction: &mut ActiveTransaction = self
            .transaction
            .as_mut()
            .ok_or(AuditError::NoActiveTransaction)?;
        transaction.before_completion.push(callback);
        Ok(())
    }

    fn register_after_completion(
        &mut self,
        callback: AfterCompletionCallback,
    ) -> Result<(), AuditError> {
        let transaction: &mut ActiveTransaction = self
            .transaction
            .as_mut()
            .ok_or(AuditError::NoActiveTransaction)?;
        transaction.after_completion.push(callback);
        Ok(())
    }

    fn open_temporary_session(
        &mut self,
        kind: SessionKind,
    ) -> Result<Box<dyn AuditSession>, AuditError> {
        let transaction: &ActiveTransaction = self
            .transaction
            .as_ref()
            .ok_or(AuditError::NoActiveTransaction)?;

        let opened: usize = self.temporary_sessions_opened.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            ?kind,
            transaction = %transaction.id,
            opened,
            "Opening temporary session on shared connection"
        );
        Ok(Box::new(Self {
            connection: Arc::clone(&self.connection),
            kind,
            flush_mode: FlushMode::Auto,
            listener: None,
            transaction: Some(ActiveTransaction::new(
                transaction.id,
                transaction.rollback_only,
            )),
            temporary: true,
            closed: false,
            pending: Vec::new(),
            identity_map: HashMap::new(),
            audit_cache: BTreeMap::new(),
            temporary_sessions_opened: Arc::clone(&self.temporary_sessions_opened),
        }))
    }

    fn flush(&mut self) -> Result<(), AuditError> {
        self.ensure_open()?;
        Ok(self.flush_pending()?)
    }

    fn close(&mut self) -> Result<(), AuditError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.temporary {
            if let Some(transaction) = self.transaction.take()
                && !transaction.after_completion.is_empty()
            {
                debug!(
                    discarded = transaction.after_completion.len(),
                    "Discarding completion callbacks of temporary session"
                );
            }
            if !self.pending.is_empty() {
                warn!(
                    discarded = self.pending.len(),
                    "Temporary session closed with unflushed writes"
                );
                self.pending.clear();
            }
        }
        self.audit_cache.clear();
        debug!(temporary = self.temporary, "Closed session");
        Ok(())
    }

    fn contains_revision(&self, revision: &RevisionData) -> bool {
        let Some(rev) = revision.id else {
            return false;
        };
        let lookup: Result<bool, PersistenceError> =
            queries::revisions::revision_exists(&mut self.conn(), rev);
        match lookup {
            Ok(exists) => exists,
            Err(err) => {
                debug!(rev, error = %err, "Revision lookup failed");
                false
            }
        }
    }

    fn save_revision(&mut self, revision: &mut RevisionData) -> Result<(), AuditError> {
        let rev: i64 =
            revisions::insert_revision(&mut self.conn(), revision.timestamp, &revision.properties)?;
        revision.id = Some(rev);
        Ok(())
    }

    fn record_changed_entity(
        &mut self,
        revision: i64,
        entity_name: &EntityName,
    ) -> Result<(), AuditError> {
        Ok(revisions::insert_changed_entity(
            &mut self.conn(),
            revision,
            entity_name,
        )?)
    }

    fn insert_audit_row(&mut self, row: AuditRow) -> Result<(), AuditError> {
        if !queries::revisions::revision_exists(&mut self.conn(), row.key.revision)? {
            return Err(AuditError::RevisionNotPersisted);
        }
        match self.kind {
            SessionKind::Stateful => {
                self.audit_cache.insert(row.key.clone(), row.clone());
                self.pending.push(PendingWrite::AuditRow(row));
                Ok(())
            }
            SessionKind::Stateless => Ok(audit::insert_audit_row(&mut self.conn(), &row)?),
        }
    }

    fn delete_audit_row(&mut self, key: &AuditRowKey) -> Result<(), AuditError> {
        self.audit_cache.remove(key);
        let queued: usize = self.pending.len();
        self.pending.retain(|write| !write.is_audit_row(key));
        if self.pending.len() < queued {
            return Ok(());
        }
        let deleted: usize = audit::delete_audit_row(&mut self.conn(), key)?;
        debug!(audit_entity = %key.audit_entity, deleted, "Deleted audit row");
        Ok(())
    }

    fn close_previous_revision(&mut self, key: &AuditRowKey) -> Result<usize, AuditError> {
        self.flush_pending()?;
        Ok(audit::close_open_rows(&mut self.conn(), key)?)
    }

    fn reopen_previous_revision(&mut self, key: &AuditRowKey) -> Result<usize, AuditError> {
        self.flush_pending()?;
        Ok(audit::reopen_closed_rows(&mut self.conn(), key)?)
    }

    fn evict_audit_data(&mut self, key: &AuditRowKey) -> Result<(), AuditError> {
        self.audit_cache.remove(key);
        Ok(())
    }
}
