// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! An in-memory session that records every call made by the audit engine.

use std::sync::Arc;

use parking_lot::Mutex;
use revtrail_audit::{AuditError, AuditRow, AuditRowKey};
use revtrail_domain::{
    AuditConfiguration, EntityDescriptor, EntityName, EntityState, PropertyDescriptor, Value,
};

use crate::{
    AfterCompletionCallback, AuditContext, AuditSession, BeforeCompletionCallback, FlushMode,
    RevisionData, SessionKind, TransactionId, TransactionOutcome,
};

/// Something the engine asked the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SaveRevision(i64),
    InsertRow { audit_entity: String, revision: i64 },
    DeleteRow { audit_entity: String, revision: i64 },
    Flush { temporary: bool },
    OpenTemporary(SessionKind),
    CloseTemporary,
    Evict(String),
}

/// A stored audit row with its end revision.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub row: AuditRow,
    pub end: Option<i64>,
}

/// Storage shared by a session and its temporary sessions.
#[derive(Debug, Default)]
pub struct Storage {
    pub revisions: Vec<RevisionData>,
    pub rows: Vec<StoredRow>,
    pub changed_entities: Vec<(i64, EntityName)>,
    pub events: Vec<Event>,
}

impl Storage {
    pub fn rows_for(&self, audit_entity: &str) -> Vec<StoredRow> {
        self.rows
            .iter()
            .filter(|stored| stored.row.key.audit_entity.as_str() == audit_entity)
            .cloned()
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }

    fn matching_rows<'a>(
        rows: &'a mut [StoredRow],
        key: &'a AuditRowKey,
    ) -> impl Iterator<Item = &'a mut StoredRow> + 'a {
        rows.iter_mut().filter(move |stored| {
            stored.row.key.audit_entity == key.audit_entity
                && stored.row.key.original_id == key.original_id
                && stored.row.key.element == key.element
        })
    }
}

pub struct RecordingSession {
    storage: Arc<Mutex<Storage>>,
    kind: SessionKind,
    flush_mode: FlushMode,
    transaction: Option<TransactionId>,
    active: bool,
    closed: bool,
    temporary: bool,
    pending_rows: Vec<AuditRow>,
    cached_rows: Vec<AuditRowKey>,
    before: Vec<BeforeCompletionCallback>,
    after: Vec<AfterCompletionCallback>,
}

impl RecordingSession {
    pub fn new(kind: SessionKind, flush_mode: FlushMode) -> Self {
        Self {
            storage: Arc::new(Mutex::new(Storage::default())),
            kind,
            flush_mode,
            transaction: Some(TransactionId::allocate()),
            active: true,
            closed: false,
            temporary: false,
            pending_rows: Vec::new(),
            cached_rows: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    pub fn stateful() -> Self {
        Self::new(SessionKind::Stateful, FlushMode::Auto)
    }

    pub fn stateless() -> Self {
        Self::new(SessionKind::Stateless, FlushMode::Auto)
    }

    pub fn storage(&self) -> Arc<Mutex<Storage>> {
        Arc::clone(&self.storage)
    }

    pub fn events(&self) -> Vec<Event> {
        self.storage.lock().events.clone()
    }

    pub const fn mark_rollback_only(&mut self) {
        self.active = false;
    }

    pub const fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub fn cached_rows(&self) -> &[AuditRowKey] {
        &self.cached_rows
    }

    /// Persists a revision directly so rows can be written without a process.
    pub fn seed_revision(&mut self) -> i64 {
        let mut revision: RevisionData = RevisionData::new(time::OffsetDateTime::UNIX_EPOCH);
        self.save_revision(&mut revision).unwrap();
        revision.id.unwrap()
    }

    /// Runs the completion callbacks the way a host commit would.
    pub fn complete(&mut self) -> Result<TransactionOutcome, AuditError> {
        let mut result: Result<(), AuditError> = Ok(());
        for callback in std::mem::take(&mut self.before) {
            if result.is_ok() {
                result = callback(self);
            }
        }
        let outcome: TransactionOutcome = if result.is_ok() && self.active {
            TransactionOutcome::Committed
        } else {
            TransactionOutcome::RolledBack
        };
        for callback in std::mem::take(&mut self.after) {
            callback(self, outcome);
        }
        self.transaction = None;
        result.map(|()| outcome)
    }
}

impl AuditSession for RecordingSession {
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
        self.transaction.ok_or(AuditError::NoActiveTransaction)
    }

    fn is_transaction_active(&self) -> bool {
        self.active
    }

    fn register_before_completion(
        &mut self,
        callback: BeforeCompletionCallback,
    ) -> Result<(), AuditError> {
        self.current_transaction()?;
        self.before.push(callback);
        Ok(())
    }

    fn register_after_completion(
        &mut self,
        callback: AfterCompletionCallback,
    ) -> Result<(), AuditError> {
        self.current_transaction()?;
        self.after.push(callback);
        Ok(())
    }

    fn open_temporary_session(
        &mut self,
        kind: SessionKind,
    ) -> Result<Box<dyn AuditSession>, AuditError> {
        self.storage.lock().events.push(Event::OpenTemporary(kind));
        Ok(Box::new(Self {
            storage: Arc::clone(&self.storage),
            kind,
            flush_mode: FlushMode::Auto,
            transaction: self.transaction,
            active: self.active,
            closed: false,
            temporary: true,
            pending_rows: Vec::new(),
            cached_rows: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
        }))
    }

    fn flush(&mut self) -> Result<(), AuditError> {
        if self.closed {
            return Err(AuditError::SessionClosed);
        }
        let mut storage = self.storage.lock();
        storage.events.push(Event::Flush {
            temporary: self.temporary,
        });
        for row in self.pending_rows.drain(..) {
            storage.rows.push(StoredRow { row, end: None });
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), AuditError> {
        if self.temporary {
            self.storage.lock().events.push(Event::CloseTemporary);
        }
        self.closed = true;
        Ok(())
    }

    fn contains_revision(&self, revision: &RevisionData) -> bool {
        revision.id.is_some_and(|id| {
            self.storage
                .lock()
                .revisions
                .iter()
                .any(|saved| saved.id == Some(id))
        })
    }

    fn save_revision(&mut self, revision: &mut RevisionData) -> Result<(), AuditError> {
        if self.closed {
            return Err(AuditError::SessionClosed);
        }
        let mut storage = self.storage.lock();
        let id: i64 = i64::try_from(storage.revisions.len()).unwrap() + 1;
        revision.id = Some(id);
        storage.revisions.push(revision.clone());
        storage.events.push(Event::SaveRevision(id));
        Ok(())
    }

    fn record_changed_entity(
        &mut self,
        revision: i64,
        entity_name: &EntityName,
    ) -> Result<(), AuditError> {
        self.storage
            .lock()
            .changed_entities
            .push((revision, entity_name.clone()));
        Ok(())
    }

    fn insert_audit_row(&mut self, row: AuditRow) -> Result<(), AuditError> {
        if self.closed {
            return Err(AuditError::SessionClosed);
        }
        let mut storage = self.storage.lock();
        if !storage
            .revisions
            .iter()
            .any(|saved| saved.id == Some(row.key.revision))
        {
            return Err(AuditError::RevisionNotPersisted);
        }
        storage.events.push(Event::InsertRow {
            audit_entity: row.key.audit_entity.to_string(),
            revision: row.key.revision,
        });
        match self.kind {
            SessionKind::Stateful => {
                self.cached_rows.push(row.key.clone());
                self.pending_rows.push(row);
            }
            SessionKind::Stateless => storage.rows.push(StoredRow { row, end: None }),
        }
        Ok(())
    }

    fn delete_audit_row(&mut self, key: &AuditRowKey) -> Result<(), AuditError> {
        let mut storage = self.storage.lock();
        storage.events.push(Event::DeleteRow {
            audit_entity: key.audit_entity.to_string(),
            revision: key.revision,
        });
        storage.rows.retain(|stored| &stored.row.key != key);
        self.pending_rows.retain(|row| &row.key != key);
        Ok(())
    }

    fn close_previous_revision(&mut self, key: &AuditRowKey) -> Result<usize, AuditError> {
        let mut storage = self.storage.lock();
        let mut closed: usize = 0;
        for stored in Storage::matching_rows(&mut storage.rows, key) {
            if stored.end.is_none() && stored.row.key.revision != key.revision {
                stored.end = Some(key.revision);
                closed += 1;
            }
        }
        Ok(closed)
    }

    fn reopen_previous_revision(&mut self, key: &AuditRowKey) -> Result<usize, AuditError> {
        let mut storage = self.storage.lock();
        let mut reopened: usize = 0;
        for stored in Storage::matching_rows(&mut storage.rows, key) {
            if stored.end == Some(key.revision) {
                stored.end = None;
                reopened += 1;
            }
        }
        Ok(reopened)
    }

    fn evict_audit_data(&mut self, key: &AuditRowKey) -> Result<(), AuditError> {
        self.storage
            .lock()
            .events
            .push(Event::Evict(key.audit_entity.to_string()));
        self.cached_rows.retain(|cached| cached != key);
        Ok(())
    }
}

/// `Foo(name, tags)` where `tags` is an audited collection.
pub fn foo() -> Arc<EntityDescriptor> {
    Arc::new(EntityDescriptor::new(
        "Foo",
        vec![
            PropertyDescriptor::basic("name"),
            PropertyDescriptor::collection("tags"),
        ],
    ))
}

pub fn foo_state(name: &str) -> EntityState {
    EntityState::new(vec![Value::from(name), Value::Null])
}

pub fn context() -> Arc<AuditContext> {
    context_with(AuditConfiguration::default())
}

pub fn context_with(config: AuditConfiguration) -> Arc<AuditContext> {
    Arc::new(AuditContext::with_default_generator(config))
}
