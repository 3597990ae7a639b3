// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Per-transaction accumulation and execution of audit work.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use revtrail_audit::{
    AuditError, AuditRowKey, EntityStateCache, Reconciliation, WorkUnit, WorkUnitKey, reconcile,
};
use revtrail_domain::{EntityId, EntityName, EntityState};
use tracing::{debug, info};

use crate::context::AuditContext;
use crate::revision::RevisionData;
use crate::session::{AuditSession, FlushMode, ScopedSession, SessionKind};

type UnitHandle = u64;

/// Where pending work is executed when the transaction completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionTarget {
    /// The given session; flushed afterwards when stateful.
    Direct,
    /// A temporary session of the given kind on the same connection.
    Temporary(SessionKind),
}

impl ExecutionTarget {
    const fn select(kind: SessionKind, closed: bool, flush_mode: FlushMode) -> Self {
        match (kind, closed, flush_mode) {
            (SessionKind::Stateless, true, _) => Self::Temporary(SessionKind::Stateless),
            (SessionKind::Stateful, true, _) | (SessionKind::Stateful, _, FlushMode::Manual) => {
                Self::Temporary(SessionKind::Stateful)
            }
            (SessionKind::Stateless | SessionKind::Stateful, false, _) => Self::Direct,
        }
    }
}

/// Audit work collected for one transaction.
///
/// Work units are kept in an arena keyed by handle. The queue holds handles
/// in submission order; `used_ids` maps each entity key to its single
/// active unit. Units stay in the arena after being performed so a later
/// unit for the same key can still reconcile with, and undo, them.
#[derive(Debug)]
pub struct AuditProcess {
    context: Arc<AuditContext>,
    next_handle: UnitHandle,
    units: HashMap<UnitHandle, WorkUnit>,
    queue: VecDeque<UnitHandle>,
    used_ids: HashMap<WorkUnitKey, UnitHandle>,
    undo_queue: VecDeque<WorkUnit>,
    entity_states: EntityStateCache,
    revision_data: Option<RevisionData>,
    revision_data_saved: bool,
}

impl AuditProcess {
    /// Creates an empty process.
    #[must_use]
    pub fn new(context: Arc<AuditContext>) -> Self {
        Self {
            context,
            next_handle: 0,
            units: HashMap::new(),
            queue: VecDeque::new(),
            used_ids: HashMap::new(),
            undo_queue: VecDeque::new(),
            entity_states: EntityStateCache::new(),
            revision_data: None,
            revision_data_saved: false,
        }
    }

    /// Stores the before-image of an entity.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::DuplicateEntityState` if a snapshot for the same
    /// entity is already cached.
    pub fn cache_entity_state(
        &mut self,
        id: EntityId,
        entity_name: EntityName,
        snapshot: EntityState,
    ) -> Result<(), AuditError> {
        self.entity_states.cache(id, entity_name, snapshot)
    }

    /// Returns and removes the cached before-image, if any.
    pub fn get_cached_entity_state(
        &mut self,
        id: &EntityId,
        entity_name: &EntityName,
    ) -> Option<EntityState> {
        self.entity_states.take(id, entity_name)
    }

    /// Queues a work unit, reconciling it with the active unit for the same
    /// entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the two units cannot be combined.
    pub fn add_work_unit(&mut self, unit: WorkUnit) -> Result<(), AuditError> {
        if !unit.contains_work() {
            debug!(
                entity_name = %unit.entity_name(),
                kind = unit.kind(),
                "Ignoring empty work unit"
            );
            return Ok(());
        }

        let Some(key) = unit.key() else {
            self.enqueue(unit);
            return Ok(());
        };

        let Some(existing_handle) = self.used_ids.get(&key).copied() else {
            let handle: UnitHandle = self.enqueue(unit);
            self.used_ids.insert(key, handle);
            return Ok(());
        };

        let outcome: Reconciliation = match self.units.get(&existing_handle) {
            Some(existing) => reconcile(existing, unit)?,
            None => Reconciliation::Replace(unit),
        };

        match outcome {
            Reconciliation::Keep => {}
            Reconciliation::Replace(replacement) => {
                self.retire(existing_handle);
                let handle: UnitHandle = self.enqueue(replacement);
                self.used_ids.insert(key, handle);
            }
            Reconciliation::Cancel => {
                self.retire(existing_handle);
                self.used_ids.remove(&key);
            }
        }
        Ok(())
    }

    /// The revision of this transaction, generated on first use.
    ///
    /// With `persist` the revision is saved at most once: a stateful session
    /// is asked whether it already holds the revision, while a stateless
    /// session cannot answer that and the process tracks it instead.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the revision fails.
    pub fn get_current_revision_data(
        &mut self,
        session: &mut dyn AuditSession,
        persist: bool,
    ) -> Result<&RevisionData, AuditError> {
        let context: &AuditContext = self.context.as_ref();
        let revision: &mut RevisionData = self
            .revision_data
            .get_or_insert_with(|| context.generator().generate());

        if persist {
            let already_saved: bool = match session.kind() {
                SessionKind::Stateful => {
                    self.revision_data_saved && session.contains_revision(revision)
                }
                SessionKind::Stateless => self.revision_data_saved,
            };
            if !already_saved {
                context.generator().save_revision_data(session, revision)?;
                self.revision_data_saved = true;
            }
        }
        Ok(revision)
    }

    /// Executes all pending work before the transaction completes.
    ///
    /// Does nothing when there is no work or when the transaction will not
    /// commit.
    ///
    /// # Errors
    ///
    /// Returns an error if revision generation, reconciliation, or storage
    /// fails; the host must then abort the commit.
    pub fn do_before_transaction_completion(
        &mut self,
        session: &mut dyn AuditSession,
    ) -> Result<(), AuditError> {
        if self.queue.is_empty() && self.undo_queue.is_empty() {
            return Ok(());
        }

        if !session.is_transaction_active() {
            debug!(
                pending = self.queue.len(),
                "Transaction will not commit; skipping audit work"
            );
            return Ok(());
        }

        let target: ExecutionTarget =
            ExecutionTarget::select(session.kind(), session.is_closed(), session.flush_mode());
        debug!(
            ?target,
            pending = self.queue.len(),
            undo = self.undo_queue.len(),
            "Executing audit work"
        );

        match target {
            ExecutionTarget::Direct => {
                self.execute_in_session(session)?;
                if session.kind() == SessionKind::Stateful {
                    session.flush()?;
                }
            }
            ExecutionTarget::Temporary(kind) => {
                let mut temporary: ScopedSession = ScopedSession::open(session, kind)?;
                self.execute_in_session(temporary.session())?;
                if kind == SessionKind::Stateful {
                    temporary.flush()?;
                }
                temporary.finish()?;
            }
        }
        Ok(())
    }

    /// Number of queued units not yet performed.
    #[must_use]
    pub fn pending_work_units(&self) -> usize {
        self.queue.len()
    }

    /// Number of superseded units waiting to be reversed.
    #[must_use]
    pub fn pending_undo_units(&self) -> usize {
        self.undo_queue.len()
    }

    fn execute_in_session(&mut self, session: &mut dyn AuditSession) -> Result<(), AuditError> {
        let revision_id: i64 = self.get_current_revision_data(session, true)?.require_id()?;
        let context: Arc<AuditContext> = Arc::clone(&self.context);

        while let Some(unit) = self.undo_queue.pop_front() {
            debug!(
                entity_name = %unit.entity_name(),
                kind = unit.kind(),
                "Undoing superseded work unit"
            );
            context.strategy().undo(session, &unit)?;
        }

        let mut performed: usize = 0;
        while let Some(handle) = self.queue.pop_front() {
            let Some(unit) = self.units.get_mut(&handle) else {
                continue;
            };
            let rows: Vec<AuditRowKey> = context
                .strategy()
                .perform(session, context.config(), unit, revision_id)?;
            unit.mark_performed(rows);

            let Some(revision) = self.revision_data.as_mut() else {
                return Err(AuditError::RevisionNotPersisted);
            };
            context.notifier().entity_changed(session, revision, unit)?;
            performed += 1;
        }

        info!(revision = revision_id, performed, "Audit work executed");
        Ok(())
    }

    fn enqueue(&mut self, unit: WorkUnit) -> UnitHandle {
        let handle: UnitHandle = self.next_handle;
        self.next_handle += 1;
        debug!(
            entity_name = %unit.entity_name(),
            kind = unit.kind(),
            handle,
            "Queued work unit"
        );
        self.units.insert(handle, unit);
        self.queue.push_back(handle);
        handle
    }

    /// Removes a unit from the queue, scheduling it for undo if it already
    /// wrote rows.
    fn retire(&mut self, handle: UnitHandle) {
        self.queue.retain(|queued| *queued != handle);
        if let Some(unit) = self.units.remove(&handle)
            && unit.is_performed()
        {
            self.undo_queue.push_back(unit);
        }
    }
}
