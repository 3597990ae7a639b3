// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Translates host persistence events into audit work.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use revtrail_audit::{AuditError, ElementChange, WorkUnit};
use revtrail_domain::{EntityDescriptor, EntityId, EntityState};
use tracing::debug;

use crate::context::AuditContext;
use crate::manager::AuditProcessManager;
use crate::process::AuditProcess;
use crate::session::AuditSession;

/// Receives entity lifecycle events from the host session.
///
/// Events for entities that are not audited are ignored.
#[derive(Debug, Clone)]
pub struct AuditEventListener {
    manager: AuditProcessManager,
}

impl AuditEventListener {
    /// Creates a listener with its own process manager.
    #[must_use]
    pub fn new(context: Arc<AuditContext>) -> Self {
        Self {
            manager: AuditProcessManager::new(context),
        }
    }

    /// The process manager backing this listener.
    #[must_use]
    pub const fn manager(&self) -> &AuditProcessManager {
        &self.manager
    }

    /// An entity was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the state does not match the descriptor or the
    /// work unit cannot be queued.
    pub fn on_post_insert(
        &self,
        session: &mut dyn AuditSession,
        descriptor: &Arc<EntityDescriptor>,
        id: &EntityId,
        state: &EntityState,
    ) -> Result<(), AuditError> {
        if !descriptor.is_audited() {
            return Ok(());
        }
        descriptor.validate_state(state)?;
        let unit: WorkUnit = WorkUnit::add(Arc::clone(descriptor), id.clone(), state.clone());
        self.submit(session, unit)
    }

    /// An entity is about to be updated from a detached instance; its
    /// database state is cached so the post-update event can diff against it.
    ///
    /// # Errors
    ///
    /// Returns an error if a snapshot for the entity is already cached.
    pub fn on_pre_update(
        &self,
        session: &mut dyn AuditSession,
        descriptor: &Arc<EntityDescriptor>,
        id: &EntityId,
        database_state: &EntityState,
    ) -> Result<(), AuditError> {
        if !descriptor.is_audited() {
            return Ok(());
        }
        let process: Arc<Mutex<AuditProcess>> = self.manager.get(session)?;
        process.lock().cache_entity_state(
            id.clone(),
            descriptor.name().clone(),
            database_state.clone(),
        )
    }

    /// An entity was updated.
    ///
    /// Without `old_state` the snapshot cached by [`Self::on_pre_update`] is
    /// used; if there is none every audited property counts as changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the state does not match the descriptor or the
    /// work unit cannot be queued.
    pub fn on_post_update(
        &self,
        session: &mut dyn AuditSession,
        descriptor: &Arc<EntityDescriptor>,
        id: &EntityId,
        state: &EntityState,
        old_state: Option<&EntityState>,
    ) -> Result<(), AuditError> {
        if !descriptor.is_audited() {
            return Ok(());
        }
        descriptor.validate_state(state)?;

        let process: Arc<Mutex<AuditProcess>> = self.manager.get(session)?;
        let mut guard: MutexGuard<'_, AuditProcess> = process.lock();
        let cached: Option<EntityState> = guard.get_cached_entity_state(id, descriptor.name());
        let old_state: Option<EntityState> = old_state.cloned().or(cached);
        let unit: WorkUnit =
            WorkUnit::modify(Arc::clone(descriptor), id.clone(), state.clone(), old_state);
        guard.add_work_unit(unit)
    }

    /// An entity was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the work unit cannot be queued.
    pub fn on_post_delete(
        &self,
        session: &mut dyn AuditSession,
        descriptor: &Arc<EntityDescriptor>,
        id: &EntityId,
        state: &EntityState,
    ) -> Result<(), AuditError> {
        if !descriptor.is_audited() {
            return Ok(());
        }
        let unit: WorkUnit = WorkUnit::delete(Arc::clone(descriptor), id.clone(), state.clone());
        self.submit(session, unit)
    }

    /// Elements of the `role` collection of an entity were added or removed.
    ///
    /// With `revision_on_collection_change` the owner is audited as well.
    ///
    /// # Errors
    ///
    /// Returns an error if `role` is not a property of the entity or the
    /// work units cannot be queued.
    pub fn on_collection_change(
        &self,
        session: &mut dyn AuditSession,
        descriptor: &Arc<EntityDescriptor>,
        owner_id: &EntityId,
        owner_state: &EntityState,
        role: &str,
        elements: Vec<ElementChange>,
    ) -> Result<(), AuditError> {
        if !descriptor.is_audited() {
            return Ok(());
        }
        descriptor.property_index(role)?;
        debug!(
            entity_name = %descriptor.name(),
            %owner_id,
            role,
            changes = elements.len(),
            "Collection changed"
        );

        let process: Arc<Mutex<AuditProcess>> = self.manager.get(session)?;
        let mut guard: MutexGuard<'_, AuditProcess> = process.lock();
        guard.add_work_unit(WorkUnit::collection(
            Arc::clone(descriptor),
            owner_id.clone(),
            role,
            elements,
        ))?;
        if self.manager.context().config().revision_on_collection_change {
            guard.add_work_unit(WorkUnit::owner_collection_change(
                Arc::clone(descriptor),
                owner_id.clone(),
                owner_state.clone(),
                role,
            ))?;
        }
        Ok(())
    }

    fn submit(&self, session: &mut dyn AuditSession, unit: WorkUnit) -> Result<(), AuditError> {
        let process: Arc<Mutex<AuditProcess>> = self.manager.get(session)?;
        process.lock().add_work_unit(unit)
    }
}
