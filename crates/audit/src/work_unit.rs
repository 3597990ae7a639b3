// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::BTreeSet;
use std::sync::Arc;

use revtrail_domain::{EntityDescriptor, EntityId, EntityName, EntityState, RevisionType, Value};

use crate::row::AuditRowKey;

/// Key of the used-ids index: at most one active unit exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkUnitKey {
    /// Entity name (for collection units, the collection's middle entity name).
    pub entity_name: EntityName,
    /// Entity identifier (for collection units, the synthetic collection id).
    pub id: EntityId,
}

/// One element added to or removed from a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementChange {
    /// The element value (a scalar or a reference to the element entity).
    pub element: Value,
    /// `Add` or `Del`.
    pub revision_type: RevisionType,
}

impl ElementChange {
    /// The element was added to the collection.
    #[must_use]
    pub const fn added(element: Value) -> Self {
        Self {
            element,
            revision_type: RevisionType::Add,
        }
    }

    /// The element was removed from the collection.
    #[must_use]
    pub const fn removed(element: Value) -> Self {
        Self {
            element,
            revision_type: RevisionType::Del,
        }
    }
}

/// What a work unit records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The entity was created with `state`.
    Add {
        /// State after insert.
        state: EntityState,
    },
    /// The entity changed from `old_state` to `state`.
    Modify {
        /// State after the update.
        state: EntityState,
        /// State before the update, when known.
        old_state: Option<EntityState>,
        /// Audited properties (and collection roles) that changed.
        changed: BTreeSet<String>,
    },
    /// The entity was deleted; `state` is its last known state.
    Delete {
        /// Last known state.
        state: EntityState,
    },
    /// One or more collections of the entity changed; the owner row is re-audited.
    OwnerCollectionChange {
        /// Current state of the owner.
        state: EntityState,
        /// Collection roles that changed.
        roles: BTreeSet<String>,
    },
    /// Per-element changes of one collection role.
    Collection {
        /// The collection property on the owner.
        role: String,
        /// Element changes in submission order.
        elements: Vec<ElementChange>,
    },
}

/// A pending change destined to become one or more audit rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    descriptor: Arc<EntityDescriptor>,
    entity_name: EntityName,
    id: Option<EntityId>,
    change: Change,
    performed: Option<Vec<AuditRowKey>>,
}

impl WorkUnit {
    fn build(descriptor: Arc<EntityDescriptor>, id: Option<EntityId>, change: Change) -> Self {
        let entity_name: EntityName = match &change {
            Change::Collection { role, .. } => middle_entity_name(descriptor.name(), role),
            _ => descriptor.name().clone(),
        };
        Self {
            descriptor,
            entity_name,
            id,
            change,
            performed: None,
        }
    }

    /// An insert of a new entity.
    #[must_use]
    pub fn add(descriptor: Arc<EntityDescriptor>, id: EntityId, state: EntityState) -> Self {
        Self::build(descriptor, Some(id), Change::Add { state })
    }

    /// An update; the changed set is computed from the two states.
    #[must_use]
    pub fn modify(
        descriptor: Arc<EntityDescriptor>,
        id: EntityId,
        state: EntityState,
        old_state: Option<EntityState>,
    ) -> Self {
        let changed: BTreeSet<String> = descriptor.changed_properties(old_state.as_ref(), &state);
        Self::build(
            descriptor,
            Some(id),
            Change::Modify {
                state,
                old_state,
                changed,
            },
        )
    }

    /// A delete of an existing entity.
    #[must_use]
    pub fn delete(descriptor: Arc<EntityDescriptor>, id: EntityId, state: EntityState) -> Self {
        Self::build(descriptor, Some(id), Change::Delete { state })
    }

    /// The owner of a changed collection, re-audited with its current state.
    #[must_use]
    pub fn owner_collection_change(
        descriptor: Arc<EntityDescriptor>,
        id: EntityId,
        state: EntityState,
        role: &str,
    ) -> Self {
        Self::build(
            descriptor,
            Some(id),
            Change::OwnerCollectionChange {
                state,
                roles: BTreeSet::from([role.to_string()]),
            },
        )
    }

    /// Element changes of the `role` collection owned by `owner_id`.
    #[must_use]
    pub fn collection(
        descriptor: Arc<EntityDescriptor>,
        owner_id: EntityId,
        role: &str,
        elements: Vec<ElementChange>,
    ) -> Self {
        Self::build(
            descriptor,
            Some(EntityId::collection(owner_id, role)),
            Change::Collection {
                role: role.to_string(),
                elements,
            },
        )
    }

    /// A unit not tied to any entity identifier; it is queued without reconciliation.
    #[must_use]
    pub fn free_standing(descriptor: Arc<EntityDescriptor>, change: Change) -> Self {
        Self::build(descriptor, None, change)
    }

    /// Creates a sibling unit (same entity and id) carrying `change`.
    #[must_use]
    pub(crate) fn with_change(&self, change: Change) -> Self {
        Self::build(Arc::clone(&self.descriptor), self.id.clone(), change)
    }

    /// The entity descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.descriptor
    }

    /// The entity name used for keying and for the audit entity.
    #[must_use]
    pub const fn entity_name(&self) -> &EntityName {
        &self.entity_name
    }

    /// The entity identifier, absent for free-standing units.
    #[must_use]
    pub const fn entity_id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    /// The used-ids key, absent for free-standing units.
    #[must_use]
    pub fn key(&self) -> Option<WorkUnitKey> {
        self.id.as_ref().map(|id| WorkUnitKey {
            entity_name: self.entity_name.clone(),
            id: id.clone(),
        })
    }

    /// What this unit records.
    #[must_use]
    pub const fn change(&self) -> &Change {
        &self.change
    }

    /// Short name of the change kind, used in logs and errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self.change {
            Change::Add { .. } => "add",
            Change::Modify { .. } => "modify",
            Change::Delete { .. } => "delete",
            Change::OwnerCollectionChange { .. } => "owner-collection-change",
            Change::Collection { .. } => "collection",
        }
    }

    /// The revision type reported for this unit's entity.
    #[must_use]
    pub const fn revision_type(&self) -> RevisionType {
        match self.change {
            Change::Add { .. } => RevisionType::Add,
            Change::Delete { .. } => RevisionType::Del,
            Change::Modify { .. }
            | Change::OwnerCollectionChange { .. }
            | Change::Collection { .. } => RevisionType::Mod,
        }
    }

    /// Entity state carried by the unit, if any.
    #[must_use]
    pub const fn state(&self) -> Option<&EntityState> {
        match &self.change {
            Change::Add { state }
            | Change::Modify { state, .. }
            | Change::Delete { state }
            | Change::OwnerCollectionChange { state, .. } => Some(state),
            Change::Collection { .. } => None,
        }
    }

    /// Whether performing this unit would write anything.
    #[must_use]
    pub fn contains_work(&self) -> bool {
        match &self.change {
            Change::Add { .. } | Change::Delete { .. } | Change::OwnerCollectionChange { .. } => {
                true
            }
            Change::Modify { changed, .. } => !changed.is_empty(),
            Change::Collection { elements, .. } => !elements.is_empty(),
        }
    }

    /// Whether the unit has already written rows to storage.
    #[must_use]
    pub const fn is_performed(&self) -> bool {
        self.performed.is_some()
    }

    /// Keys of the rows written when the unit was performed.
    #[must_use]
    pub fn performed_rows(&self) -> &[AuditRowKey] {
        self.performed.as_deref().unwrap_or_default()
    }

    /// Records the rows written by performing the unit.
    pub fn mark_performed(&mut self, rows: Vec<AuditRowKey>) {
        self.performed = Some(rows);
    }
}

/// Name of the entity that stores rows of the `role` collection of `owner`.
#[must_use]
pub fn middle_entity_name(owner: &EntityName, role: &str) -> EntityName {
    EntityName::new(format!("{owner}_{role}"))
}
