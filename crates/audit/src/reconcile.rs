// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Combining two work units that target the same entity.

use std::collections::BTreeSet;

use revtrail_domain::{EntityDescriptor, EntityId, EntityState, RevisionType};
use tracing::debug;

use crate::error::AuditError;
use crate::work_unit::{Change, ElementChange, WorkUnit};

/// Outcome of combining an incoming unit with the one already queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The existing unit already describes the combined change.
    Keep,
    /// The existing unit is replaced by this one.
    Replace(WorkUnit),
    /// The two units cancel out; nothing should be audited.
    Cancel,
}

/// Combines `incoming` with `existing`, both keyed by the same entity.
///
/// # Arguments
///
/// * `existing` - The unit currently active for the key
/// * `incoming` - The newly submitted unit
///
/// # Errors
///
/// Returns `AuditError::IncompatibleWorkUnits` when a collection unit meets
/// an entity unit.
pub fn reconcile(existing: &WorkUnit, incoming: WorkUnit) -> Result<Reconciliation, AuditError> {
    let outcome: Reconciliation = match (existing.change(), incoming.change()) {
        (Change::Add { .. }, Change::Add { .. }) => Reconciliation::Replace(incoming),
        (Change::Add { .. }, Change::Modify { state, .. }) => {
            let state: EntityState = state.clone();
            Reconciliation::Replace(existing.with_change(Change::Add { state }))
        }
        (Change::Add { .. }, Change::Delete { .. }) => Reconciliation::Cancel,
        (Change::Add { .. }, Change::OwnerCollectionChange { .. }) => Reconciliation::Keep,

        (Change::Modify { .. }, Change::Add { .. }) => Reconciliation::Keep,
        (
            Change::Modify {
                old_state, changed, ..
            },
            Change::Modify {
                state,
                changed: incoming_changed,
                ..
            },
        ) => {
            let changed: BTreeSet<String> =
                net_changes(existing, old_state.as_ref(), state, changed, incoming_changed);
            Reconciliation::Replace(existing.with_change(Change::Modify {
                state: state.clone(),
                old_state: old_state.clone(),
                changed,
            }))
        }
        (Change::Modify { .. }, Change::Delete { .. }) => Reconciliation::Replace(incoming),
        (
            Change::Modify {
                state,
                old_state,
                changed,
            },
            Change::OwnerCollectionChange { roles, .. },
        ) => {
            if roles.is_subset(changed) {
                Reconciliation::Keep
            } else {
                let changed: BTreeSet<String> = changed.union(roles).cloned().collect();
                Reconciliation::Replace(existing.with_change(Change::Modify {
                    state: state.clone(),
                    old_state: old_state.clone(),
                    changed,
                }))
            }
        }

        (Change::Delete { state: deleted }, Change::Add { state }) => {
            if deleted == state {
                Reconciliation::Cancel
            } else {
                let changed: BTreeSet<String> = existing
                    .descriptor()
                    .changed_properties(Some(deleted), state);
                Reconciliation::Replace(existing.with_change(Change::Modify {
                    state: state.clone(),
                    old_state: Some(deleted.clone()),
                    changed,
                }))
            }
        }
        (
            Change::Delete { .. },
            Change::Modify { .. } | Change::Delete { .. } | Change::OwnerCollectionChange { .. },
        ) => Reconciliation::Keep,

        (Change::OwnerCollectionChange { .. }, Change::Add { .. } | Change::Delete { .. }) => {
            Reconciliation::Replace(incoming)
        }
        (
            Change::OwnerCollectionChange { roles, .. },
            Change::Modify {
                state,
                old_state,
                changed,
            },
        ) => {
            let changed: BTreeSet<String> = changed.union(roles).cloned().collect();
            Reconciliation::Replace(existing.with_change(Change::Modify {
                state: state.clone(),
                old_state: old_state.clone(),
                changed,
            }))
        }
        (
            Change::OwnerCollectionChange { roles, .. },
            Change::OwnerCollectionChange {
                state,
                roles: incoming_roles,
            },
        ) => {
            if incoming_roles.is_subset(roles) {
                Reconciliation::Keep
            } else {
                let roles: BTreeSet<String> = roles.union(incoming_roles).cloned().collect();
                Reconciliation::Replace(existing.with_change(Change::OwnerCollectionChange {
                    state: state.clone(),
                    roles,
                }))
            }
        }

        (
            Change::Collection { role, elements },
            Change::Collection {
                elements: incoming_elements,
                ..
            },
        ) => {
            let merged: Vec<ElementChange> = merge_elements(elements, incoming_elements);
            if merged.is_empty() {
                Reconciliation::Cancel
            } else {
                Reconciliation::Replace(existing.with_change(Change::Collection {
                    role: role.clone(),
                    elements: merged,
                }))
            }
        }

        (Change::Collection { .. }, _) | (_, Change::Collection { .. }) => {
            return Err(AuditError::IncompatibleWorkUnits {
                entity_name: existing.entity_name().clone(),
                id: existing
                    .entity_id()
                    .cloned()
                    .unwrap_or_else(|| EntityId::Text(String::new())),
                existing: existing.kind(),
                incoming: incoming.kind(),
            });
        }
    };

    debug!(
        entity_name = %existing.entity_name(),
        existing = existing.kind(),
        outcome = outcome_name(&outcome),
        "Reconciled work units"
    );
    Ok(outcome)
}

/// The changed set of two combined modifications.
///
/// Basic properties are diffed between the first old state and the latest
/// state; collection roles flagged by either unit stay flagged. Without an
/// old state every audited property already counts as changed.
fn net_changes(
    existing: &WorkUnit,
    old_state: Option<&EntityState>,
    state: &EntityState,
    changed: &BTreeSet<String>,
    incoming_changed: &BTreeSet<String>,
) -> BTreeSet<String> {
    let Some(old_state) = old_state else {
        return changed.union(incoming_changed).cloned().collect();
    };
    let descriptor: &EntityDescriptor = existing.descriptor();
    let mut net: BTreeSet<String> = descriptor.changed_properties(Some(old_state), state);
    net.extend(
        changed
            .iter()
            .chain(incoming_changed)
            .filter(|name| {
                descriptor
                    .properties()
                    .iter()
                    .any(|property| property.collection && property.name == **name)
            })
            .cloned(),
    );
    net
}

/// Incoming element changes overshadow existing ones for the same element.
///
/// An addition and a removal of the same element, in either order, leave
/// the collection unchanged, so both are dropped.
fn merge_elements(existing: &[ElementChange], incoming: &[ElementChange]) -> Vec<ElementChange> {
    let mut merged: Vec<ElementChange> = Vec::with_capacity(existing.len() + incoming.len());
    let mut cancelled: BTreeSet<usize> = BTreeSet::new();

    for old in existing {
        match incoming.iter().position(|new| new.element == old.element) {
            None => merged.push(old.clone()),
            Some(index) => {
                if matches!(
                    (old.revision_type, incoming[index].revision_type),
                    (RevisionType::Del, RevisionType::Add) | (RevisionType::Add, RevisionType::Del)
                ) {
                    cancelled.insert(index);
                }
            }
        }
    }

    merged.extend(
        incoming
            .iter()
            .enumerate()
            .filter(|(index, _)| !cancelled.contains(index))
            .map(|(_, new)| new.clone()),
    );
    merged
}

const fn outcome_name(outcome: &Reconciliation) -> &'static str {
    match outcome {
        Reconciliation::Keep => "keep",
        Reconciliation::Replace(_) => "replace",
        Reconciliation::Cancel => "cancel",
    }
}
