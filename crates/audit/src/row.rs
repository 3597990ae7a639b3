// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::{BTreeMap, BTreeSet};

use revtrail_domain::{AuditConfiguration, EntityId, EntityName, EntityState, RevisionType, Value};

use crate::work_unit::{Change, WorkUnit};

/// Identifies one audit row.
///
/// Entity rows are keyed by the original id; collection rows additionally by
/// the element, with `original_id` holding the owner id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuditRowKey {
    /// The audit entity the row belongs to (for example `Book_AUD`).
    pub audit_entity: EntityName,
    /// Identifier of the audited entity, or the collection owner.
    pub original_id: Option<EntityId>,
    /// The collection element, for collection rows.
    pub element: Option<Value>,
    /// The revision that produced the row.
    pub revision: i64,
}

/// A row of audit data ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    /// The row key.
    pub key: AuditRowKey,
    /// What happened to the entity in this revision.
    pub revision_type: RevisionType,
    /// Audited property values and modified flags, by column name.
    pub data: BTreeMap<String, Value>,
}

/// Builds the audit rows a work unit writes in `revision`.
///
/// Entity units produce one row; collection units produce one row per
/// element change.
#[must_use]
pub fn generate_rows(unit: &WorkUnit, config: &AuditConfiguration, revision: i64) -> Vec<AuditRow> {
    let audit_entity: EntityName = config.audit_entity_name(unit.entity_name());
    let original_id: Option<EntityId> = unit.entity_id().map(|id| id.owner_id().clone());

    let (state, flags, store_values): (&EntityState, Flags<'_>, bool) = match unit.change() {
        Change::Collection { elements, .. } => {
            return elements
                .iter()
                .map(|change| AuditRow {
                    key: AuditRowKey {
                        audit_entity: audit_entity.clone(),
                        original_id: original_id.clone(),
                        element: Some(change.element.clone()),
                        revision,
                    },
                    revision_type: change.revision_type,
                    data: BTreeMap::new(),
                })
                .collect();
        }
        Change::Add { state } => (state, Flags::All, true),
        Change::Modify { state, changed, .. } => (state, Flags::Only(changed), true),
        Change::OwnerCollectionChange { state, roles } => (state, Flags::Only(roles), true),
        Change::Delete { state } => (state, Flags::None, config.store_data_at_delete),
    };

    let mut data: BTreeMap<String, Value> = BTreeMap::new();
    for (index, property) in unit.descriptor().properties().iter().enumerate() {
        if !property.audited {
            continue;
        }
        if !property.collection {
            let value: Value = if store_values {
                state.get(index).cloned().unwrap_or_default()
            } else {
                Value::Null
            };
            data.insert(property.name.clone(), value);
        }
        if config.global_with_modified_flag {
            data.insert(
                config.modified_flag_name(&property.name),
                Value::Bool(flags.contains(&property.name)),
            );
        }
    }

    vec![AuditRow {
        key: AuditRowKey {
            audit_entity,
            original_id,
            element: None,
            revision,
        },
        revision_type: unit.revision_type(),
        data,
    }]
}

enum Flags<'a> {
    All,
    Only(&'a BTreeSet<String>),
    None,
}

impl Flags<'_> {
    fn contains(&self, property: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(property),
            Self::None => false,
        }
    }
}
