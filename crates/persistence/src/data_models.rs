// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Stored row shapes and their JSON column encodings.

use std::collections::BTreeMap;

use diesel::prelude::*;
use revtrail_audit::AuditRowKey;
use revtrail_domain::{EntityId, EntityName, EntityState, RevisionType, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::diesel_schema::{audit_rows, revinfo};
use crate::error::PersistenceError;

/// One audit row read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Audit entity, original id, element, and revision.
    pub key: AuditRowKey,
    /// What happened in this revision.
    pub revision_type: RevisionType,
    /// Revision at which a newer row superseded this one (validity strategy).
    pub revision_end: Option<i64>,
    /// Audited property values and modified flags.
    pub data: BTreeMap<String, Value>,
}

impl AuditRecord {
    /// The stored value of `property`, if the row carries it.
    #[must_use]
    pub fn value(&self, property: &str) -> Option<&Value> {
        self.data.get(property)
    }
}

/// Diesel Queryable struct for revision rows.
#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = revinfo)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RevisionRow {
    pub rev: i64,
    pub revtstmp: String,
    pub properties_json: String,
}

/// Diesel Queryable struct for audit rows.
#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = audit_rows)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AuditRowData {
    #[allow(dead_code)]
    pub audit_row_id: i64,
    pub audit_entity: String,
    pub original_id_json: String,
    pub element_json: String,
    pub rev: i64,
    pub revtype: i16,
    pub revend: Option<i64>,
    pub data_json: String,
}

impl TryFrom<AuditRowData> for AuditRecord {
    type Error = PersistenceError;

    fn try_from(row: AuditRowData) -> Result<Self, Self::Error> {
        let revision_type: RevisionType = RevisionType::try_from(row.revtype)
            .map_err(|err| PersistenceError::InvalidRow(err.to_string()))?;
        Ok(Self {
            key: AuditRowKey {
                audit_entity: EntityName::new(row.audit_entity),
                original_id: serde_json::from_str(&row.original_id_json)?,
                element: serde_json::from_str(&row.element_json)?,
                revision: row.rev,
            },
            revision_type,
            revision_end: row.revend,
            data: serde_json::from_str(&row.data_json)?,
        })
    }
}

/// The columns identifying an audit row, encoded for equality filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRowKey {
    pub audit_entity: String,
    pub original_id_json: String,
    pub element_json: String,
    pub rev: i64,
}

impl EncodedRowKey {
    /// Encodes `key`; an absent id or element becomes the JSON literal `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if the id or element cannot be serialized.
    pub fn encode(key: &AuditRowKey) -> Result<Self, PersistenceError> {
        Ok(Self {
            audit_entity: key.audit_entity.as_str().to_string(),
            original_id_json: serde_json::to_string(&key.original_id)?,
            element_json: serde_json::to_string(&key.element)?,
            rev: key.revision,
        })
    }
}

/// Encodes an entity identifier as it is stored in key columns.
///
/// Matches the encoding of a present `original_id` in [`EncodedRowKey`].
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_id(id: &EntityId) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(id)?)
}

/// Encodes a collection element.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_element(element: &Value) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(element)?)
}

/// Encodes an entity state snapshot.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_state(state: &EntityState) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(state)?)
}

/// Decodes an entity state snapshot.
///
/// # Errors
///
/// Returns an error if the stored text is not a valid state.
pub fn decode_state(json: &str) -> Result<EntityState, PersistenceError> {
    Ok(serde_json::from_str(json)?)
}

/// Formats a revision timestamp for storage.
///
/// # Errors
///
/// Returns an error if the timestamp cannot be formatted.
pub fn encode_timestamp(timestamp: OffsetDateTime) -> Result<String, PersistenceError> {
    timestamp
        .format(&Rfc3339)
        .map_err(|err| PersistenceError::SerializationError(err.to_string()))
}

/// Parses a stored revision timestamp.
///
/// # Errors
///
/// Returns an error if the stored text is not RFC 3339.
pub fn decode_timestamp(text: &str) -> Result<OffsetDateTime, PersistenceError> {
    OffsetDateTime::parse(text, &Rfc3339).map_err(|err| PersistenceError::InvalidRow(err.to_string()))
}
