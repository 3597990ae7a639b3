// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Audit history queries.
//!
//! Entity rows are the rows whose `element_json` is the JSON literal `null`;
//! collection rows carry the element instead.

use diesel::SqliteConnection;
use diesel::dsl::count_star;
use diesel::prelude::*;
use revtrail_domain::{EntityId, EntityName, RevisionType};

use crate::data_models::{AuditRecord, AuditRowData, encode_id};
use crate::diesel_schema::audit_rows;
use crate::error::PersistenceError;

const NO_ELEMENT: &str = "null";

/// Revision numbers in which the entity changed, ascending.
///
/// # Arguments
///
/// * `conn` - The database connection
/// * `audit_entity` - The audit entity name (e.g. `Foo_AUD`)
/// * `id` - The original entity identifier
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_revisions(
    conn: &mut SqliteConnection,
    audit_entity: &EntityName,
    id: &EntityId,
) -> Result<Vec<i64>, PersistenceError> {
    Ok(audit_rows::table
        .filter(audit_rows::audit_entity.eq(audit_entity.as_str()))
        .filter(audit_rows::original_id_json.eq(encode_id(id)?))
        .filter(audit_rows::element_json.eq(NO_ELEMENT))
        .select(audit_rows::rev)
        .order(audit_rows::rev.asc())
        .load::<i64>(conn)?)
}

/// All entity rows of one entity, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails or a row cannot be decoded.
pub fn get_history(
    conn: &mut SqliteConnection,
    audit_entity: &EntityName,
    id: &EntityId,
) -> Result<Vec<AuditRecord>, PersistenceError> {
    audit_rows::table
        .filter(audit_rows::audit_entity.eq(audit_entity.as_str()))
        .filter(audit_rows::original_id_json.eq(encode_id(id)?))
        .filter(audit_rows::element_json.eq(NO_ELEMENT))
        .order(audit_rows::rev.asc())
        .select(AuditRowData::as_select())
        .load::<AuditRowData>(conn)?
        .into_iter()
        .map(AuditRecord::try_from)
        .collect()
}

/// The entity row in effect at revision `rev`.
///
/// # Returns
///
/// `None` if the entity did not exist yet or had been deleted at `rev`.
///
/// # Errors
///
/// Returns an error if the query fails or the row cannot be decoded.
pub fn find_at_revision(
    conn: &mut SqliteConnection,
    audit_entity: &EntityName,
    id: &EntityId,
    rev: i64,
) -> Result<Option<AuditRecord>, PersistenceError> {
    let row: Option<AuditRowData> = audit_rows::table
        .filter(audit_rows::audit_entity.eq(audit_entity.as_str()))
        .filter(audit_rows::original_id_json.eq(encode_id(id)?))
        .filter(audit_rows::element_json.eq(NO_ELEMENT))
        .filter(audit_rows::rev.le(rev))
        .order(audit_rows::rev.desc())
        .select(AuditRowData::as_select())
        .first::<AuditRowData>(conn)
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };
    let record: AuditRecord = AuditRecord::try_from(row)?;
    if record.revision_type == RevisionType::Del {
        return Ok(None);
    }
    Ok(Some(record))
}

/// Every audit row written in revision `rev`, in insertion order.
///
/// # Errors
///
/// Returns an error if the query fails or a row cannot be decoded.
pub fn get_rows_at_revision(
    conn: &mut SqliteConnection,
    rev: i64,
) -> Result<Vec<AuditRecord>, PersistenceError> {
    audit_rows::table
        .filter(audit_rows::rev.eq(rev))
        .order(audit_rows::audit_row_id.asc())
        .select(AuditRowData::as_select())
        .load::<AuditRowData>(conn)?
        .into_iter()
        .map(AuditRecord::try_from)
        .collect()
}

/// Collection rows of one owner's `role` collection, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails or a row cannot be decoded.
pub fn get_collection_history(
    conn: &mut SqliteConnection,
    middle_audit_entity: &EntityName,
    owner_id: &EntityId,
) -> Result<Vec<AuditRecord>, PersistenceError> {
    audit_rows::table
        .filter(audit_rows::audit_entity.eq(middle_audit_entity.as_str()))
        .filter(audit_rows::original_id_json.eq(encode_id(owner_id)?))
        .filter(audit_rows::element_json.ne(NO_ELEMENT))
        .order((audit_rows::rev.asc(), audit_rows::audit_row_id.asc()))
        .select(AuditRowData::as_select())
        .load::<AuditRowData>(conn)?
        .into_iter()
        .map(AuditRecord::try_from)
        .collect()
}

/// Number of audit rows, optionally restricted to one audit entity.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_audit_rows(
    conn: &mut SqliteConnection,
    audit_entity: Option<&EntityName>,
) -> Result<i64, PersistenceError> {
    let mut query = audit_rows::table.select(count_star()).into_boxed();
    if let Some(audit_entity) = audit_entity {
        query = query.filter(audit_rows::audit_entity.eq(audit_entity.as_str()));
    }
    Ok(query.first::<i64>(conn)?)
}
