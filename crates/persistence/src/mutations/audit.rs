// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Audit row persistence.

use diesel::SqliteConnection;
use diesel::prelude::*;
use revtrail_audit::{AuditRow, AuditRowKey};
use tracing::debug;

use crate::data_models::EncodedRowKey;
use crate::diesel_schema::audit_rows;
use crate::error::PersistenceError;

/// Inserts one audit row.
///
/// # Arguments
///
/// * `conn` - The active database connection
/// * `row` - The row to write
///
/// # Errors
///
/// Returns an error if serialization fails, the revision does not exist, or
/// a row with the same key is already stored.
pub fn insert_audit_row(conn: &mut SqliteConnection, row: &AuditRow) -> Result<(), PersistenceError> {
    let key: EncodedRowKey = EncodedRowKey::encode(&row.key)?;
    let data_json: String = serde_json::to_string(&row.data)?;

    diesel::insert_into(audit_rows::table)
        .values((
            audit_rows::audit_entity.eq(&key.audit_entity),
            audit_rows::original_id_json.eq(&key.original_id_json),
            audit_rows::element_json.eq(&key.element_json),
            audit_rows::rev.eq(key.rev),
            audit_rows::revtype.eq(row.revision_type.as_i16()),
            audit_rows::data_json.eq(&data_json),
        ))
        .execute(conn)?;

    debug!(
        audit_entity = %key.audit_entity,
        rev = key.rev,
        revtype = %row.revision_type,
        "Inserted audit row"
    );
    Ok(())
}

/// Deletes the audit row identified by `key`.
///
/// # Returns
///
/// The number of rows deleted (zero or one).
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_audit_row(
    conn: &mut SqliteConnection,
    key: &AuditRowKey,
) -> Result<usize, PersistenceError> {
    let key: EncodedRowKey = EncodedRowKey::encode(key)?;
    let deleted: usize = diesel::delete(
        audit_rows::table
            .filter(audit_rows::audit_entity.eq(&key.audit_entity))
            .filter(audit_rows::original_id_json.eq(&key.original_id_json))
            .filter(audit_rows::element_json.eq(&key.element_json))
            .filter(audit_rows::rev.eq(key.rev)),
    )
    .execute(conn)?;
    Ok(deleted)
}

/// Sets the end revision of the open rows for the same audit entity, id,
/// and element as `key`, other than the row written in `key.revision`.
///
/// # Returns
///
/// The number of rows closed.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn close_open_rows(
    conn: &mut SqliteConnection,
    key: &AuditRowKey,
) -> Result<usize, PersistenceError> {
    let key: EncodedRowKey = EncodedRowKey::encode(key)?;
    let closed: usize = diesel::update(
        audit_rows::table
            .filter(audit_rows::audit_entity.eq(&key.audit_entity))
            .filter(audit_rows::original_id_json.eq(&key.original_id_json))
            .filter(audit_rows::element_json.eq(&key.element_json))
            .filter(audit_rows::rev.ne(key.rev))
            .filter(audit_rows::revend.is_null()),
    )
    .set(audit_rows::revend.eq(Some(key.rev)))
    .execute(conn)?;
    Ok(closed)
}

/// Clears the end revision of rows closed at `key.revision`.
///
/// # Returns
///
/// The number of rows re-opened.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn reopen_closed_rows(
    conn: &mut SqliteConnection,
    key: &AuditRowKey,
) -> Result<usize, PersistenceError> {
    let key: EncodedRowKey = EncodedRowKey::encode(key)?;
    let reopened: usize = diesel::update(
        audit_rows::table
            .filter(audit_rows::audit_entity.eq(&key.audit_entity))
            .filter(audit_rows::original_id_json.eq(&key.original_id_json))
            .filter(audit_rows::element_json.eq(&key.element_json))
            .filter(audit_rows::revend.eq(key.rev)),
    )
    .set(audit_rows::revend.eq(None::<i64>))
    .execute(conn)?;
    Ok(reopened)
}
