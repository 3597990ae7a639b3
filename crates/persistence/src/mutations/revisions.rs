// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::BTreeMap;

use diesel::SqliteConnection;
use diesel::prelude::*;
use revtrail_domain::{EntityName, Value};
use time::OffsetDateTime;
use tracing::debug;

use crate::backend::get_last_insert_rowid;
use crate::data_models::encode_timestamp;
use crate::diesel_schema::{revchanges, revinfo};
use crate::error::PersistenceError;

/// Inserts a revision marker.
///
/// # Arguments
///
/// * `conn` - The active database connection
/// * `timestamp` - When the revision was generated
/// * `properties` - Custom revision properties
///
/// # Returns
///
/// The revision number assigned by the database.
///
/// # Errors
///
/// Returns an error if serialization or the insert fails.
pub fn insert_revision(
    conn: &mut SqliteConnection,
    timestamp: OffsetDateTime,
    properties: &BTreeMap<String, Value>,
) -> Result<i64, PersistenceError> {
    let revtstmp: String = encode_timestamp(timestamp)?;
    let properties_json: String = serde_json::to_string(properties)?;

    diesel::insert_into(revinfo::table)
        .values((
            revinfo::revtstmp.eq(&revtstmp),
            revinfo::properties_json.eq(&properties_json),
        ))
        .execute(conn)?;

    let rev: i64 = get_last_insert_rowid(conn)?;
    debug!(rev, "Inserted revision");
    Ok(rev)
}

/// Records that an entity with `entity_name` changed in `rev`.
///
/// Recording the same name twice for one revision is a no-op.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_changed_entity(
    conn: &mut SqliteConnection,
    rev: i64,
    entity_name: &EntityName,
) -> Result<(), PersistenceError> {
    diesel::insert_or_ignore_into(revchanges::table)
        .values((
            revchanges::rev.eq(rev),
            revchanges::entity_name.eq(entity_name.as_str()),
        ))
        .execute(conn)?;
    Ok(())
}
