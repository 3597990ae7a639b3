// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::{BTreeMap, BTreeSet};

use diesel::SqliteConnection;
use diesel::dsl::count_star;
use diesel::prelude::*;
use revtrail::RevisionData;
use revtrail_domain::{EntityName, Value};

use crate::data_models::{RevisionRow, decode_timestamp};
use crate::diesel_schema::{revchanges, revinfo};
use crate::error::PersistenceError;

/// Whether a revision with number `rev` is visible on this connection.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn revision_exists(conn: &mut SqliteConnection, rev: i64) -> Result<bool, PersistenceError> {
    let count: i64 = revinfo::table
        .filter(revinfo::rev.eq(rev))
        .select(count_star())
        .first::<i64>(conn)?;
    Ok(count > 0)
}

/// Retrieves a revision with its properties and changed entity names.
///
/// # Arguments
///
/// * `conn` - The database connection
/// * `rev` - The revision number
///
/// # Errors
///
/// Returns `PersistenceError::NotFound` if the revision does not exist, or
/// an error if a stored column cannot be decoded.
pub fn get_revision(conn: &mut SqliteConnection, rev: i64) -> Result<RevisionData, PersistenceError> {
    let row: RevisionRow = revinfo::table
        .filter(revinfo::rev.eq(rev))
        .select(RevisionRow::as_select())
        .first::<RevisionRow>(conn)
        .optional()?
        .ok_or_else(|| PersistenceError::NotFound(format!("Revision {rev}")))?;

    let properties: BTreeMap<String, Value> = serde_json::from_str(&row.properties_json)?;
    let changed_entity_names: BTreeSet<EntityName> = revchanges::table
        .filter(revchanges::rev.eq(rev))
        .select(revchanges::entity_name)
        .load::<String>(conn)?
        .into_iter()
        .map(EntityName::new)
        .collect();

    let mut revision: RevisionData = RevisionData::new(decode_timestamp(&row.revtstmp)?);
    revision.id = Some(row.rev);
    revision.properties = properties;
    revision.changed_entity_names = changed_entity_names;
    Ok(revision)
}

/// Lists all revision numbers in ascending order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_revisions(conn: &mut SqliteConnection) -> Result<Vec<i64>, PersistenceError> {
    Ok(revinfo::table
        .select(revinfo::rev)
        .order(revinfo::rev.asc())
        .load::<i64>(conn)?)
}
