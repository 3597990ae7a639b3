// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use diesel::SqliteConnection;
use diesel::prelude::*;
use revtrail_domain::{EntityId, EntityName, EntityState, Value};

use crate::data_models::{decode_state, encode_id};
use crate::diesel_schema::{collection_elements, entities};
use crate::error::PersistenceError;

/// Loads the stored state of an entity.
///
/// # Errors
///
/// Returns an error if the query fails or the stored state is invalid.
pub fn load_entity_state(
    conn: &mut SqliteConnection,
    entity_name: &EntityName,
    id: &EntityId,
) -> Result<Option<EntityState>, PersistenceError> {
    let stored: Option<String> = entities::table
        .filter(entities::entity_name.eq(entity_name.as_str()))
        .filter(entities::entity_id_json.eq(encode_id(id)?))
        .select(entities::state_json)
        .first::<String>(conn)
        .optional()?;

    stored.as_deref().map(decode_state).transpose()
}

/// Loads the current elements of one collection, ordered by encoding.
///
/// # Errors
///
/// Returns an error if the query fails or an element is invalid.
pub fn load_collection(
    conn: &mut SqliteConnection,
    entity_name: &EntityName,
    owner_id: &EntityId,
    role: &str,
) -> Result<Vec<Value>, PersistenceError> {
    let elements: Vec<String> = collection_elements::table
        .filter(collection_elements::entity_name.eq(entity_name.as_str()))
        .filter(collection_elements::owner_id_json.eq(encode_id(owner_id)?))
        .filter(collection_elements::role.eq(role))
        .select(collection_elements::element_json)
        .order(collection_elements::element_json.asc())
        .load::<String>(conn)?;

    elements
        .iter()
        .map(|json| serde_json::from_str::<Value>(json).map_err(PersistenceError::from))
        .collect()
}
