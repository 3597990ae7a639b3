// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Host entity state and collection elements.

use diesel::SqliteConnection;
use diesel::prelude::*;
use revtrail_audit::ElementChange;
use revtrail_domain::{EntityId, EntityName, EntityState, RevisionType};

use crate::data_models::{decode_state, encode_element, encode_id, encode_state};
use crate::diesel_schema::{collection_elements, entities};
use crate::error::PersistenceError;

/// Inserts a new entity.
///
/// # Errors
///
/// Returns an error if an entity with the same name and id already exists.
pub fn insert_entity(
    conn: &mut SqliteConnection,
    entity_name: &EntityName,
    id: &EntityId,
    state: &EntityState,
) -> Result<(), PersistenceError> {
    diesel::insert_into(entities::table)
        .values((
            entities::entity_name.eq(entity_name.as_str()),
            entities::entity_id_json.eq(encode_id(id)?),
            entities::state_json.eq(encode_state(state)?),
        ))
        .execute(conn)?;
    Ok(())
}

/// Replaces the stored state of an entity.
///
/// # Errors
///
/// Returns `PersistenceError::NotFound` if the entity does not exist.
pub fn update_entity_state(
    conn: &mut SqliteConnection,
    entity_name: &EntityName,
    id: &EntityId,
    state: &EntityState,
) -> Result<(), PersistenceError> {
    update_entity_state_returning(conn, entity_name, id, state)?.ok_or_else(|| {
        PersistenceError::NotFound(format!("{entity_name} with id {id}"))
    })?;
    Ok(())
}

/// Replaces the stored state of an entity and returns the state as stored.
///
/// # Returns
///
/// `None` if no entity matched.
///
/// # Errors
///
/// Returns an error if the update fails or the stored state is invalid.
pub fn update_entity_state_returning(
    conn: &mut SqliteConnection,
    entity_name: &EntityName,
    id: &EntityId,
    state: &EntityState,
) -> Result<Option<EntityState>, PersistenceError> {
    let stored: Option<String> = diesel::update(
        entities::table
            .filter(entities::entity_name.eq(entity_name.as_str()))
            .filter(entities::entity_id_json.eq(encode_id(id)?)),
    )
    .set(entities::state_json.eq(encode_state(state)?))
    .returning(entities::state_json)
    .get_result::<String>(conn)
    .optional()?;

    stored.as_deref().map(decode_state).transpose()
}

/// Deletes an entity and its collection elements.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_entity(
    conn: &mut SqliteConnection,
    entity_name: &EntityName,
    id: &EntityId,
) -> Result<(), PersistenceError> {
    let id_json: String = encode_id(id)?;
    diesel::delete(
        collection_elements::table
            .filter(collection_elements::entity_name.eq(entity_name.as_str()))
            .filter(collection_elements::owner_id_json.eq(&id_json)),
    )
    .execute(conn)?;
    diesel::delete(
        entities::table
            .filter(entities::entity_name.eq(entity_name.as_str()))
            .filter(entities::entity_id_json.eq(&id_json)),
    )
    .execute(conn)?;
    Ok(())
}

/// Applies element additions and removals to one collection.
///
/// # Errors
///
/// Returns an error if an insert or delete fails.
pub fn apply_collection_changes(
    conn: &mut SqliteConnection,
    entity_name: &EntityName,
    owner_id: &EntityId,
    role: &str,
    changes: &[ElementChange],
) -> Result<(), PersistenceError> {
    let owner_id_json: String = encode_id(owner_id)?;
    for change in changes {
        let element_json: String = encode_element(&change.element)?;
        if change.revision_type == RevisionType::Del {
            diesel::delete(
                collection_elements::table
                    .filter(collection_elements::entity_name.eq(entity_name.as_str()))
                    .filter(collection_elements::owner_id_json.eq(&owner_id_json))
                    .filter(collection_elements::role.eq(role))
                    .filter(collection_elements::element_json.eq(&element_json)),
            )
            .execute(conn)?;
        } else {
            diesel::insert_or_ignore_into(collection_elements::table)
                .values((
                    collection_elements::entity_name.eq(entity_name.as_str()),
                    collection_elements::owner_id_json.eq(&owner_id_json),
                    collection_elements::role.eq(role),
                    collection_elements::element_json.eq(&element_json),
                ))
                .execute(conn)?;
        }
    }
    Ok(())
}
