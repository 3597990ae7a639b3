// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashMap;

use revtrail_domain::{EntityId, EntityName, EntityState};
use tracing::debug;

use crate::error::AuditError;

/// Before-images of entities captured earlier in the transaction.
///
/// Each snapshot can be read once; reading removes it.
#[derive(Debug, Default)]
pub struct EntityStateCache {
    states: HashMap<(EntityName, EntityId), EntityState>,
}

impl EntityStateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the snapshot of `entity_name` / `id`.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::DuplicateEntityState` if a snapshot for the same
    /// entity is already present.
    pub fn cache(
        &mut self,
        id: EntityId,
        entity_name: EntityName,
        snapshot: EntityState,
    ) -> Result<(), AuditError> {
        let key: (EntityName, EntityId) = (entity_name, id);
        if self.states.contains_key(&key) {
            return Err(AuditError::DuplicateEntityState {
                entity_name: key.0,
                id: key.1,
            });
        }
        debug!(entity_name = %key.0, id = %key.1, "Cached entity state");
        self.states.insert(key, snapshot);
        Ok(())
    }

    /// Removes and returns the snapshot, if one was cached.
    pub fn take(&mut self, id: &EntityId, entity_name: &EntityName) -> Option<EntityState> {
        self.states.remove(&(entity_name.clone(), id.clone()))
    }

    /// Number of snapshots not yet read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no snapshots are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
