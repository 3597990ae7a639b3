// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Revision metadata and the generator that creates and persists it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use revtrail_audit::AuditError;
use revtrail_domain::{EntityId, EntityName, RevisionType, Value};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::session::AuditSession;

/// One revision: the marker every audit row of a transaction points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionData {
    /// Assigned by storage when the revision is persisted.
    pub id: Option<i64>,
    /// When the revision was generated.
    pub timestamp: OffsetDateTime,
    /// Custom properties attached by a [`RevisionListener`].
    pub properties: BTreeMap<String, Value>,
    /// Entity names already recorded as changed in this revision.
    pub changed_entity_names: BTreeSet<EntityName>,
}

impl RevisionData {
    /// A revision stamped with `timestamp` and no properties.
    #[must_use]
    pub const fn new(timestamp: OffsetDateTime) -> Self {
        Self {
            id: None,
            timestamp,
            properties: BTreeMap::new(),
            changed_entity_names: BTreeSet::new(),
        }
    }

    /// Whether storage has assigned an identifier.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// The identifier, which exists only after persistence.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::RevisionNotPersisted` if the revision has not
    /// been saved yet.
    pub fn require_id(&self) -> Result<i64, AuditError> {
        self.id.ok_or(AuditError::RevisionNotPersisted)
    }
}

/// Creates revision markers, persists them, and records entity changes.
pub trait RevisionInfoGenerator: std::fmt::Debug + Send + Sync {
    /// Creates a new, unsaved revision.
    fn generate(&self) -> RevisionData;

    /// Persists `revision` through `session`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    fn save_revision_data(
        &self,
        session: &mut dyn AuditSession,
        revision: &mut RevisionData,
    ) -> Result<(), AuditError>;

    /// Records one entity change against `revision`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    fn entity_changed(
        &self,
        session: &mut dyn AuditSession,
        type_name: &str,
        entity_name: &EntityName,
        id: &EntityId,
        revision_type: RevisionType,
        revision: &mut RevisionData,
    ) -> Result<(), AuditError>;
}

/// Application hook into revision creation.
pub trait RevisionListener: Send + Sync {
    /// Called once per revision before it is persisted; may set properties.
    fn new_revision(&self, revision: &mut RevisionData);

    /// Called for every entity change recorded in the revision.
    fn entity_changed(
        &self,
        type_name: &str,
        entity_name: &EntityName,
        id: &EntityId,
        revision_type: RevisionType,
        revision: &RevisionData,
    ) {
        let _ = (type_name, entity_name, id, revision_type, revision);
    }
}

/// Timestamps revisions with the current UTC time.
#[derive(Clone, Default)]
pub struct DefaultRevisionInfoGenerator {
    listener: Option<Arc<dyn RevisionListener>>,
    track_entities_changed: bool,
}

impl std::fmt::Debug for DefaultRevisionInfoGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultRevisionInfoGenerator")
            .field("has_listener", &self.listener.is_some())
            .field("track_entities_changed", &self.track_entities_changed)
            .finish()
    }
}

impl DefaultRevisionInfoGenerator {
    /// A generator without a listener.
    ///
    /// # Arguments
    ///
    /// * `track_entities_changed` - Record changed entity names per revision
    #[must_use]
    pub const fn new(track_entities_changed: bool) -> Self {
        Self {
            listener: None,
            track_entities_changed,
        }
    }

    /// Attaches a listener.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn RevisionListener>) -> Self {
        self.listener = Some(listener);
        self
    }
}

impl RevisionInfoGenerator for DefaultRevisionInfoGenerator {
    fn generate(&self) -> RevisionData {
        let mut revision: RevisionData = RevisionData::new(OffsetDateTime::now_utc());
        if let Some(listener) = &self.listener {
            listener.new_revision(&mut revision);
        }
        revision
    }

    fn save_revision_data(
        &self,
        session: &mut dyn AuditSession,
        revision: &mut RevisionData,
    ) -> Result<(), AuditError> {
        session.save_revision(revision)?;
        info!(revision = ?revision.id, "Persisted revision");
        Ok(())
    }

    fn entity_changed(
        &self,
        session: &mut dyn AuditSession,
        type_name: &str,
        entity_name: &EntityName,
        id: &EntityId,
        revision_type: RevisionType,
        revision: &mut RevisionData,
    ) -> Result<(), AuditError> {
        if let Some(listener) = &self.listener {
            listener.entity_changed(type_name, entity_name, id, revision_type, revision);
        }
        if self.track_entities_changed && revision.changed_entity_names.insert(entity_name.clone())
        {
            let revision_id: i64 = revision.require_id()?;
            session.record_changed_entity(revision_id, entity_name)?;
            debug!(revision = revision_id, %entity_name, "Recorded changed entity name");
        }
        Ok(())
    }
}
