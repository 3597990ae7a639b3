// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

use revtrail_audit::{AuditError, WorkUnit};
use revtrail_domain::EntityId;
use tracing::debug;

use crate::revision::{RevisionData, RevisionInfoGenerator};
use crate::session::AuditSession;

/// Reports each performed work unit to the revision generator.
#[derive(Debug, Clone)]
pub struct EntityChangeNotifier {
    generator: Arc<dyn RevisionInfoGenerator>,
}

impl EntityChangeNotifier {
    /// Creates a notifier delegating to `generator`.
    #[must_use]
    pub fn new(generator: Arc<dyn RevisionInfoGenerator>) -> Self {
        Self { generator }
    }

    /// Notifies the generator that `unit` changed its entity in `revision`.
    ///
    /// Collection units are reported as changes of their owning entity.
    /// Units without an identifier are not reported.
    ///
    /// # Errors
    ///
    /// Propagates generator failures.
    pub fn entity_changed(
        &self,
        session: &mut dyn AuditSession,
        revision: &mut RevisionData,
        unit: &WorkUnit,
    ) -> Result<(), AuditError> {
        let Some(id) = unit.entity_id() else {
            debug!(entity_name = %unit.entity_name(), "Skipping change notification without id");
            return Ok(());
        };
        let id: &EntityId = id.owner_id();
        let descriptor = unit.descriptor();

        self.generator.entity_changed(
            session,
            descriptor.type_name(),
            descriptor.name(),
            id,
            unit.revision_type(),
            revision,
        )
    }
}
