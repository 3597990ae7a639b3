// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! How audit rows are written and reversed.

use revtrail_audit::{AuditError, AuditRow, AuditRowKey, WorkUnit, generate_rows};
use revtrail_domain::{AuditConfiguration, AuditStrategyKind, RevisionType};
use tracing::debug;

use crate::cleaner::SessionCacheCleaner;
use crate::session::{AuditSession, SessionKind};

/// Writes the rows of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStrategy {
    /// One row per change.
    Default,
    /// One row per change; the previous row for the same id is closed by
    /// setting its end revision.
    Validity,
}

impl AuditStrategy {
    /// The strategy selected by configuration.
    #[must_use]
    pub const fn from_kind(kind: AuditStrategyKind) -> Self {
        match kind {
            AuditStrategyKind::Default => Self::Default,
            AuditStrategyKind::Validity => Self::Validity,
        }
    }

    /// Writes the rows of `unit` in `revision` and returns their keys.
    ///
    /// # Arguments
    ///
    /// * `session` - The session the rows are written through
    /// * `config` - Audit configuration
    /// * `unit` - The work unit to perform
    /// * `revision` - Identifier of the persisted revision
    ///
    /// # Errors
    ///
    /// Returns an error if a write fails, or if the validity strategy cannot
    /// close exactly one previous row for a modification or deletion.
    pub fn perform(
        self,
        session: &mut dyn AuditSession,
        config: &AuditConfiguration,
        unit: &WorkUnit,
        revision: i64,
    ) -> Result<Vec<AuditRowKey>, AuditError> {
        let rows: Vec<AuditRow> = generate_rows(unit, config, revision);
        let mut keys: Vec<AuditRowKey> = Vec::with_capacity(rows.len());

        for row in rows {
            if self == Self::Validity {
                close_previous(session, config, &row)?;
            }
            let key: AuditRowKey = row.key.clone();
            debug!(
                audit_entity = %key.audit_entity,
                revision,
                revision_type = %row.revision_type,
                "Writing audit row"
            );
            session.insert_audit_row(row)?;
            if session.kind() == SessionKind::Stateful {
                SessionCacheCleaner.schedule_audit_data_removal(session, key.clone())?;
            }
            keys.push(key);
        }
        Ok(keys)
    }

    /// Reverses a previously performed unit.
    ///
    /// # Errors
    ///
    /// Returns an error if a delete or update fails.
    pub fn undo(self, session: &mut dyn AuditSession, unit: &WorkUnit) -> Result<(), AuditError> {
        for key in unit.performed_rows() {
            session.delete_audit_row(key)?;
            if self == Self::Validity {
                let reopened: usize = session.reopen_previous_revision(key)?;
                debug!(audit_entity = %key.audit_entity, reopened, "Re-opened previous rows");
            }
        }
        Ok(())
    }
}

fn close_previous(
    session: &mut dyn AuditSession,
    config: &AuditConfiguration,
    row: &AuditRow,
) -> Result<(), AuditError> {
    let closed: usize = session.close_previous_revision(&row.key)?;
    let is_entity_row: bool = row.key.element.is_none();
    if is_entity_row
        && closed != 1
        && row.revision_type != RevisionType::Add
        && !config.allow_identifier_reuse
    {
        return Err(AuditError::PreviousRevisionNotClosed {
            audit_entity: row.key.audit_entity.clone(),
            id: row
                .key
                .original_id
                .as_ref()
                .map_or_else(String::new, ToString::to_string),
        });
    }
    Ok(())
}
