// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use revtrail_domain::{DomainError, EntityId, EntityName};
use thiserror::Error;

/// Errors raised by the audit subsystem.
///
/// Any of these surfacing from the before-completion hook fails the commit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    /// A before-image was cached twice for the same entity in one transaction.
    #[error("Entity state for {entity_name} with id {id} is already cached in this transaction")]
    DuplicateEntityState {
        /// The entity name.
        entity_name: EntityName,
        /// The entity identifier.
        id: EntityId,
    },
    /// Two work units for the same entity cannot be combined.
    #[error(
        "Cannot merge a {incoming} work unit into an existing {existing} work unit for {entity_name} with id {id}"
    )]
    IncompatibleWorkUnits {
        /// The entity name.
        entity_name: EntityName,
        /// The entity identifier.
        id: EntityId,
        /// Kind of the unit already queued.
        existing: &'static str,
        /// Kind of the unit being added.
        incoming: &'static str,
    },
    /// An audit row was about to be written before its revision was persisted.
    #[error("Revision data must be persisted before audit rows are written")]
    RevisionNotPersisted,
    /// The previous open audit row could not be closed (validity strategy).
    #[error("Cannot update previous revision for entity {audit_entity} and id {id}")]
    PreviousRevisionNotClosed {
        /// The audit entity name.
        audit_entity: EntityName,
        /// Display form of the original identifier.
        id: String,
    },
    /// The session has been closed.
    #[error("Session is closed")]
    SessionClosed,
    /// The session has no transaction in progress.
    #[error("No transaction is in progress")]
    NoActiveTransaction,
    /// The revision-info generator failed.
    #[error("Revision generation failed: {0}")]
    Revision(String),
    /// The underlying storage failed.
    #[error("Storage error: {0}")]
    Storage(String),
    /// A domain rule was violated.
    #[error(transparent)]
    Domain(#[from] DomainError),
}
