// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use revtrail_audit::{AuditError, AuditRowKey};
use tracing::debug;

use crate::session::{AuditSession, TransactionOutcome};

/// Evicts written audit rows from a session's first-level cache once the
/// transaction completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionCacheCleaner;

impl SessionCacheCleaner {
    /// Schedules eviction of the row identified by `key`.
    ///
    /// Eviction runs after completion on both commit and rollback, only if the
    /// session is still open. Eviction failures are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the callback cannot be registered.
    pub fn schedule_audit_data_removal(
        self,
        session: &mut dyn AuditSession,
        key: AuditRowKey,
    ) -> Result<(), AuditError> {
        session.register_after_completion(Box::new(
            move |session: &mut dyn AuditSession, outcome: TransactionOutcome| {
                if session.is_closed() {
                    return;
                }
                if let Err(err) = session.evict_audit_data(&key) {
                    debug!(
                        audit_entity = %key.audit_entity,
                        ?outcome,
                        error = %err,
                        "Ignoring audit cache eviction failure"
                    );
                }
            },
        ))
    }
}
