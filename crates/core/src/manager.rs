// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! One audit process per in-flight transaction.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use revtrail_audit::AuditError;
use tracing::debug;

use crate::context::AuditContext;
use crate::process::AuditProcess;
use crate::session::{AuditSession, TransactionId, TransactionOutcome};

type ProcessRegistry = DashMap<TransactionId, Arc<Mutex<AuditProcess>>>;

/// Creates audit processes on first use and removes them when their
/// transaction completes.
///
/// Lookups and inserts go through the concurrent map; the process itself is
/// only driven by the thread that owns the transaction.
#[derive(Debug, Clone)]
pub struct AuditProcessManager {
    context: Arc<AuditContext>,
    processes: Arc<ProcessRegistry>,
}

impl AuditProcessManager {
    /// Creates a manager with an empty registry.
    #[must_use]
    pub fn new(context: Arc<AuditContext>) -> Self {
        Self {
            context,
            processes: Arc::new(DashMap::new()),
        }
    }

    /// The shared audit context.
    #[must_use]
    pub const fn context(&self) -> &Arc<AuditContext> {
        &self.context
    }

    /// Returns the process of the session's current transaction, creating it
    /// and registering its completion callbacks on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the session has no transaction or rejects the
    /// callbacks.
    pub fn get(
        &self,
        session: &mut dyn AuditSession,
    ) -> Result<Arc<Mutex<AuditProcess>>, AuditError> {
        let transaction: TransactionId = session.current_transaction()?;

        let process: Arc<Mutex<AuditProcess>> = match self.processes.entry(transaction) {
            Entry::Occupied(entry) => return Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let process: Arc<Mutex<AuditProcess>> =
                    Arc::new(Mutex::new(AuditProcess::new(Arc::clone(&self.context))));
                entry.insert(Arc::clone(&process));
                process
            }
        };
        debug!(%transaction, "Created audit process");

        if let Err(err) = self.register_callbacks(session, transaction) {
            self.processes.remove(&transaction);
            return Err(err);
        }
        Ok(process)
    }

    fn register_callbacks(
        &self,
        session: &mut dyn AuditSession,
        transaction: TransactionId,
    ) -> Result<(), AuditError> {
        let registry: Arc<ProcessRegistry> = Arc::clone(&self.processes);
        session.register_before_completion(Box::new(move |session: &mut dyn AuditSession| {
            let process: Option<Arc<Mutex<AuditProcess>>> = registry
                .get(&transaction)
                .map(|entry| Arc::clone(entry.value()));
            match process {
                Some(process) => process.lock().do_before_transaction_completion(session),
                None => Ok(()),
            }
        }))?;

        let registry: Arc<ProcessRegistry> = Arc::clone(&self.processes);
        session.register_after_completion(Box::new(
            move |_session: &mut dyn AuditSession, outcome: TransactionOutcome| {
                registry.remove(&transaction);
                debug!(%transaction, ?outcome, "Removed audit process");
            },
        ))
    }

    /// Number of transactions with a live audit process.
    #[must_use]
    pub fn active_processes(&self) -> usize {
        self.processes.len()
    }
}
