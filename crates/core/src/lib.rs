// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Transaction-scoped audit processing.
//!
//! Host persistence events become [`revtrail_audit::WorkUnit`]s queued on the
//! [`AuditProcess`] of the current transaction. Just before the transaction
//! completes, the process persists one revision and writes every pending
//! unit as audit rows through the host session. Rolled-back transactions
//! write nothing.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

mod cleaner;
mod context;
mod listener;
mod manager;
mod notifier;
mod process;
mod revision;
mod session;
mod strategy;

#[cfg(test)]
mod tests;

pub use cleaner::SessionCacheCleaner;
pub use context::AuditContext;
pub use listener::AuditEventListener;
pub use manager::AuditProcessManager;
pub use notifier::EntityChangeNotifier;
pub use process::AuditProcess;
pub use revision::{
    DefaultRevisionInfoGenerator, RevisionData, RevisionInfoGenerator, RevisionListener,
};
pub use session::{
    AfterCompletionCallback, AuditSession, BeforeCompletionCallback, FlushMode, ScopedSession,
    SessionKind, TransactionId, TransactionOutcome,
};
pub use strategy::AuditStrategy;
