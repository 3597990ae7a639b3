// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Pending audit work and the rules for combining it.
//!
//! A [`WorkUnit`] describes one change to one audited entity (or one
//! collection of an entity) that will become audit rows when the owning
//! transaction completes. Two units for the same entity are combined by
//! [`reconcile`] so each entity yields at most one row per revision.

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

mod error;
mod reconcile;
mod row;
mod state_cache;
mod work_unit;

#[cfg(test)]
mod tests;

pub use error::AuditError;
pub use reconcile::{Reconciliation, reconcile};
pub use row::{AuditRow, AuditRowKey, generate_rows};
pub use state_cache::EntityStateCache;
pub use work_unit::{Change, ElementChange, WorkUnit, WorkUnitKey, middle_entity_name};
