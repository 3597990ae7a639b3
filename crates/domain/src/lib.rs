// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Domain types shared by every revtrail crate.
//!
//! Entities are identified by an [`EntityName`] and an [`EntityId`]; their
//! persistent state is captured as an ordered [`EntityState`] whose positions
//! line up with the properties of the entity's [`EntityDescriptor`].

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

mod config;
mod descriptor;
mod error;
mod types;

#[cfg(test)]
mod tests;

pub use config::{AuditConfiguration, AuditStrategyKind, PROPERTY_PREFIX};
pub use descriptor::{EntityDescriptor, PropertyDescriptor};
pub use error::DomainError;
pub use types::{EntityId, EntityName, EntityState, RevisionType, Value};
