// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::unwrap_used, clippy::expect_used)]


use std::sync::Arc;

use revtrail::AuditContext;
use revtrail_domain::{
    AuditConfiguration, EntityDescriptor, EntityId, EntityName, EntityState, PropertyDescriptor,
    Value,
};

use crate::{Database, FlushMode, SessionKind, SqliteSession, TransactionOutcome};

pub fn foo() -> Arc<EntityDescriptor> {
    Arc::new(EntityDescriptor::new(
        "Foo",
        vec![
            PropertyDescriptor::basic("name"),
            PropertyDescriptor::collection("tags"),
        ],
    ))
}

pub fn foo_state(name: &str) -> EntityState {
    EntityState::new(vec![Value::from(name), Value::Null])
}

pub fn bar() -> Arc<EntityDescriptor> {
    Arc::new(EntityDescriptor::new(
        "Bar",
        vec![
            PropertyDescriptor::basic("title"),
            PropertyDescriptor::basic("count"),
        ],
    ))
}

pub fn bar_state(title: &str, count: i64) -> EntityState {
    EntityState::new(vec![Value::from(title), Value::from(count)])
}

pub fn name(entity: &str) -> EntityName {
    EntityName::new(entity)
}

pub fn database() -> Database {
    database_with(AuditConfiguration::default())
}

pub fn database_with(config: AuditConfiguration) -> Database {
    Database::new_in_memory(Arc::new(AuditContext::with_default_generator(config)))
        .expect("Failed to create in-memory database")
}

pub fn stateful(db: &Database) -> SqliteSession {
    db.open_session(SessionKind::Stateful, FlushMode::Auto)
        .expect("Failed to open session")
}

pub fn stateless(db: &Database) -> SqliteSession {
    db.open_session(SessionKind::Stateless, FlushMode::Auto)
        .expect("Failed to open session")
}

/// Inserts an entity in its own committed transaction.
pub fn seed(db: &Database, descriptor: &Arc<EntityDescriptor>, id: i64, state: EntityState) {
    let mut session: SqliteSession = stateless(db);
    session.begin().unwrap();
    session
        .persist(descriptor, &EntityId::from(id), state)
        .unwrap();
    assert_eq!(session.commit().unwrap(), TransactionOutcome::Committed);
}
