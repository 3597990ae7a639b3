// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! A short customer lifecycle written through both session kinds.
//!
//! 1. Customers 1 and 2 are created.
//! 2. Customer 1 changes email and gains two tags.
//! 3. An order for customer 1 is created and its total bulk-updated.
//! 4. Customer 2 is deleted.

use std::sync::Arc;

use revtrail::{RevisionData, RevisionListener};
use revtrail_audit::ElementChange;
use revtrail_domain::{EntityDescriptor, EntityId, EntityState, PropertyDescriptor, Value};
use revtrail_persistence::{Database, FlushMode, PersistenceError, SessionKind, SqliteSession};
use tracing::info;

/// Stamps every revision with the user that wrote it.
#[derive(Debug)]
pub struct UserListener {
    user: String,
}

impl UserListener {
    #[must_use]
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
        }
    }
}

impl RevisionListener for UserListener {
    fn new_revision(&self, revision: &mut RevisionData) {
        revision
            .properties
            .insert(String::from("user"), Value::from(self.user.as_str()));
    }
}

fn customer() -> Arc<EntityDescriptor> {
    Arc::new(EntityDescriptor::new(
        "Customer",
        vec![
            PropertyDescriptor::basic("name"),
            PropertyDescriptor::basic("email"),
            PropertyDescriptor::collection("tags"),
        ],
    ))
}

fn customer_state(name: &str, email: &str) -> EntityState {
    EntityState::new(vec![Value::from(name), Value::from(email), Value::Null])
}

fn order() -> Arc<EntityDescriptor> {
    Arc::new(EntityDescriptor::new(
        "Order",
        vec![
            PropertyDescriptor::basic("customer"),
            PropertyDescriptor::basic("total"),
        ],
    ))
}

/// Writes the lifecycle, one transaction per step.
pub fn run(db: &Database) -> Result<(), PersistenceError> {
    let customer: Arc<EntityDescriptor> = customer();
    let order: Arc<EntityDescriptor> = order();
    let ada: EntityId = EntityId::from(1_i64);
    let grace: EntityId = EntityId::from(2_i64);
    let order_id: EntityId = EntityId::from(100_i64);

    let mut session: SqliteSession = db.open_session(SessionKind::Stateful, FlushMode::Auto)?;
    session.begin()?;
    session.persist(&customer, &ada, customer_state("Ada", "ada@example.org"))?;
    session.persist(&customer, &grace, customer_state("Grace", "grace@example.org"))?;
    session.commit()?;

    session.begin()?;
    session.update(&customer, &ada, customer_state("Ada", "ada@example.com"))?;
    session.update_collection(
        &customer,
        &ada,
        "tags",
        vec![
            ElementChange::added(Value::from("vip")),
            ElementChange::added(Value::from("early")),
        ],
    )?;
    session.commit()?;

    let mut bulk: SqliteSession = db.open_session(SessionKind::Stateless, FlushMode::Auto)?;
    bulk.begin()?;
    bulk.persist(
        &order,
        &order_id,
        EntityState::new(vec![Value::Reference(ada.clone()), Value::from(40_i64)]),
    )?;
    bulk.execute_update(&order, &order_id, &[("total", Value::from(42_i64))])?;
    bulk.commit()?;

    bulk.begin()?;
    bulk.delete(&customer, &grace)?;
    bulk.commit()?;

    info!("Wrote demo history");
    Ok(())
}
