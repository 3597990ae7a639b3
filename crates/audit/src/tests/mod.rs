// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod row;

use std::sync::Arc;

use revtrail_domain::{EntityDescriptor, EntityState, PropertyDescriptor, Value};

/// `Book(title, pages, tags)` where `tags` is an audited collection.
pub fn book() -> Arc<EntityDescriptor> {
    Arc::new(EntityDescriptor::new(
        "Book",
        vec![
            PropertyDescriptor::basic("title"),
            PropertyDescriptor::basic("pages"),
            PropertyDescriptor::collection("tags"),
        ],
    ))
}

pub fn book_state(title: &str, pages: i64) -> EntityState {
    EntityState::new(vec![Value::from(title), Value::from(pages), Value::Null])
}
