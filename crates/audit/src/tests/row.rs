// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use revtrail_domain::{AuditConfiguration, EntityId, EntityName, RevisionType, Value};

use super::{book, book_state};
use crate::{AuditRow, ElementChange, WorkUnit, generate_rows};

#[test]
fn test_add_row_carries_state() {
    let unit: WorkUnit = WorkUnit::add(book(), EntityId::Int(1), book_state("Dune", 412));

    let rows: Vec<AuditRow> = generate_rows(&unit, &AuditConfiguration::default(), 5);

    assert_eq!(rows.len(), 1);
    let row: &AuditRow = &rows[0];
    assert_eq!(row.key.audit_entity, EntityName::new("Book_AUD"));
    assert_eq!(row.key.original_id, Some(EntityId::Int(1)));
    assert_eq!(row.key.revision, 5);
    assert_eq!(row.revision_type, RevisionType::Add);
    assert_eq!(row.data.get("title"), Some(&Value::from("Dune")));
    assert_eq!(row.data.get("pages"), Some(&Value::from(412_i64)));
    assert!(!row.data.contains_key("tags"));
}

#[test]
fn test_delete_row_is_null_unless_storing_data() {
    let unit: WorkUnit = WorkUnit::delete(book(), EntityId::Int(1), book_state("Dune", 412));

    let rows: Vec<AuditRow> = generate_rows(&unit, &AuditConfiguration::default(), 2);
    assert_eq!(rows[0].data.get("title"), Some(&Value::Null));

    let config: AuditConfiguration = AuditConfiguration {
        store_data_at_delete: true,
        ..AuditConfiguration::default()
    };
    let rows: Vec<AuditRow> = generate_rows(&unit, &config, 2);
    assert_eq!(rows[0].data.get("title"), Some(&Value::from("Dune")));
    assert_eq!(rows[0].revision_type, RevisionType::Del);
}

#[test]
fn test_modified_flags() {
    let config: AuditConfiguration = AuditConfiguration {
        global_with_modified_flag: true,
        ..AuditConfiguration::default()
    };

    let add: WorkUnit = WorkUnit::add(book(), EntityId::Int(1), book_state("Dune", 412));
    let row: AuditRow = generate_rows(&add, &config, 1).remove(0);
    assert_eq!(row.data.get("title_MOD"), Some(&Value::Bool(true)));
    assert_eq!(row.data.get("tags_MOD"), Some(&Value::Bool(true)));

    let modify: WorkUnit = WorkUnit::modify(
        book(),
        EntityId::Int(1),
        book_state("Dune", 500),
        Some(book_state("Dune", 412)),
    );
    let row: AuditRow = generate_rows(&modify, &config, 2).remove(0);
    assert_eq!(row.data.get("title_MOD"), Some(&Value::Bool(false)));
    assert_eq!(row.data.get("pages_MOD"), Some(&Value::Bool(true)));

    let owner: WorkUnit =
        WorkUnit::owner_collection_change(book(), EntityId::Int(1), book_state("Dune", 500), "tags");
    let row: AuditRow = generate_rows(&owner, &config, 3).remove(0);
    assert_eq!(row.data.get("tags_MOD"), Some(&Value::Bool(true)));
    assert_eq!(row.data.get("pages_MOD"), Some(&Value::Bool(false)));

    let delete: WorkUnit = WorkUnit::delete(book(), EntityId::Int(1), book_state("Dune", 500));
    let row: AuditRow = generate_rows(&delete, &config, 4).remove(0);
    assert_eq!(row.data.get("title_MOD"), Some(&Value::Bool(false)));
}

#[test]
fn test_collection_rows_per_element_keyed_by_owner() {
    let unit: WorkUnit = WorkUnit::collection(
        book(),
        EntityId::Int(7),
        "tags",
        vec![
            ElementChange::added(Value::from("classic")),
            ElementChange::removed(Value::from("draft")),
        ],
    );

    let rows: Vec<AuditRow> = generate_rows(&unit, &AuditConfiguration::default(), 9);

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].key.audit_entity, EntityName::new("Book_tags_AUD"));
    assert_eq!(rows[0].key.original_id, Some(EntityId::Int(7)));
    assert_eq!(rows[0].key.element, Some(Value::from("classic")));
    assert_eq!(rows[0].revision_type, RevisionType::Add);
    assert_eq!(rows[1].revision_type, RevisionType::Del);
}

#[test]
fn test_audit_table_prefix_and_suffix() {
    let config: AuditConfiguration = AuditConfiguration {
        audit_table_prefix: String::from("H_"),
        audit_table_suffix: String::from("_LOG"),
        ..AuditConfiguration::default()
    };
    let unit: WorkUnit = WorkUnit::add(book(), EntityId::Int(1), book_state("Dune", 412));

    let rows: Vec<AuditRow> = generate_rows(&unit, &config, 1);

    assert_eq!(rows[0].key.audit_entity, EntityName::new("H_Book_LOG"));
}
