// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

use revtrail_audit::{AuditError, Change, ElementChange, WorkUnit};
use revtrail_domain::{
    AuditConfiguration, AuditStrategyKind, EntityDescriptor, EntityId, EntityName, EntityState,
    PropertyDescriptor, RevisionType, Value,
};
use time::OffsetDateTime;

use super::helpers::{Event, RecordingSession, StoredRow, context, context_with, foo, foo_state};
use crate::{AuditProcess, AuditSession, FlushMode, RevisionData, SessionKind};

fn add(name: &str) -> WorkUnit {
    WorkUnit::add(foo(), EntityId::Int(1), foo_state(name))
}

fn modify(old: &str, new: &str) -> WorkUnit {
    WorkUnit::modify(foo(), EntityId::Int(1), foo_state(new), Some(foo_state(old)))
}

fn delete(name: &str) -> WorkUnit {
    WorkUnit::delete(foo(), EntityId::Int(1), foo_state(name))
}

#[test]
fn test_add_then_delete_writes_nothing() {
    let mut session: RecordingSession = RecordingSession::stateful();
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(add("a")).unwrap();
    process.add_work_unit(delete("a")).unwrap();
    assert_eq!(process.pending_work_units(), 0);

    process.do_before_transaction_completion(&mut session).unwrap();

    assert!(session.events().is_empty());
    assert!(session.storage().lock().rows.is_empty());
}

#[test]
fn test_repeated_modifies_collapse_to_last_state() {
    let mut session: RecordingSession = RecordingSession::stateful();
    let mut process: AuditProcess = AuditProcess::new(context());

    let names: [&str; 5] = ["a", "b", "c", "d", "e"];
    for pair in names.windows(2) {
        process.add_work_unit(modify(pair[0], pair[1])).unwrap();
    }
    assert_eq!(process.pending_work_units(), 1);

    process.do_before_transaction_completion(&mut session).unwrap();

    let rows: Vec<StoredRow> = session.storage().lock().rows_for("Foo_AUD");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row.revision_type, RevisionType::Mod);
    assert_eq!(rows[0].row.data.get("name"), Some(&Value::from("e")));
}

#[test]
fn test_revision_persisted_once_for_stateful_session() {
    let mut session: RecordingSession = RecordingSession::stateful();
    let mut process: AuditProcess = AuditProcess::new(context());

    for _ in 0..4 {
        let id: Option<i64> = process.get_current_revision_data(&mut session, true).unwrap().id;
        assert_eq!(id, Some(1));
    }

    assert_eq!(session.storage().lock().revisions.len(), 1);
}

#[test]
fn test_revision_persisted_once_for_stateless_session() {
    let mut session: RecordingSession = RecordingSession::stateless();
    let mut process: AuditProcess = AuditProcess::new(context());

    for _ in 0..3 {
        process.get_current_revision_data(&mut session, true).unwrap();
    }

    assert_eq!(session.storage().lock().revisions.len(), 1);
}

#[test]
fn test_revision_not_persisted_without_request() {
    let mut session: RecordingSession = RecordingSession::stateful();
    let mut process: AuditProcess = AuditProcess::new(context());

    let first: Option<i64> = process.get_current_revision_data(&mut session, false).unwrap().id;
    assert_eq!(first, None);
    assert!(session.storage().lock().revisions.is_empty());

    let timestamp: OffsetDateTime = process
        .get_current_revision_data(&mut session, false)
        .unwrap()
        .timestamp;
    let persisted: &RevisionData = process.get_current_revision_data(&mut session, true).unwrap();
    assert_eq!(persisted.timestamp, timestamp);
    assert_eq!(persisted.id, Some(1));
}

#[test]
fn test_revision_saved_before_first_row() {
    let mut session: RecordingSession = RecordingSession::stateless();
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(add("a")).unwrap();
    process
        .add_work_unit(WorkUnit::add(foo(), EntityId::Int(2), foo_state("b")))
        .unwrap();
    process.do_before_transaction_completion(&mut session).unwrap();

    let events: Vec<Event> = session.events();
    assert_eq!(events[0], Event::SaveRevision(1));
    assert_eq!(
        events[1],
        Event::InsertRow {
            audit_entity: String::from("Foo_AUD"),
            revision: 1,
        }
    );
    assert_eq!(events.len(), 3);
}

#[test]
fn test_superseded_performed_unit_is_undone_first() {
    let mut session: RecordingSession = RecordingSession::stateless();
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(add("a")).unwrap();
    process.do_before_transaction_completion(&mut session).unwrap();
    assert_eq!(session.storage().lock().rows_for("Foo_AUD").len(), 1);

    process.add_work_unit(modify("a", "b")).unwrap();
    assert_eq!(process.pending_undo_units(), 1);
    assert_eq!(process.pending_work_units(), 1);

    process.do_before_transaction_completion(&mut session).unwrap();

    let events: Vec<Event> = session.events();
    let delete_at: usize = events
        .iter()
        .position(|event| matches!(event, Event::DeleteRow { .. }))
        .unwrap();
    let last_insert_at: usize = events
        .iter()
        .rposition(|event| matches!(event, Event::InsertRow { .. }))
        .unwrap();
    assert!(delete_at < last_insert_at);

    let rows: Vec<StoredRow> = session.storage().lock().rows_for("Foo_AUD");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row.revision_type, RevisionType::Add);
    assert_eq!(rows[0].row.data.get("name"), Some(&Value::from("b")));
    assert_eq!(session.storage().lock().revisions.len(), 1);
    assert_eq!(process.pending_undo_units(), 0);
}

#[test]
fn test_cancelling_performed_unit_removes_its_row() {
    let mut session: RecordingSession = RecordingSession::stateless();
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(add("a")).unwrap();
    process.do_before_transaction_completion(&mut session).unwrap();
    process.add_work_unit(delete("a")).unwrap();
    process.do_before_transaction_completion(&mut session).unwrap();

    assert!(session.storage().lock().rows_for("Foo_AUD").is_empty());
}

#[test]
fn test_rollback_only_transaction_writes_nothing() {
    let mut session: RecordingSession = RecordingSession::stateful();
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(add("a")).unwrap();
    session.mark_rollback_only();

    assert!(process.do_before_transaction_completion(&mut session).is_ok());
    assert!(session.events().is_empty());
}

#[test]
fn test_cached_state_is_read_once() {
    let mut process: AuditProcess = AuditProcess::new(context());
    let name: EntityName = EntityName::new("Foo");

    process
        .cache_entity_state(EntityId::Int(1), name.clone(), foo_state("a"))
        .unwrap();

    assert_eq!(
        process.get_cached_entity_state(&EntityId::Int(1), &name),
        Some(foo_state("a"))
    );
    assert_eq!(process.get_cached_entity_state(&EntityId::Int(1), &name), None);
}

#[test]
fn test_duplicate_cached_state_fails() {
    let mut process: AuditProcess = AuditProcess::new(context());
    let name: EntityName = EntityName::new("Foo");

    process
        .cache_entity_state(EntityId::Int(1), name.clone(), foo_state("a"))
        .unwrap();
    let result: Result<(), AuditError> =
        process.cache_entity_state(EntityId::Int(1), name, foo_state("b"));

    assert!(matches!(result, Err(AuditError::DuplicateEntityState { .. })));
}

#[test]
fn test_insert_then_update_yields_single_add_row() {
    let mut session: RecordingSession = RecordingSession::stateful();
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(add("a")).unwrap();
    process.add_work_unit(modify("a", "b")).unwrap();
    process.do_before_transaction_completion(&mut session).unwrap();

    let rows: Vec<StoredRow> = session.storage().lock().rows_for("Foo_AUD");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row.key.revision, 1);
    assert_eq!(rows[0].row.revision_type, RevisionType::Add);
    assert_eq!(rows[0].row.data.get("name"), Some(&Value::from("b")));
}

#[test]
fn test_empty_modify_is_ignored() {
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(modify("a", "a")).unwrap();

    assert_eq!(process.pending_work_units(), 0);
}

#[test]
fn test_free_standing_units_are_queued_without_reconciliation() {
    let mut process: AuditProcess = AuditProcess::new(context());

    for _ in 0..2 {
        process
            .add_work_unit(WorkUnit::free_standing(
                foo(),
                Change::Add {
                    state: foo_state("a"),
                },
            ))
            .unwrap();
    }

    assert_eq!(process.pending_work_units(), 2);
}

#[test]
fn test_collection_units_accumulate_elements() {
    let mut session: RecordingSession = RecordingSession::stateless();
    let mut process: AuditProcess = AuditProcess::new(context());

    process
        .add_work_unit(WorkUnit::collection(
            foo(),
            EntityId::Int(1),
            "tags",
            vec![ElementChange::added(Value::from("x"))],
        ))
        .unwrap();
    process
        .add_work_unit(WorkUnit::collection(
            foo(),
            EntityId::Int(1),
            "tags",
            vec![ElementChange::added(Value::from("y"))],
        ))
        .unwrap();
    assert_eq!(process.pending_work_units(), 1);

    process.do_before_transaction_completion(&mut session).unwrap();

    assert_eq!(session.storage().lock().rows_for("Foo_tags_AUD").len(), 2);
}

#[test]
fn test_incompatible_units_fail() {
    let mut process: AuditProcess = AuditProcess::new(context());
    let collection: WorkUnit = WorkUnit::collection(
        foo(),
        EntityId::Int(1),
        "tags",
        vec![ElementChange::added(Value::from("x"))],
    );
    // An entity unit that happens to share the collection's key.
    let middle: Arc<EntityDescriptor> = Arc::new(EntityDescriptor::new(
        "Foo_tags",
        vec![PropertyDescriptor::basic("element")],
    ));
    let clash: WorkUnit = WorkUnit::add(
        middle,
        EntityId::collection(EntityId::Int(1), "tags"),
        EntityState::new(vec![Value::from("x")]),
    );
    assert_eq!(collection.key(), clash.key());

    process.add_work_unit(collection).unwrap();
    let result: Result<(), AuditError> = process.add_work_unit(clash);

    assert!(matches!(
        result,
        Err(AuditError::IncompatibleWorkUnits { .. })
    ));
}

#[test]
fn test_stateless_open_session_executes_directly() {
    let mut session: RecordingSession = RecordingSession::stateless();
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(add("a")).unwrap();
    process.do_before_transaction_completion(&mut session).unwrap();

    let events: Vec<Event> = session.events();
    assert!(!events.iter().any(|e| matches!(e, Event::OpenTemporary(_))));
    assert!(!events.iter().any(|e| matches!(e, Event::Flush { .. })));
}

#[test]
fn test_stateless_closed_session_uses_temporary_session() {
    let mut session: RecordingSession = RecordingSession::stateless();
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(add("a")).unwrap();
    session.mark_closed();
    process.do_before_transaction_completion(&mut session).unwrap();

    let events: Vec<Event> = session.events();
    assert_eq!(events.first(), Some(&Event::OpenTemporary(SessionKind::Stateless)));
    assert_eq!(events.last(), Some(&Event::CloseTemporary));
    assert!(!events.iter().any(|e| matches!(e, Event::Flush { .. })));
    assert_eq!(session.storage().lock().rows_for("Foo_AUD").len(), 1);
}

#[test]
fn test_stateful_manual_flush_uses_flushed_temporary_session() {
    let mut session: RecordingSession = RecordingSession::new(SessionKind::Stateful, FlushMode::Manual);
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(add("a")).unwrap();
    process.do_before_transaction_completion(&mut session).unwrap();

    let events: Vec<Event> = session.events();
    assert_eq!(events.first(), Some(&Event::OpenTemporary(SessionKind::Stateful)));
    let flush_at: usize = events
        .iter()
        .position(|e| *e == Event::Flush { temporary: true })
        .unwrap();
    assert_eq!(flush_at + 1, events.len() - 1);
    assert_eq!(events.last(), Some(&Event::CloseTemporary));
    assert_eq!(session.storage().lock().rows_for("Foo_AUD").len(), 1);
}

#[test]
fn test_stateful_closed_session_uses_temporary_session() {
    let mut session: RecordingSession = RecordingSession::stateful();
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(add("a")).unwrap();
    session.mark_closed();
    process.do_before_transaction_completion(&mut session).unwrap();

    let events: Vec<Event> = session.events();
    assert!(events.contains(&Event::OpenTemporary(SessionKind::Stateful)));
    assert!(events.contains(&Event::Flush { temporary: true }));
    assert_eq!(events.last(), Some(&Event::CloseTemporary));
    assert_eq!(session.storage().lock().rows_for("Foo_AUD").len(), 1);
}

#[test]
fn test_stateful_open_session_is_flushed_explicitly() {
    let mut session: RecordingSession = RecordingSession::stateful();
    let mut process: AuditProcess = AuditProcess::new(context());

    process.add_work_unit(add("a")).unwrap();
    process.do_before_transaction_completion(&mut session).unwrap();

    let events: Vec<Event> = session.events();
    assert_eq!(events.last(), Some(&Event::Flush { temporary: false }));
    assert!(!events.iter().any(|e| matches!(e, Event::OpenTemporary(_))));
    assert_eq!(session.storage().lock().rows_for("Foo_AUD").len(), 1);
}

#[test]
fn test_temporary_session_closed_when_execution_fails() {
    let config: AuditConfiguration = AuditConfiguration {
        strategy: AuditStrategyKind::Validity,
        ..AuditConfiguration::default()
    };
    let mut session: RecordingSession = RecordingSession::new(SessionKind::Stateful, FlushMode::Manual);
    let mut process: AuditProcess = AuditProcess::new(context_with(config));

    // A modification with no earlier row cannot close a previous revision.
    process.add_work_unit(modify("a", "b")).unwrap();
    let result: Result<(), AuditError> = process.do_before_transaction_completion(&mut session);

    assert!(matches!(result, Err(AuditError::PreviousRevisionNotClosed { .. })));
    assert_eq!(session.events().last(), Some(&Event::CloseTemporary));
    assert!(session.storage().lock().rows.is_empty());
}

#[test]
fn test_no_work_is_a_no_op() {
    let mut session: RecordingSession = RecordingSession::stateful();
    let mut process: AuditProcess = AuditProcess::new(context());

    process.do_before_transaction_completion(&mut session).unwrap();

    assert!(session.events().is_empty());
    assert!(session.current_transaction().is_ok());
}
