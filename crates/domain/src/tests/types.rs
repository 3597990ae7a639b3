// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::{DomainError, EntityId, EntityName, EntityState, RevisionType, Value};

#[test]
fn test_entity_name_parse_rejects_blank() {
    let result: Result<EntityName, DomainError> = "   ".parse();
    assert_eq!(result, Err(DomainError::EmptyEntityName));

    let name: EntityName = " Foo ".parse().unwrap();
    assert_eq!(name.as_str(), "Foo");
}

#[test]
fn test_collection_id_unwraps_to_owner() {
    let id: EntityId = EntityId::collection(EntityId::Int(1), "tags");

    assert!(id.is_collection());
    assert_eq!(id.owner_id(), &EntityId::Int(1));
    assert_eq!(id.to_string(), "1#tags");
}

#[test]
fn test_plain_id_is_its_own_owner() {
    let id: EntityId = EntityId::from("abc");

    assert!(!id.is_collection());
    assert_eq!(id.owner_id(), &id);
}

#[test]
fn test_parse_key_prefers_integers() {
    assert_eq!(EntityId::parse_key("42"), EntityId::Int(42));
    assert_eq!(EntityId::parse_key("x-42"), EntityId::Text(String::from("x-42")));
}

#[test]
fn test_entity_id_json_shape_is_stable() {
    let json: String = serde_json::to_string(&EntityId::Int(7)).unwrap();
    assert_eq!(json, r#"{"kind":"int","value":7}"#);

    let back: EntityId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, EntityId::Int(7));
}

#[test]
fn test_value_conversions() {
    assert_eq!(Value::from(3_i64), Value::Int(3));
    assert_eq!(Value::from("a"), Value::Text(String::from("a")));
    assert_eq!(Value::from(None::<i64>), Value::Null);
    assert_eq!(Value::from(Some(true)), Value::Bool(true));
    assert!(Value::default().is_null());
}

#[test]
fn test_entity_state_set_out_of_range_is_ignored() {
    let mut state: EntityState = EntityState::new(vec![Value::from("a")]);

    assert_eq!(state.set(0, Value::from("b")), Some(Value::from("a")));
    assert_eq!(state.set(5, Value::from("c")), None);
    assert_eq!(state.values(), &[Value::from("b")]);
}

#[test]
fn test_revision_type_discriminators() {
    assert_eq!(RevisionType::Add.as_i16(), 0);
    assert_eq!(RevisionType::Mod.as_i16(), 1);
    assert_eq!(RevisionType::Del.as_i16(), 2);
    assert_eq!(RevisionType::try_from(1), Ok(RevisionType::Mod));
    assert_eq!(
        RevisionType::try_from(3),
        Err(DomainError::InvalidRevisionType(3))
    );
    assert_eq!(RevisionType::Del.to_string(), "DEL");
}
