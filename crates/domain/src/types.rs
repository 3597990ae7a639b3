// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The logical name of a mapped entity (e.g. `"Foo"`).
///
/// Audit entities derive their names from this one by applying the
/// configured prefix and suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityName(String);

impl EntityName {
    /// Creates a new entity name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for EntityName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed: &str = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyEntityName);
        }
        Ok(Self::new(trimmed))
    }
}

impl std::fmt::Display for EntityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an entity instance.
///
/// `Collection` is a synthetic identifier used by collection work units: it
/// names one collection role of one owning entity. Change notifications
/// report it as a change of the owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EntityId {
    /// Numeric identifier.
    Int(i64),
    /// Textual identifier.
    Text(String),
    /// Synthetic identifier of a collection role on an owning entity.
    Collection {
        /// Identifier of the owning entity.
        owner: Box<EntityId>,
        /// The collection property on the owner.
        role: String,
    },
}

impl EntityId {
    /// Builds the synthetic identifier for a collection role of `owner`.
    #[must_use]
    pub fn collection(owner: Self, role: impl Into<String>) -> Self {
        Self::Collection {
            owner: Box::new(owner),
            role: role.into(),
        }
    }

    /// Returns `true` for synthetic collection identifiers.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::Collection { .. })
    }

    /// Returns the identifier of the entity that owns this one.
    ///
    /// For plain identifiers this is the identifier itself.
    #[must_use]
    pub fn owner_id(&self) -> &Self {
        match self {
            Self::Collection { owner, .. } => owner.owner_id(),
            _ => self,
        }
    }

    /// Parses a command-line style identifier: integers become `Int`,
    /// everything else `Text`.
    #[must_use]
    pub fn parse_key(raw: &str) -> Self {
        raw.trim()
            .parse::<i64>()
            .map_or_else(|_| Self::Text(raw.trim().to_string()), Self::Int)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
            Self::Collection { owner, role } => write!(f, "{owner}#{role}"),
        }
    }
}

/// A single property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Text value.
    Text(String),
    /// Reference to another entity by identifier.
    Reference(EntityId),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<EntityId> for Value {
    fn from(value: EntityId) -> Self {
        Self::Reference(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Reference(id) => write!(f, "ref({id})"),
        }
    }
}

/// Ordered snapshot of an entity's property values.
///
/// Positions correspond to the properties of the entity's descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct EntityState(Vec<Value>);

impl EntityState {
    /// Creates a state from its values.
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Creates a state with `len` null values.
    #[must_use]
    pub fn nulls(len: usize) -> Self {
        Self(vec![Value::Null; len])
    }

    /// Returns the values in property order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Returns the value at `index`, if present.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Replaces the value at `index`, returning the previous value.
    ///
    /// Returns `None` and leaves the state untouched when `index` is out of range.
    pub fn set(&mut self, index: usize, value: Value) -> Option<Value> {
        self.0
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, value))
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the state has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for EntityState {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for EntityState {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The kind of change recorded by an audit row.
///
/// The discriminators are stored in the revision-type column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevisionType {
    /// The entity was created.
    Add,
    /// The entity was modified.
    Mod,
    /// The entity was deleted.
    Del,
}

impl RevisionType {
    /// Returns the stored discriminator.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::Add => 0,
            Self::Mod => 1,
            Self::Del => 2,
        }
    }

    /// Returns the display label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Mod => "MOD",
            Self::Del => "DEL",
        }
    }
}

impl TryFrom<i16> for RevisionType {
    type Error = DomainError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Add),
            1 => Ok(Self::Mod),
            2 => Ok(Self::Del),
            other => Err(DomainError::InvalidRevisionType(other)),
        }
    }
}

impl std::fmt::Display for RevisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
