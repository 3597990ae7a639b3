// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::BTreeSet;

use crate::error::DomainError;
use crate::types::{EntityName, EntityState};

/// Describes one persistent property of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    /// The property name.
    pub name: String,
    /// Whether changes to this property are audited.
    pub audited: bool,
    /// Whether the property is a collection (its changes are tracked by
    /// collection work units rather than the owner's state).
    pub collection: bool,
}

impl PropertyDescriptor {
    /// An audited basic property.
    #[must_use]
    pub fn basic(name: &str) -> Self {
        Self {
            name: name.to_string(),
            audited: true,
            collection: false,
        }
    }

    /// An audited collection property.
    #[must_use]
    pub fn collection(name: &str) -> Self {
        Self {
            name: name.to_string(),
            audited: true,
            collection: true,
        }
    }

    /// A property excluded from auditing.
    #[must_use]
    pub fn not_audited(name: &str) -> Self {
        Self {
            name: name.to_string(),
            audited: false,
            collection: false,
        }
    }
}

/// Mapping metadata for an entity, as seen by the audit engine.
///
/// `type_name` is the concrete runtime type reported to revision listeners;
/// several entity names may share one type in polymorphic mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    name: EntityName,
    type_name: String,
    audited: bool,
    properties: Vec<PropertyDescriptor>,
}

impl EntityDescriptor {
    /// Creates an audited entity descriptor whose type name equals its entity name.
    #[must_use]
    pub fn new(name: &str, properties: Vec<PropertyDescriptor>) -> Self {
        Self {
            name: EntityName::new(name),
            type_name: name.to_string(),
            audited: true,
            properties,
        }
    }

    /// Overrides the runtime type name.
    #[must_use]
    pub fn with_type_name(mut self, type_name: &str) -> Self {
        self.type_name = type_name.to_string();
        self
    }

    /// Marks the whole entity as excluded from auditing.
    #[must_use]
    pub const fn not_audited(mut self) -> Self {
        self.audited = false;
        self
    }

    /// The entity name.
    #[must_use]
    pub const fn name(&self) -> &EntityName {
        &self.name
    }

    /// The concrete runtime type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether the entity is audited.
    #[must_use]
    pub const fn is_audited(&self) -> bool {
        self.audited
    }

    /// The declared properties, in state order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Position of the property called `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity declares no such property.
    pub fn property_index(&self, name: &str) -> Result<usize, DomainError> {
        self.properties
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| DomainError::UnknownProperty {
                entity_name: self.name.to_string(),
                property: name.to_string(),
            })
    }

    /// Audited, non-collection properties with their positions.
    pub fn audited_properties(&self) -> impl Iterator<Item = (usize, &PropertyDescriptor)> {
        self.properties
            .iter()
            .enumerate()
            .filter(|(_, p)| p.audited && !p.collection)
    }

    /// Checks that `state` has one value per declared property.
    ///
    /// # Errors
    ///
    /// Returns an error if the lengths differ.
    pub fn validate_state(&self, state: &EntityState) -> Result<(), DomainError> {
        if state.len() != self.properties.len() {
            return Err(DomainError::StateShapeMismatch {
                entity_name: self.name.to_string(),
                expected: self.properties.len(),
                actual: state.len(),
            });
        }
        Ok(())
    }

    /// Names of audited properties whose values differ between `old` and `new`.
    ///
    /// Without a previous state every audited property counts as changed.
    #[must_use]
    pub fn changed_properties(
        &self,
        old: Option<&EntityState>,
        new: &EntityState,
    ) -> BTreeSet<String> {
        self.audited_properties()
            .filter(|(index, _)| old.is_none_or(|old| old.get(*index) != new.get(*index)))
            .map(|(_, p)| p.name.clone())
            .collect()
    }
}
