// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use thiserror::Error;

/// Errors that can occur while building domain values or configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A configuration property carried a value that could not be parsed.
    #[error("Invalid value {value:?} for configuration property {key}")]
    InvalidConfiguration {
        /// The property key.
        key: String,
        /// The rejected value.
        value: String,
    },
    /// A configuration property is not recognized.
    #[error("Unknown configuration property: {0}")]
    UnknownConfigurationKey(String),
    /// An entity state does not line up with its descriptor.
    #[error("State for entity {entity_name} has {actual} values, expected {expected}")]
    StateShapeMismatch {
        /// The entity whose state was rejected.
        entity_name: String,
        /// Number of properties declared by the descriptor.
        expected: usize,
        /// Number of values in the state.
        actual: usize,
    },
    /// A property name is not declared by the entity descriptor.
    #[error("Entity {entity_name} has no property named {property}")]
    UnknownProperty {
        /// The entity being addressed.
        entity_name: String,
        /// The missing property.
        property: String,
    },
    /// A stored revision type discriminator is out of range.
    #[error("Invalid revision type discriminator: {0}")]
    InvalidRevisionType(i16),
    /// An entity name was empty.
    #[error("Entity names must not be empty")]
    EmptyEntityName,
}
