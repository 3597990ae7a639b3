// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::types::EntityName;

/// Prefix shared by all audit configuration property keys.
pub const PROPERTY_PREFIX: &str = "revtrail.";

/// How audit rows are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditStrategyKind {
    /// One row per change; revision ranges are derived at query time.
    #[default]
    Default,
    /// One row per change plus an end-revision column closed on the next change.
    Validity,
}

/// Audit engine settings.
///
/// Every field has a default, so a partial JSON document or an empty
/// property set yields a usable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfiguration {
    /// Prepended to entity names to form audit entity names.
    pub audit_table_prefix: String,
    /// Appended to entity names to form audit entity names.
    pub audit_table_suffix: String,
    /// Name of the revision column.
    pub revision_field_name: String,
    /// Name of the revision-type column.
    pub revision_type_field_name: String,
    /// Name of the end-revision column (validity strategy only).
    pub revision_end_field_name: String,
    /// Appended to property names to form modified-flag columns.
    pub modified_flag_suffix: String,
    /// Which audit strategy writes rows.
    pub strategy: AuditStrategyKind,
    /// Store the last known state in DEL rows instead of nulls.
    pub store_data_at_delete: bool,
    /// Audit the owning entity when one of its collections changes.
    pub revision_on_collection_change: bool,
    /// Write a modified flag per audited property.
    pub global_with_modified_flag: bool,
    /// Record which entity names changed in each revision.
    pub track_entities_changed_in_revision: bool,
    /// Tolerate identifiers reused after deletion (validity strategy).
    pub allow_identifier_reuse: bool,
}

impl Default for AuditConfiguration {
    fn default() -> Self {
        Self {
            audit_table_prefix: String::new(),
            audit_table_suffix: String::from("_AUD"),
            revision_field_name: String::from("REV"),
            revision_type_field_name: String::from("REVTYPE"),
            revision_end_field_name: String::from("REVEND"),
            modified_flag_suffix: String::from("_MOD"),
            strategy: AuditStrategyKind::Default,
            store_data_at_delete: false,
            revision_on_collection_change: true,
            global_with_modified_flag: false,
            track_entities_changed_in_revision: false,
            allow_identifier_reuse: false,
        }
    }
}

impl AuditConfiguration {
    /// Builds a configuration from `revtrail.*` properties.
    ///
    /// Keys without the prefix are ignored so the properties can share a
    /// map with unrelated settings.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown `revtrail.*` keys and unparsable values.
    pub fn from_properties<I, K, V>(properties: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config: Self = Self::default();
        for (key, value) in properties {
            let key: &str = key.as_ref();
            let Some(name) = key.strip_prefix(PROPERTY_PREFIX) else {
                continue;
            };
            let value: &str = value.as_ref().trim();
            match name {
                "audit_table_prefix" => config.audit_table_prefix = value.to_string(),
                "audit_table_suffix" => config.audit_table_suffix = value.to_string(),
                "revision_field_name" => config.revision_field_name = value.to_string(),
                "revision_type_field_name" => {
                    config.revision_type_field_name = value.to_string();
                }
                "revision_end_field_name" => config.revision_end_field_name = value.to_string(),
                "modified_flag_suffix" => config.modified_flag_suffix = value.to_string(),
                "audit_strategy" => config.strategy = parse_strategy(key, value)?,
                "store_data_at_delete" => config.store_data_at_delete = parse_bool(key, value)?,
                "revision_on_collection_change" => {
                    config.revision_on_collection_change = parse_bool(key, value)?;
                }
                "global_with_modified_flag" => {
                    config.global_with_modified_flag = parse_bool(key, value)?;
                }
                "track_entities_changed_in_revision" => {
                    config.track_entities_changed_in_revision = parse_bool(key, value)?;
                }
                "allow_identifier_reuse" => {
                    config.allow_identifier_reuse = parse_bool(key, value)?;
                }
                _ => return Err(DomainError::UnknownConfigurationKey(key.to_string())),
            }
        }
        Ok(config)
    }

    /// Name of the audit entity that records history for `entity_name`.
    #[must_use]
    pub fn audit_entity_name(&self, entity_name: &EntityName) -> EntityName {
        EntityName::new(format!(
            "{}{}{}",
            self.audit_table_prefix, entity_name, self.audit_table_suffix
        ))
    }

    /// Name of the modified-flag column for `property`.
    #[must_use]
    pub fn modified_flag_name(&self, property: &str) -> String {
        format!("{property}{}", self.modified_flag_suffix)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, DomainError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(DomainError::InvalidConfiguration {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_strategy(key: &str, value: &str) -> Result<AuditStrategyKind, DomainError> {
    match value.to_ascii_lowercase().as_str() {
        "default" => Ok(AuditStrategyKind::Default),
        "validity" => Ok(AuditStrategyKind::Validity),
        _ => Err(DomainError::InvalidConfiguration {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
