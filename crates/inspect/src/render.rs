// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! One-line text renderings of revisions and audit rows.

use std::collections::BTreeMap;

use revtrail::RevisionData;
use revtrail_domain::Value;
use revtrail_persistence::AuditRecord;

/// `rev 3 at <timestamp> user="alice" changed: Customer, Order`
#[must_use]
pub fn revision(revision: &RevisionData) -> String {
    let mut parts: Vec<String> = vec![
        format!(
            "rev {}",
            revision
                .id
                .map_or_else(|| String::from("?"), |id| id.to_string())
        ),
        format!("at {}", revision.timestamp),
    ];
    if !revision.properties.is_empty() {
        parts.push(values(&revision.properties));
    }
    if !revision.changed_entity_names.is_empty() {
        let names: Vec<&str> = revision
            .changed_entity_names
            .iter()
            .map(revtrail_domain::EntityName::as_str)
            .collect();
        parts.push(format!("changed: {}", names.join(", ")));
    }
    parts.join(" ")
}

/// `rev 2 MOD Customer_AUD 1 email="ada@example.org" name="Ada"`
///
/// Collection rows show their element; validity rows show where they end.
#[must_use]
pub fn record(record: &AuditRecord) -> String {
    let mut parts: Vec<String> = vec![
        format!("rev {}", record.key.revision),
        record.revision_type.to_string(),
        record.key.audit_entity.to_string(),
    ];
    if let Some(id) = &record.key.original_id {
        parts.push(id.to_string());
    }
    if let Some(element) = &record.key.element {
        parts.push(format!("element={element}"));
    }
    if !record.data.is_empty() {
        parts.push(values(&record.data));
    }
    if let Some(end) = record.revision_end {
        parts.push(format!("(until rev {end})"));
    }
    parts.join(" ")
}

fn values(values: &BTreeMap<String, Value>) -> String {
    values
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<String>>()
        .join(" ")
}
