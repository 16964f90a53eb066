//! Participant presence reconciliation.
//!
//! The upstream participant-listing API has returned several shapes over
//! time: a bare sequence, or an object keyed under one of a few historical
//! field names. Reconciliation probes a fixed ordered list of named
//! extraction strategies and fails closed: an unrecognized payload keeps
//! the previous set.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, warn};

/// Extraction strategies tried in order. The first one yielding a
/// sequence wins.
const STRATEGIES: &[(&str, fn(&Value) -> Option<&Vec<Value>>)] = &[
    ("bare_list", as_bare_list),
    ("users", as_users_field),
    ("participants", as_participants_field),
    ("members", as_members_field),
];

fn as_bare_list(value: &Value) -> Option<&Vec<Value>> {
    value.as_array()
}

fn as_users_field(value: &Value) -> Option<&Vec<Value>> {
    value.get("users")?.as_array()
}

fn as_participants_field(value: &Value) -> Option<&Vec<Value>> {
    value.get("participants")?.as_array()
}

fn as_members_field(value: &Value) -> Option<&Vec<Value>> {
    value.get("members")?.as_array()
}

/// A participant entry is either a bare id string or an object carrying one.
fn entry_id(entry: &Value) -> Option<&str> {
    entry
        .as_str()
        .or_else(|| entry.get("userId").and_then(Value::as_str))
        .or_else(|| entry.get("id").and_then(Value::as_str))
}

fn extract_ids(raw: &Value) -> Option<(&'static str, HashSet<String>)> {
    for (name, extract) in STRATEGIES {
        if let Some(entries) = extract(raw) {
            let ids = entries
                .iter()
                .filter_map(entry_id)
                .map(str::to_string)
                .collect();
            return Some((name, ids));
        }
    }
    None
}

/// Field names available in an unrecognized payload, for diagnosis.
fn available_fields(raw: &Value) -> String {
    match raw.as_object() {
        Some(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
        None => format!("non-object payload ({})", value_kind(raw)),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Canonical deduplicated set of participant identifiers.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    participants: HashSet<String>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only access to the current participant set.
    pub fn participants(&self) -> &HashSet<String> {
        &self.participants
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participants.contains(id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Rebuild the set wholesale from a full snapshot.
    ///
    /// Returns whether the payload was recognized. An unrecognized
    /// snapshot retains the previous set.
    pub fn apply_snapshot(&mut self, raw: &Value) -> bool {
        match extract_ids(raw) {
            Some((strategy, ids)) => {
                debug!("presence snapshot via {strategy}: {} participant(s)", ids.len());
                self.participants = ids;
                true
            }
            None => {
                warn!(
                    "unrecognized participant snapshot, keeping previous set (fields: {})",
                    available_fields(raw)
                );
                false
            }
        }
    }

    /// Apply an incremental list update using the same probe as snapshots.
    ///
    /// An unrecognized update is discarded entirely and never empties the
    /// set.
    pub fn apply_update(&mut self, raw: &Value) -> bool {
        match extract_ids(raw) {
            Some((strategy, ids)) => {
                debug!("presence update via {strategy}: {} participant(s)", ids.len());
                self.participants = ids;
                true
            }
            None => {
                warn!(
                    "unrecognized participant update discarded (fields: {})",
                    available_fields(raw)
                );
                false
            }
        }
    }

    /// Record a single participant joining. Returns whether the set changed.
    pub fn add(&mut self, id: &str) -> bool {
        self.participants.insert(id.to_string())
    }

    /// Record a single participant leaving. Returns whether the set changed.
    pub fn remove(&mut self, id: &str) -> bool {
        self.participants.remove(id)
    }
}
