// Field domain model - Identity and values of live counters
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one live counter. Several widgets may share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldKey {
    pub collection: String,
    pub source: String,
    pub rule: String,
}

impl FieldKey {
    pub fn new(collection: impl Into<String>, source: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            source: source.into(),
            rule: rule.into(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.collection, self.source, self.rule)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedValue {
    pub value: f64,
    pub last_updated_at: DateTime<Utc>,
}

impl CachedValue {
    pub fn new(value: f64, last_updated_at: DateTime<Utc>) -> Self {
        Self {
            value,
            last_updated_at,
        }
    }
}

/// A value that moved between two observations, for the renderer to highlight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    pub key: FieldKey,
    pub old_value: f64,
    pub new_value: f64,
}

/// Compare a fresh observation against what was cached before it.
///
/// The first observation of a key has nothing to compare against and is not
/// reported as a change.
pub fn detect_change(key: &FieldKey, previous: Option<f64>, new_value: f64) -> Option<ValueChange> {
    match previous {
        Some(old_value) if old_value != new_value => Some(ValueChange {
            key: key.clone(),
            old_value,
            new_value,
        }),
        _ => None,
    }
}

/// Result of writing one successful fetch into the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldUpdate {
    pub key: FieldKey,
    pub previous: Option<f64>,
    pub value: f64,
    pub changed: bool,
    pub updated_at: DateTime<Utc>,
}

impl FieldUpdate {
    pub fn new(key: FieldKey, previous: Option<f64>, value: f64, updated_at: DateTime<Utc>) -> Self {
        let changed = detect_change(&key, previous, value).is_some();
        Self {
            key,
            previous,
            value,
            changed,
            updated_at,
        }
    }

    pub fn change(&self) -> Option<ValueChange> {
        detect_change(&self.key, self.previous, self.value)
    }
}
