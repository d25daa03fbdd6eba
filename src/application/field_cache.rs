// Field cache - Latest known value per live counter, shared by every reader
use crate::domain::field::{CachedValue, FieldKey, FieldUpdate};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone, Default)]
pub struct FieldCache {
    entries: Arc<RwLock<HashMap<FieldKey, CachedValue>>>,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `key` in one step and report what it replaced.
    pub fn apply(&self, key: &FieldKey, value: f64, at: DateTime<Utc>) -> FieldUpdate {
        let previous = self
            .write()
            .insert(key.clone(), CachedValue::new(value, at))
            .map(|cached| cached.value);
        FieldUpdate::new(key.clone(), previous, value, at)
    }

    pub fn get(&self, key: &FieldKey) -> Option<CachedValue> {
        self.read().get(key).copied()
    }

    pub fn snapshot(&self) -> Vec<(FieldKey, CachedValue)> {
        let mut entries: Vec<_> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<FieldKey, CachedValue>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<FieldKey, CachedValue>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_reports_previous_value() {
        let cache = FieldCache::new();
        let key = FieldKey::new("port", "crane-1", "truck_in");
        let t0 = Utc::now();

        let first = cache.apply(&key, 10.0, t0);
        assert_eq!(first.previous, None);
        assert!(!first.changed);

        let second = cache.apply(&key, 12.0, t0);
        assert_eq!(second.previous, Some(10.0));
        assert!(second.changed);
        assert_eq!(cache.get(&key).map(|c| c.value), Some(12.0));
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = FieldCache::new();
        let reader = cache.clone();
        let key = FieldKey::new("port", "crane-1", "truck_in");

        cache.apply(&key, 3.0, Utc::now());

        assert_eq!(reader.get(&key).map(|c| c.value), Some(3.0));
        assert_eq!(reader.snapshot().len(), 1);
        assert_eq!(reader.snapshot()[0].0, key);
    }
}
