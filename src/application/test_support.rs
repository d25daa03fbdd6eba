// Test doubles shared by the application tests
use crate::application::metrics_repository::MetricsRepository;
use crate::domain::catalog::VideoSource;
use crate::domain::field::FieldKey;
use crate::domain::widget::{FieldBinding, WidgetDraft, WidgetKind};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// In-memory metrics service with call counting and failure injection.
#[derive(Default)]
pub struct StubRepository {
    values: Mutex<HashMap<FieldKey, f64>>,
    failing: Mutex<HashSet<FieldKey>>,
    stalled: Mutex<HashSet<FieldKey>>,
    calls: Mutex<HashMap<FieldKey, usize>>,
    in_flight: Mutex<HashMap<FieldKey, usize>>,
    peak_in_flight: Mutex<HashMap<FieldKey, usize>>,
    collections: Mutex<Vec<String>>,
    sources: Mutex<HashMap<String, Vec<VideoSource>>>,
    gate: Option<Arc<Semaphore>>,
}

impl StubRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `rule_count` call waits for a permit from the returned semaphore.
    pub fn gated(permits: usize) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(permits));
        let repo = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (repo, gate)
    }

    pub fn set_value(&self, key: &FieldKey, value: f64) {
        self.values.lock().unwrap().insert(key.clone(), value);
    }

    pub fn fail(&self, key: &FieldKey) {
        self.failing.lock().unwrap().insert(key.clone());
    }

    pub fn recover(&self, key: &FieldKey) {
        self.failing.lock().unwrap().remove(key);
    }

    /// Calls for `key` never resolve.
    pub fn stall(&self, key: &FieldKey) {
        self.stalled.lock().unwrap().insert(key.clone());
    }

    pub fn calls(&self, key: &FieldKey) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    /// `rule_count` calls for `key` that have neither resolved nor been dropped.
    pub fn in_flight(&self, key: &FieldKey) -> usize {
        self.in_flight.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    /// Highest number of concurrent `rule_count` calls seen for `key`.
    pub fn peak_in_flight(&self, key: &FieldKey) -> usize {
        self.peak_in_flight.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn set_collections(&self, collections: Vec<String>) {
        *self.collections.lock().unwrap() = collections;
    }

    pub fn set_sources(&self, collection: &str, sources: Vec<VideoSource>) {
        self.sources
            .lock()
            .unwrap()
            .insert(collection.to_string(), sources);
    }
}

#[async_trait]
impl MetricsRepository for StubRepository {
    async fn list_collections(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.collections.lock().unwrap().clone())
    }

    async fn list_sources(&self, collection: &str) -> anyhow::Result<Vec<VideoSource>> {
        Ok(self
            .sources
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn field_counts(&self, collection: &str, source: &str) -> anyhow::Result<BTreeMap<String, f64>> {
        Ok(self
            .values
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.collection == collection && k.source == source)
            .map(|(k, v)| (k.rule.clone(), *v))
            .collect())
    }

    async fn rule_count(&self, key: &FieldKey) -> anyhow::Result<Option<f64>> {
        *self.calls.lock().unwrap().entry(key.clone()).or_insert(0) += 1;
        let _in_flight = InFlight::enter(self, key);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let stalled = self.stalled.lock().unwrap().contains(key);
        if stalled {
            std::future::pending::<()>().await;
        }

        if self.failing.lock().unwrap().contains(key) {
            anyhow::bail!("metrics service returned 500 Internal Server Error");
        }

        Ok(self.values.lock().unwrap().get(key).copied())
    }
}

/// Counts a call as in flight until it resolves or its future is dropped.
struct InFlight<'a> {
    repo: &'a StubRepository,
    key: &'a FieldKey,
}

impl<'a> InFlight<'a> {
    fn enter(repo: &'a StubRepository, key: &'a FieldKey) -> Self {
        let mut in_flight = repo.in_flight.lock().unwrap();
        let count = in_flight.entry(key.clone()).or_insert(0);
        *count += 1;
        let mut peak = repo.peak_in_flight.lock().unwrap();
        let peak = peak.entry(key.clone()).or_insert(0);
        *peak = (*peak).max(*count);
        Self { repo, key }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(count) = self.repo.in_flight.lock().unwrap().get_mut(self.key) {
            *count = count.saturating_sub(1);
        }
    }
}

pub fn kpi(title: &str, keys: &[&FieldKey]) -> WidgetDraft {
    WidgetDraft::new(WidgetKind::Kpi, title, bindings(keys))
}

pub fn graph(title: &str, keys: &[&FieldKey]) -> WidgetDraft {
    WidgetDraft::new(WidgetKind::Graph, title, bindings(keys))
}

fn bindings(keys: &[&FieldKey]) -> Vec<FieldBinding> {
    keys.iter()
        .map(|k| FieldBinding::new(&k.collection, &k.source, &k.rule))
        .collect()
}
