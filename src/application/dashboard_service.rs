// Dashboard service - Registry, layout and poller kept in step
use crate::application::field_poller::FieldPoller;
use crate::application::layout_engine::LayoutEngine;
use crate::application::persistence::{DashboardStore, Persistence};
use crate::application::widget_registry::WidgetRegistry;
use crate::domain::errors::DashboardError;
use crate::domain::field::{CachedValue, FieldKey};
use crate::domain::layout::LayoutEntry;
use crate::domain::widget::{StyleEdit, WidgetDefinition, WidgetDraft};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Poller view owned by the dashboard page.
pub const DASHBOARD_VIEW: &str = "dashboard";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReading {
    pub key: FieldKey,
    pub display_value: String,
    pub value: Option<CachedValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetView {
    pub widget: WidgetDefinition,
    pub layout: Option<LayoutEntry>,
    pub readings: Vec<FieldReading>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub widgets: Vec<WidgetView>,
}

struct DashboardState {
    registry: WidgetRegistry,
    layout: LayoutEngine,
}

#[derive(Clone)]
pub struct DashboardService {
    state: Arc<Mutex<DashboardState>>,
    poller: FieldPoller,
}

impl DashboardService {
    /// Restore registry and layout from `store` and start polling their fields.
    pub fn open(store: Arc<dyn DashboardStore>, poller: FieldPoller) -> Self {
        let persistence = Persistence::new(store);
        let registry = WidgetRegistry::load(persistence.clone());
        let layout = LayoutEngine::load(persistence, registry.list());

        poller.set_interest(DASHBOARD_VIEW, registry.field_keys());
        Self {
            state: Arc::new(Mutex::new(DashboardState { registry, layout })),
            poller,
        }
    }

    pub fn add_widget(&self, draft: WidgetDraft) -> Result<WidgetDefinition, DashboardError> {
        let mut state = self.lock();
        let widget = state.registry.add(draft)?;
        self.after_registry_change(&mut state);
        Ok(widget)
    }

    /// Remove a widget together with its geometry; fields only it used stop polling.
    pub fn remove_widget(&self, id: &str) -> bool {
        let mut state = self.lock();
        if !state.registry.remove(id) {
            return false;
        }
        self.after_registry_change(&mut state);
        true
    }

    pub fn restyle_widget(&self, id: &str, edit: &StyleEdit) -> Result<WidgetDefinition, DashboardError> {
        self.lock().registry.restyle(id, edit)
    }

    pub fn widgets(&self) -> Vec<WidgetDefinition> {
        self.lock().registry.list().to_vec()
    }

    pub fn layout(&self) -> Vec<LayoutEntry> {
        self.lock().layout.entries().to_vec()
    }

    /// Accept a layout produced by a user drag/resize.
    pub fn replace_layout(&self, entries: Vec<LayoutEntry>) -> Result<Vec<LayoutEntry>, DashboardError> {
        let mut state = self.lock();
        let DashboardState { registry, layout } = &mut *state;
        layout.replace(entries, registry.list()).map(<[LayoutEntry]>::to_vec)
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let state = self.lock();
        let cache = self.poller.cache();

        let widgets = state
            .registry
            .list()
            .iter()
            .map(|widget| WidgetView {
                layout: state.layout.get(&widget.id).cloned(),
                readings: widget
                    .fields
                    .iter()
                    .map(|field| {
                        let key = field.key();
                        FieldReading {
                            value: cache.get(&key),
                            display_value: field.display_value.clone(),
                            key,
                        }
                    })
                    .collect(),
                widget: widget.clone(),
            })
            .collect();

        DashboardSnapshot { widgets }
    }

    pub fn poller(&self) -> &FieldPoller {
        &self.poller
    }

    /// Stop polling on behalf of the dashboard view.
    pub fn shutdown(&self) {
        self.poller.release_view(DASHBOARD_VIEW);
    }

    // Runs under the state lock so readers never see the registry and the
    // layout or poller interest out of step.
    fn after_registry_change(&self, state: &mut DashboardState) {
        state.layout.sync(state.registry.list());
        self.poller
            .set_interest(DASHBOARD_VIEW, state.registry.field_keys());
    }

    fn lock(&self) -> MutexGuard<'_, DashboardState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::field_cache::FieldCache;
    use crate::application::field_poller::PollerSettings;
    use crate::application::test_support::{StubRepository, graph, kpi};
    use crate::infrastructure::json_store::JsonFileStore;
    use crate::infrastructure::memory_store::MemoryStore;
    use std::time::Duration;

    const INTERVAL: Duration = Duration::from_secs(10);

    fn key(rule: &str) -> FieldKey {
        FieldKey::new("campus", "north-gate", rule)
    }

    fn service(repo: &Arc<StubRepository>, store: Arc<dyn DashboardStore>) -> DashboardService {
        let poller = FieldPoller::new(
            repo.clone(),
            FieldCache::new(),
            PollerSettings {
                interval: INTERVAL,
                request_timeout: Duration::from_secs(5),
            },
        );
        DashboardService::open(store, poller)
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_live_widget_has_exactly_one_layout_entry() {
        let repo = Arc::new(StubRepository::new());
        let dashboard = service(&repo, Arc::new(MemoryStore::new()));

        let a = dashboard.add_widget(kpi("A", &[&key("a")])).unwrap();
        let b = dashboard.add_widget(graph("B", &[&key("b")])).unwrap();
        let c = dashboard.add_widget(kpi("C", &[&key("c")])).unwrap();
        assert!(dashboard.remove_widget(&b.id));
        assert!(!dashboard.remove_widget(&b.id));

        let layout_ids: Vec<String> = dashboard.layout().into_iter().map(|e| e.widget_id).collect();
        assert_eq!(layout_ids, vec![a.id, c.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_widget_is_rejected_without_side_effects() {
        let repo = Arc::new(StubRepository::new());
        let dashboard = service(&repo, Arc::new(MemoryStore::new()));

        let err = dashboard.add_widget(WidgetDraft::default()).unwrap_err();

        assert!(err.is_caller_visible());
        assert!(dashboard.widgets().is_empty());
        assert!(dashboard.layout().is_empty());
        assert!(dashboard.poller().active_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removing_widget_mid_poll_stops_its_unique_keys() {
        let repo = Arc::new(StubRepository::new());
        let (only_a, shared) = (key("only_a"), key("shared"));
        repo.set_value(&only_a, 1.0);
        repo.set_value(&shared, 2.0);
        let dashboard = service(&repo, Arc::new(MemoryStore::new()));

        let a = dashboard
            .add_widget(kpi("A", &[&only_a, &shared]))
            .unwrap();
        dashboard.add_widget(graph("B", &[&shared])).unwrap();
        tokio::time::sleep(INTERVAL / 2).await;

        dashboard.remove_widget(&a.id);
        assert_eq!(dashboard.poller().active_keys(), vec![shared.clone()]);
        let only_a_calls = repo.calls(&only_a);
        let shared_calls = repo.calls(&shared);

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(repo.calls(&only_a), only_a_calls);
        assert!(repo.calls(&shared) > shared_calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_key_fetched_once_per_tick() {
        let repo = Arc::new(StubRepository::new());
        let people = key("person_in");
        repo.set_value(&people, 7.0);
        let dashboard = service(&repo, Arc::new(MemoryStore::new()));

        dashboard.add_widget(kpi("Visitors", &[&people])).unwrap();
        dashboard.add_widget(graph("Visitors over time", &[&people])).unwrap();

        tokio::time::sleep(INTERVAL / 2).await;
        assert_eq!(repo.calls(&people), 1);

        repo.set_value(&people, 8.0);
        tokio::time::sleep(INTERVAL).await;
        assert_eq!(repo.calls(&people), 2);

        let snapshot = dashboard.snapshot();
        let values: Vec<Option<f64>> = snapshot
            .widgets
            .iter()
            .map(|w| w.readings[0].value.map(|v| v.value))
            .collect();
        assert_eq!(values, vec![Some(8.0), Some(8.0)]);
        assert!(snapshot.widgets.iter().all(|w| w.layout.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_restores_registry_and_prunes_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(StubRepository::new());
        let store: Arc<dyn DashboardStore> = Arc::new(JsonFileStore::new(dir.path()));

        let first = service(&repo, store.clone());
        first.add_widget(kpi("A", &[&key("a")])).unwrap();
        let b = first.add_widget(kpi("B", &[&key("b")])).unwrap();
        first.add_widget(graph("C", &[&key("c")])).unwrap();
        let widgets = first.widgets();
        first.shutdown();

        // Geometry for B outlives its definition
        let orphaned_layout = first.layout();
        let survivors: Vec<WidgetDefinition> =
            widgets.iter().filter(|w| w.id != b.id).cloned().collect();
        store.save_widgets(&survivors).unwrap();
        store.save_layout(&orphaned_layout).unwrap();

        let second = service(&repo, store.clone());
        assert_eq!(second.widgets(), survivors);
        assert_eq!(second.layout().len(), 2);
        assert!(second.layout().iter().all(|e| e.widget_id != b.id));
        assert_eq!(store.load_layout().unwrap().unwrap().len(), 2);
        assert_eq!(
            second.poller().active_keys(),
            vec![key("a"), key("c")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_layout_is_persisted_and_kept() {
        let repo = Arc::new(StubRepository::new());
        let store = Arc::new(MemoryStore::new());
        let dashboard = service(&repo, store.clone());
        dashboard.add_widget(kpi("A", &[&key("a")])).unwrap();

        let mut layout = dashboard.layout();
        layout[0].y = 12;
        let accepted = dashboard.replace_layout(layout).unwrap();

        assert_eq!(accepted[0].y, 12);
        assert_eq!(store.load_layout().unwrap().unwrap(), accepted);
        dashboard.add_widget(kpi("B", &[&key("b")])).unwrap();
        assert_eq!(dashboard.layout()[0].y, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_failure_does_not_block_edits() {
        let repo = Arc::new(StubRepository::new());
        let store = Arc::new(MemoryStore::new());
        store.reject_writes(true);
        let dashboard = service(&repo, store.clone());

        let a = dashboard.add_widget(kpi("A", &[&key("a")])).unwrap();

        assert_eq!(dashboard.widgets().len(), 1);
        assert_eq!(dashboard.layout()[0].widget_id, a.id);
        assert!(store.load_widgets().unwrap().is_none());
    }
}
