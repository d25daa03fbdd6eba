// Field poller - One deduplicated, fixed-delay refresh loop per live counter
use crate::application::field_cache::FieldCache;
use crate::application::metrics_repository::MetricsRepository;
use crate::domain::errors::DashboardError;
use crate::domain::field::{FieldKey, FieldUpdate};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    /// Delay between the end of one fetch and the start of the next
    pub interval: Duration,
    /// Upper bound on a single fetch
    pub request_timeout: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Fresh value written to the cache
    Updated(FieldUpdate),
    /// A fetch for the same key was still in flight
    Skipped,
    /// Fetch failed; the cached value was left alone
    Failed,
    /// The key was released before the fetch resolved
    Discarded,
}

/// Puts the key back to idle when a fetch ends, including when the fetch
/// future is dropped by an abort.
struct FetchGuard<'a>(&'a AtomicBool);

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Fetch state of one key: `fetching` is the Idle/Fetching flag, `alive`
/// turns false once nobody is interested any more.
struct KeyWorker {
    key: FieldKey,
    repository: Arc<dyn MetricsRepository>,
    cache: FieldCache,
    updates: broadcast::Sender<FieldUpdate>,
    request_timeout: Duration,
    fetching: AtomicBool,
    alive: AtomicBool,
}

impl KeyWorker {
    async fn poll_once(&self) -> PollOutcome {
        if !self.alive.load(Ordering::Acquire) {
            return PollOutcome::Discarded;
        }
        if self
            .fetching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Skipping {}: previous fetch still in flight", self.key);
            return PollOutcome::Skipped;
        }
        let _guard = FetchGuard(&self.fetching);

        let result =
            tokio::time::timeout(self.request_timeout, self.repository.rule_count(&self.key)).await;

        if !self.alive.load(Ordering::Acquire) {
            tracing::debug!("Discarding late result for released key {}", self.key);
            return PollOutcome::Discarded;
        }

        let message = match result {
            Ok(Ok(Some(value))) => {
                let update = self.cache.apply(&self.key, value, Utc::now());
                if let Some(change) = update.change() {
                    tracing::debug!(
                        "{} changed {} -> {}",
                        change.key, change.old_value, change.new_value
                    );
                }
                // Nobody listening is fine, the cache already holds the value
                let _ = self.updates.send(update.clone());
                return PollOutcome::Updated(update);
            }
            Ok(Ok(None)) => "rule missing from response".to_string(),
            Ok(Err(e)) => format!("{:#}", e),
            Err(_) => format!("no response within {:?}", self.request_timeout),
        };

        let err = DashboardError::TransientFetch {
            key: self.key.clone(),
            message,
        };
        tracing::warn!("{}; keeping previous value", err);
        PollOutcome::Failed
    }

    async fn run(self: Arc<Self>, interval: Duration) {
        while self.alive.load(Ordering::Acquire) {
            self.poll_once().await;
            tokio::time::sleep(interval).await;
        }
    }

    fn retire(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

struct KeySubscription {
    ref_count: usize,
    worker: Arc<KeyWorker>,
    timer: JoinHandle<()>,
    /// Immediate fetches started for views that joined an already polled key
    refreshes: Vec<JoinHandle<()>>,
}

impl KeySubscription {
    fn refresh_now(&mut self) {
        self.refreshes.retain(|handle| !handle.is_finished());
        let worker = self.worker.clone();
        self.refreshes.push(tokio::spawn(async move {
            worker.poll_once().await;
        }));
    }

    /// Aborting drops any in-flight fetch, so the key is idle once this returns
    /// to the runtime.
    fn cancel(self) {
        self.worker.retire();
        self.timer.abort();
        for refresh in self.refreshes {
            refresh.abort();
        }
    }
}

#[derive(Default)]
struct PollerState {
    views: HashMap<String, HashSet<FieldKey>>,
    keys: HashMap<FieldKey, KeySubscription>,
}

struct PollerShared {
    repository: Arc<dyn MetricsRepository>,
    cache: FieldCache,
    settings: PollerSettings,
    updates: broadcast::Sender<FieldUpdate>,
    state: Mutex<PollerState>,
}

impl Drop for PollerShared {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, subscription) in state.keys.drain() {
            subscription.cancel();
        }
    }
}

/// Keeps every field some view is interested in fresh in the [`FieldCache`].
///
/// Views declare their complete key set with [`FieldPoller::set_interest`].
/// Each key is reference counted across views and polled by exactly one
/// timer while its count is positive. Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct FieldPoller {
    shared: Arc<PollerShared>,
}

impl FieldPoller {
    pub fn new(repository: Arc<dyn MetricsRepository>, cache: FieldCache, settings: PollerSettings) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(PollerShared {
                repository,
                cache,
                settings,
                updates,
                state: Mutex::new(PollerState::default()),
            }),
        }
    }

    /// Replace the set of keys `view` wants refreshed.
    ///
    /// Newly wanted keys are fetched immediately; keys no other view wants
    /// any more have their timers cancelled.
    pub fn set_interest<I>(&self, view: &str, keys: I)
    where
        I: IntoIterator<Item = FieldKey>,
    {
        let keys: HashSet<FieldKey> = keys.into_iter().collect();
        let mut state = self.lock();

        let previous = if keys.is_empty() {
            state.views.remove(view)
        } else {
            state.views.insert(view.to_string(), keys.clone())
        }
        .unwrap_or_default();

        for key in keys.difference(&previous) {
            self.acquire(&mut state, key);
        }
        for key in previous.difference(&keys) {
            self.release(&mut state, key);
        }
    }

    /// Tear down a view.
    pub fn release_view(&self, view: &str) {
        self.set_interest(view, std::iter::empty());
    }

    /// Cancel every timer and forget every view.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.views.clear();
        let count = state.keys.len();
        for (_, subscription) in state.keys.drain() {
            subscription.cancel();
        }
        tracing::info!("Field poller stopped {} key timers", count);
    }

    /// Fetch `key` right now, unless a fetch for it is already in flight.
    ///
    /// Returns `None` when no view is interested in `key`.
    pub async fn poll_now(&self, key: &FieldKey) -> Option<PollOutcome> {
        let worker = self.worker(key)?;
        Some(worker.poll_once().await)
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<FieldUpdate> {
        self.shared.updates.subscribe()
    }

    pub fn cache(&self) -> &FieldCache {
        &self.shared.cache
    }

    pub fn settings(&self) -> PollerSettings {
        self.shared.settings
    }

    pub fn active_keys(&self) -> Vec<FieldKey> {
        let mut keys: Vec<FieldKey> = self.lock().keys.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn ref_count(&self, key: &FieldKey) -> usize {
        self.lock().keys.get(key).map_or(0, |s| s.ref_count)
    }

    fn worker(&self, key: &FieldKey) -> Option<Arc<KeyWorker>> {
        self.lock().keys.get(key).map(|s| s.worker.clone())
    }

    fn acquire(&self, state: &mut PollerState, key: &FieldKey) {
        if let Some(subscription) = state.keys.get_mut(key) {
            subscription.ref_count += 1;
            // The new view gets a value now rather than at the next tick
            subscription.refresh_now();
            return;
        }

        let worker = Arc::new(KeyWorker {
            key: key.clone(),
            repository: self.shared.repository.clone(),
            cache: self.shared.cache.clone(),
            updates: self.shared.updates.clone(),
            request_timeout: self.shared.settings.request_timeout,
            fetching: AtomicBool::new(false),
            alive: AtomicBool::new(true),
        });
        let timer = tokio::spawn(worker.clone().run(self.shared.settings.interval));
        tracing::info!("Polling {} every {:?}", key, self.shared.settings.interval);

        state.keys.insert(
            key.clone(),
            KeySubscription {
                ref_count: 1,
                worker,
                timer,
                refreshes: Vec::new(),
            },
        );
    }

    fn release(&self, state: &mut PollerState, key: &FieldKey) {
        let Some(subscription) = state.keys.get_mut(key) else {
            return;
        };
        subscription.ref_count = subscription.ref_count.saturating_sub(1);
        if subscription.ref_count > 0 {
            return;
        }
        if let Some(subscription) = state.keys.remove(key) {
            subscription.cancel();
            tracing::info!("Stopped polling {}", key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, PollerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
