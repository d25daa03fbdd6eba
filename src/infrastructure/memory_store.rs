// In-memory dashboard store, used when no storage directory is configured
use crate::application::persistence::{DashboardStore, LAYOUT_BLOB, WIDGET_REGISTRY_BLOB};
use crate::domain::errors::DashboardError;
use crate::domain::layout::LayoutEntry;
use crate::domain::widget::WidgetDefinition;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryStore {
    widgets: Mutex<Option<Vec<WidgetDefinition>>>,
    layout: Mutex<Option<Vec<LayoutEntry>>>,
    reject_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a full disk: every save fails until switched back.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    fn check_writable(&self, blob: &'static str) -> Result<(), DashboardError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(DashboardError::persistence(blob, "storage quota exceeded"));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DashboardStore for MemoryStore {
    fn load_widgets(&self) -> Result<Option<Vec<WidgetDefinition>>, DashboardError> {
        Ok(lock(&self.widgets).clone())
    }

    fn save_widgets(&self, widgets: &[WidgetDefinition]) -> Result<(), DashboardError> {
        self.check_writable(WIDGET_REGISTRY_BLOB)?;
        *lock(&self.widgets) = Some(widgets.to_vec());
        Ok(())
    }

    fn load_layout(&self) -> Result<Option<Vec<LayoutEntry>>, DashboardError> {
        Ok(lock(&self.layout).clone())
    }

    fn save_layout(&self, layout: &[LayoutEntry]) -> Result<(), DashboardError> {
        self.check_writable(LAYOUT_BLOB)?;
        *lock(&self.layout) = Some(layout.to_vec());
        Ok(())
    }
}
