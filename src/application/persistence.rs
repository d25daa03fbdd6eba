// Persistence port and glue - Registry and layout blobs in a durable store
use crate::domain::errors::DashboardError;
use crate::domain::layout::LayoutEntry;
use crate::domain::widget::WidgetDefinition;
use std::sync::Arc;

pub const WIDGET_REGISTRY_BLOB: &str = "widgetRegistry";
pub const LAYOUT_BLOB: &str = "layout";

/// Durable local store holding the two independently versioned blobs.
///
/// `Ok(None)` means nothing was stored yet.
pub trait DashboardStore: Send + Sync {
    fn load_widgets(&self) -> Result<Option<Vec<WidgetDefinition>>, DashboardError>;
    fn save_widgets(&self, widgets: &[WidgetDefinition]) -> Result<(), DashboardError>;
    fn load_layout(&self) -> Result<Option<Vec<LayoutEntry>>, DashboardError>;
    fn save_layout(&self, layout: &[LayoutEntry]) -> Result<(), DashboardError>;
}

/// Wraps a store so that failures degrade to warnings.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn DashboardStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn DashboardStore>) -> Self {
        Self { store }
    }

    pub fn load_widgets(&self) -> Vec<WidgetDefinition> {
        match self.store.load_widgets() {
            Ok(widgets) => widgets.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Starting with an empty widget registry: {}", e);
                Vec::new()
            }
        }
    }

    pub fn load_layout(&self) -> Vec<LayoutEntry> {
        match self.store.load_layout() {
            Ok(layout) => layout.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Starting with an empty layout: {}", e);
                Vec::new()
            }
        }
    }

    pub fn save_widgets(&self, widgets: &[WidgetDefinition]) {
        if let Err(e) = self.store.save_widgets(widgets) {
            tracing::warn!("Widget registry kept in memory only: {}", e);
        }
    }

    pub fn save_layout(&self, layout: &[LayoutEntry]) {
        if let Err(e) = self.store.save_layout(layout) {
            tracing::warn!("Layout kept in memory only: {}", e);
        }
    }
}
