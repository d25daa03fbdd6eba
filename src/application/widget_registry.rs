// Widget registry - Ordered, persisted collection of widget definitions
use crate::application::persistence::Persistence;
use crate::domain::errors::DashboardError;
use crate::domain::field::FieldKey;
use crate::domain::widget::{StyleEdit, WidgetDefinition, WidgetDraft, distinct_field_keys};
use std::collections::BTreeSet;

pub struct WidgetRegistry {
    widgets: Vec<WidgetDefinition>,
    persistence: Persistence,
}

impl WidgetRegistry {
    /// Restore the registry from the store; a failed read starts empty.
    pub fn load(persistence: Persistence) -> Self {
        let mut widgets = persistence.load_widgets();

        // Duplicate ids would break the one-entry-per-widget layout invariant
        let mut seen = BTreeSet::new();
        widgets.retain(|w| {
            let fresh = seen.insert(w.id.clone());
            if !fresh {
                tracing::warn!("Dropping duplicate widget {} from stored registry", w.id);
            }
            fresh
        });

        tracing::info!("Widget registry loaded with {} widgets", widgets.len());
        Self {
            widgets,
            persistence,
        }
    }

    /// Validate and append a widget. The registry is untouched on rejection.
    pub fn add(&mut self, draft: WidgetDraft) -> Result<WidgetDefinition, DashboardError> {
        let id = match draft.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                if self.contains(id) {
                    return Err(DashboardError::validation(format!(
                        "widget id {} already exists",
                        id
                    )));
                }
                id.to_string()
            }
            _ => uuid::Uuid::new_v4().to_string(),
        };

        let widget = draft.into_definition(id)?;
        self.widgets.push(widget.clone());
        self.persistence.save_widgets(&self.widgets);

        tracing::info!("Added {:?} widget {} ({})", widget.kind, widget.id, widget.title);
        Ok(widget)
    }

    /// Remove by id. Absent ids are a no-op; returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.widgets.len();
        self.widgets.retain(|w| w.id != id);
        if self.widgets.len() == before {
            return false;
        }

        self.persistence.save_widgets(&self.widgets);
        tracing::info!("Removed widget {}", id);
        true
    }

    pub fn restyle(&mut self, id: &str, edit: &StyleEdit) -> Result<WidgetDefinition, DashboardError> {
        let widget = self
            .widgets
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| DashboardError::UnknownWidget { id: id.to_string() })?;
        widget.apply_style(edit);
        let updated = widget.clone();

        self.persistence.save_widgets(&self.widgets);
        Ok(updated)
    }

    /// Current definitions in insertion order.
    pub fn list(&self) -> &[WidgetDefinition] {
        &self.widgets
    }

    pub fn get(&self, id: &str) -> Option<&WidgetDefinition> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn field_keys(&self) -> BTreeSet<FieldKey> {
        distinct_field_keys(&self.widgets)
    }
}
