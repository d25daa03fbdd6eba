// Layout engine - Deterministic, non-destructive grid placement
use crate::application::persistence::Persistence;
use crate::domain::errors::DashboardError;
use crate::domain::layout::{LayoutEntry, kpi_band_height};
use crate::domain::widget::{WidgetDefinition, WidgetKind};
use std::collections::{HashMap, HashSet};

pub struct LayoutEngine {
    entries: Vec<LayoutEntry>,
    persistence: Persistence,
}

impl LayoutEngine {
    /// Restore stored geometry against the live widgets.
    pub fn load(persistence: Persistence, widgets: &[WidgetDefinition]) -> Self {
        let stored = persistence.load_layout();
        let mut engine = Self {
            entries: Vec::new(),
            persistence,
        };
        engine.restore(stored, widgets);
        engine
    }

    /// Adopt stored geometry, pruning entries whose widget no longer exists.
    ///
    /// Returns one `StateInconsistency` per pruned entry.
    pub fn restore(&mut self, stored: Vec<LayoutEntry>, widgets: &[WidgetDefinition]) -> Vec<DashboardError> {
        let live: HashSet<&str> = widgets.iter().map(|w| w.id.as_str()).collect();
        let mut seen = HashSet::new();
        let mut orphans = Vec::new();
        let stored_len = stored.len();

        let entries: Vec<LayoutEntry> = stored
            .into_iter()
            .filter(|entry| {
                if !live.contains(entry.widget_id.as_str()) {
                    let err = DashboardError::StateInconsistency {
                        widget_id: entry.widget_id.clone(),
                    };
                    tracing::warn!("Pruning layout entry: {}", err);
                    orphans.push(err);
                    return false;
                }
                seen.insert(entry.widget_id.clone())
            })
            .collect();

        let pruned = entries.len() != stored_len;
        self.entries = entries;
        let placed = self.place_missing(widgets);
        if pruned || placed {
            self.persistence.save_layout(&self.entries);
        }
        orphans
    }

    /// Reconcile with the registry: drop geometry of removed widgets and
    /// place new ones. Existing entries are never moved.
    ///
    /// Returns whether the layout changed.
    pub fn sync(&mut self, widgets: &[WidgetDefinition]) -> bool {
        let live: HashSet<&str> = widgets.iter().map(|w| w.id.as_str()).collect();
        let before = self.entries.len();
        self.entries.retain(|e| live.contains(e.widget_id.as_str()));
        let pruned = self.entries.len() != before;

        let placed = self.place_missing(widgets);
        let changed = pruned || placed;
        if changed {
            self.persistence.save_layout(&self.entries);
        }
        changed
    }

    /// Replace the whole layout after a user drag/resize.
    ///
    /// Nothing changes unless every entry is valid.
    pub fn replace(
        &mut self,
        entries: Vec<LayoutEntry>,
        widgets: &[WidgetDefinition],
    ) -> Result<&[LayoutEntry], DashboardError> {
        let kinds: HashMap<&str, WidgetKind> =
            widgets.iter().map(|w| (w.id.as_str(), w.kind)).collect();
        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(entries.len());

        for mut entry in entries {
            let kind = kinds.get(entry.widget_id.as_str()).copied().ok_or_else(|| {
                DashboardError::StateInconsistency {
                    widget_id: entry.widget_id.clone(),
                }
            })?;
            if !seen.insert(entry.widget_id.clone()) {
                return Err(DashboardError::validation(format!(
                    "layout lists widget {} more than once",
                    entry.widget_id
                )));
            }
            entry.constrain(&kind.placement_rule().constraints);
            accepted.push(entry);
        }

        self.entries = accepted;
        self.place_missing(widgets);
        self.persistence.save_layout(&self.entries);
        tracing::debug!("Layout replaced with {} entries", self.entries.len());
        Ok(&self.entries)
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    pub fn get(&self, widget_id: &str) -> Option<&LayoutEntry> {
        self.entries.iter().find(|e| e.widget_id == widget_id)
    }

    fn place_missing(&mut self, widgets: &[WidgetDefinition]) -> bool {
        let existing: HashSet<String> = self.entries.iter().map(|e| e.widget_id.clone()).collect();
        let kpi_count = widgets.iter().filter(|w| w.kind == WidgetKind::Kpi).count() as u32;
        let mut kind_index: HashMap<WidgetKind, u32> = HashMap::new();
        let mut placed = false;

        for widget in widgets {
            let counter = kind_index.entry(widget.kind).or_insert(0);
            let index = *counter;
            *counter += 1;

            if existing.contains(&widget.id) {
                continue;
            }
            let entry = self.first_free_slot(widget, index, kpi_count);
            tracing::debug!(
                "Placed widget {} at ({}, {}) size {}x{}",
                widget.id, entry.x, entry.y, entry.w, entry.h
            );
            self.entries.push(entry);
            placed = true;
        }

        placed
    }

    /// Slot `index` of the kind's stacking rule, or the next one that does not
    /// overlap geometry already on the grid.
    fn first_free_slot(&self, widget: &WidgetDefinition, index: u32, kpi_count: u32) -> LayoutEntry {
        let rule = widget.kind.placement_rule();
        let y_offset = match widget.kind {
            WidgetKind::Kpi => 0,
            WidgetKind::Graph => kpi_band_height(kpi_count),
        };

        let mut index = index;
        loop {
            let (x, y) = rule.slot(index, y_offset);
            let candidate = LayoutEntry::placed(&widget.id, rule, x, y);
            if !self.entries.iter().any(|e| e.overlaps(&candidate)) {
                return candidate;
            }
            index += 1;
        }
    }
}
