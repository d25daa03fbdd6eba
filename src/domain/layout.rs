// Layout domain model - Grid geometry per widget
use super::widget::WidgetKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeConstraints {
    pub min_w: u32,
    pub max_w: u32,
    pub min_h: u32,
    pub max_h: u32,
}

/// Column-stacking rule used to auto-place a widget of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementRule {
    pub w: u32,
    pub h: u32,
    pub columns: u32,
    pub column_pitch: u32,
    pub row_pitch: u32,
    pub constraints: SizeConstraints,
}

pub const KPI_RULE: PlacementRule = PlacementRule {
    w: 4,
    h: 3,
    columns: 3,
    column_pitch: 4,
    row_pitch: 4,
    constraints: SizeConstraints {
        min_w: 3,
        max_w: 6,
        min_h: 3,
        max_h: 4,
    },
};

pub const GRAPH_RULE: PlacementRule = PlacementRule {
    w: 6,
    h: 5,
    columns: 2,
    column_pitch: 6,
    row_pitch: 6,
    constraints: SizeConstraints {
        min_w: 4,
        max_w: 12,
        min_h: 4,
        max_h: 8,
    },
};

impl WidgetKind {
    pub fn placement_rule(&self) -> &'static PlacementRule {
        match self {
            WidgetKind::Kpi => &KPI_RULE,
            WidgetKind::Graph => &GRAPH_RULE,
        }
    }
}

impl PlacementRule {
    /// Grid origin of slot `index`; `y_offset` shifts the whole band down.
    pub fn slot(&self, index: u32, y_offset: u32) -> (u32, u32) {
        let x = (index % self.columns) * self.column_pitch;
        let y = (index / self.columns) * self.row_pitch + y_offset;
        (x, y)
    }
}

/// Vertical space reserved for the KPI band above the graphs.
pub fn kpi_band_height(kpi_count: u32) -> u32 {
    kpi_count.div_ceil(KPI_RULE.columns) * KPI_RULE.row_pitch
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEntry {
    pub widget_id: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub min_w: u32,
    pub max_w: u32,
    pub min_h: u32,
    pub max_h: u32,
    #[serde(rename = "static", default)]
    pub is_static: bool,
}

impl LayoutEntry {
    pub fn placed(widget_id: &str, rule: &PlacementRule, x: u32, y: u32) -> Self {
        Self {
            widget_id: widget_id.to_string(),
            x,
            y,
            w: rule.w,
            h: rule.h,
            min_w: rule.constraints.min_w,
            max_w: rule.constraints.max_w,
            min_h: rule.constraints.min_h,
            max_h: rule.constraints.max_h,
            is_static: false,
        }
    }

    pub fn overlaps(&self, other: &LayoutEntry) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }

    /// Force the size into the kind's bounds and stamp the bounds on the entry.
    pub fn constrain(&mut self, constraints: &SizeConstraints) {
        self.min_w = constraints.min_w;
        self.max_w = constraints.max_w;
        self.min_h = constraints.min_h;
        self.max_h = constraints.max_h;
        self.w = self.w.clamp(constraints.min_w, constraints.max_w);
        self.h = self.h.clamp(constraints.min_h, constraints.max_h);
    }
}
