// Widget domain model - KPI cards and graphs bound to live fields
use super::errors::DashboardError;
use super::field::FieldKey;
use super::icon::Icon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Kpi,
    Graph,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStyling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldBinding {
    // Missing parts decode as blank so that validation reports them
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub rule: String,
    /// Label shown next to the value; defaults to the rule name.
    #[serde(default)]
    pub display_value: String,
    #[serde(default)]
    pub styling: FieldStyling,
}

impl FieldBinding {
    pub fn new(collection: &str, source: &str, rule: &str) -> Self {
        Self {
            collection: collection.to_string(),
            source: source.to_string(),
            rule: rule.to_string(),
            display_value: String::new(),
            styling: FieldStyling::default(),
        }
    }

    pub fn key(&self) -> FieldKey {
        FieldKey::new(&self.collection, &self.source, &self.rule)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDefinition {
    pub id: String,
    pub kind: WidgetKind,
    pub title: String,
    pub fields: Vec<FieldBinding>,
    /// Chart type and style options chosen in the configuration flow.
    #[serde(default)]
    pub render_payload: serde_json::Value,
    #[serde(default)]
    pub icon: Icon,
}

impl WidgetDefinition {
    pub fn field_keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.fields.iter().map(FieldBinding::key)
    }

    pub fn apply_style(&mut self, edit: &StyleEdit) {
        if let Some(icon) = edit.icon {
            self.icon = icon;
        }
        if let Some(styling) = &edit.styling {
            for field in &mut self.fields {
                if styling.color.is_some() {
                    field.styling.color = styling.color.clone();
                }
                if styling.icon.is_some() {
                    field.styling.icon = styling.icon;
                }
            }
        }
        if let Some(payload) = &edit.render_payload {
            self.render_payload = payload.clone();
        }
    }
}

/// Distinct keys referenced by a set of widgets.
pub fn distinct_field_keys(widgets: &[WidgetDefinition]) -> BTreeSet<FieldKey> {
    widgets.iter().flat_map(WidgetDefinition::field_keys).collect()
}

/// Unvalidated widget as produced by the configuration flow.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub kind: Option<WidgetKind>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldBinding>,
    #[serde(default)]
    pub render_payload: serde_json::Value,
    #[serde(default)]
    pub icon: Option<Icon>,
}

impl WidgetDraft {
    pub fn new(kind: WidgetKind, title: &str, fields: Vec<FieldBinding>) -> Self {
        Self {
            kind: Some(kind),
            title: Some(title.to_string()),
            fields,
            ..Self::default()
        }
    }

    /// Check required attributes and produce a definition with `id`.
    pub fn into_definition(self, id: String) -> Result<WidgetDefinition, DashboardError> {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DashboardError::validation("title is required"))?;
        let kind = self
            .kind
            .ok_or_else(|| DashboardError::validation("kind is required"))?;
        if self.fields.is_empty() {
            return Err(DashboardError::validation(
                "at least one field reference is required",
            ));
        }

        let mut fields = self.fields;
        for (idx, field) in fields.iter_mut().enumerate() {
            for (name, value) in [
                ("collection", &field.collection),
                ("source", &field.source),
                ("rule", &field.rule),
            ] {
                if value.trim().is_empty() {
                    return Err(DashboardError::validation(format!(
                        "field {} is missing its {}",
                        idx, name
                    )));
                }
            }
            if field.display_value.trim().is_empty() {
                field.display_value = field.rule.clone();
            }
            if field.styling.icon.is_none() {
                field.styling.icon = Some(Icon::for_rule(&field.rule));
            }
        }

        Ok(WidgetDefinition {
            id,
            kind,
            title,
            fields,
            render_payload: self.render_payload,
            icon: self.icon.unwrap_or_default(),
        })
    }
}

/// The only kind of edit an existing widget accepts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleEdit {
    #[serde(default)]
    pub icon: Option<Icon>,
    #[serde(default)]
    pub styling: Option<FieldStyling>,
    #[serde(default)]
    pub render_payload: Option<serde_json::Value>,
}
