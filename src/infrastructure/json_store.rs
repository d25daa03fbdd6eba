// Versioned JSON file store for the registry and layout blobs
use crate::application::persistence::{DashboardStore, LAYOUT_BLOB, WIDGET_REGISTRY_BLOB};
use crate::domain::errors::DashboardError;
use crate::domain::layout::LayoutEntry;
use crate::domain::widget::WidgetDefinition;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Current on-disk schema. Bare JSON arrays written before versioning are version 0.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a, T> {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    data: &'a [T],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    #[allow(dead_code)]
    schema_version: u32,
    data: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, blob: &str) -> PathBuf {
        self.dir.join(format!("{}.json", blob))
    }

    fn read<T: DeserializeOwned>(&self, blob: &'static str) -> Result<Option<Vec<T>>, DashboardError> {
        let path = self.path(blob);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DashboardError::persistence(blob, e)),
        };

        let value: Value =
            serde_json::from_str(&raw).map_err(|e| DashboardError::persistence(blob, e))?;
        let value = migrate(blob, value)?;
        let envelope: Envelope<T> =
            serde_json::from_value(value).map_err(|e| DashboardError::persistence(blob, e))?;

        tracing::debug!("Loaded {} entries from {}", envelope.data.len(), path.display());
        Ok(Some(envelope.data))
    }

    /// Saves run inside request handlers; on a multi-threaded runtime the
    /// worker hands its other tasks off while the disk write blocks.
    fn write<T: Serialize>(&self, blob: &'static str, data: &[T]) -> Result<(), DashboardError> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.write_file(blob, data))
            }
            _ => self.write_file(blob, data),
        }
    }

    fn write_file<T: Serialize>(&self, blob: &'static str, data: &[T]) -> Result<(), DashboardError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| DashboardError::persistence(blob, e))?;

        let envelope = EnvelopeRef {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            data,
        };
        let json = serde_json::to_string_pretty(&envelope)
            .map_err(|e| DashboardError::persistence(blob, e))?;

        // Write then rename so a crash never leaves a half-written blob behind
        let path = self.path(blob);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| DashboardError::persistence(blob, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| DashboardError::persistence(blob, e))?;
        Ok(())
    }
}

impl DashboardStore for JsonFileStore {
    fn load_widgets(&self) -> Result<Option<Vec<WidgetDefinition>>, DashboardError> {
        self.read(WIDGET_REGISTRY_BLOB)
    }

    fn save_widgets(&self, widgets: &[WidgetDefinition]) -> Result<(), DashboardError> {
        self.write(WIDGET_REGISTRY_BLOB, widgets)
    }

    fn load_layout(&self) -> Result<Option<Vec<LayoutEntry>>, DashboardError> {
        self.read(LAYOUT_BLOB)
    }

    fn save_layout(&self, layout: &[LayoutEntry]) -> Result<(), DashboardError> {
        self.write(LAYOUT_BLOB, layout)
    }
}

/// Bring a stored blob up to [`SCHEMA_VERSION`], one version at a time.
pub fn migrate(blob: &'static str, value: Value) -> Result<Value, DashboardError> {
    let (mut version, mut data) = match value {
        Value::Array(items) => (0, Value::Array(items)),
        Value::Object(mut map) => {
            let version = map
                .get("schemaVersion")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| DashboardError::persistence(blob, "missing schemaVersion"))?;
            let data = map.remove("data").unwrap_or_else(|| Value::Array(Vec::new()));
            (version, data)
        }
        _ => {
            return Err(DashboardError::persistence(
                blob,
                "expected an array or a versioned object",
            ));
        }
    };

    if version > SCHEMA_VERSION {
        return Err(DashboardError::persistence(
            blob,
            format!(
                "schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            ),
        ));
    }

    while version < SCHEMA_VERSION {
        tracing::info!("Migrating {} blob from schema version {}", blob, version);
        data = upgrade(blob, version, data);
        version += 1;
    }

    Ok(json!({ "schemaVersion": version, "data": data }))
}

fn upgrade(blob: &str, from_version: u32, data: Value) -> Value {
    match (blob, from_version) {
        // Unversioned layouts keyed geometry by "i"
        (LAYOUT_BLOB, 0) => match data {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|mut item| {
                        if let Some(obj) = item.as_object_mut() {
                            if !obj.contains_key("widgetId") {
                                if let Some(id) = obj.remove("i") {
                                    obj.insert("widgetId".to_string(), id);
                                }
                            }
                        }
                        item
                    })
                    .collect(),
            ),
            other => other,
        },
        _ => data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::layout::KPI_RULE;
    use crate::domain::widget::{FieldBinding, WidgetDraft, WidgetKind};

    fn widget(id: &str, kind: WidgetKind) -> WidgetDefinition {
        WidgetDraft::new(kind, id, vec![FieldBinding::new("mall", "door", "person_in")])
            .into_definition(id.to_string())
            .unwrap()
    }

    #[test]
    fn test_missing_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state"));

        assert!(store.load_widgets().unwrap().is_none());
        assert!(store.load_layout().unwrap().is_none());
    }

    #[test]
    fn test_registry_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let widgets = vec![
            widget("c", WidgetKind::Graph),
            widget("a", WidgetKind::Kpi),
            widget("b", WidgetKind::Kpi),
        ];

        store.save_widgets(&widgets).unwrap();
        let loaded = store.load_widgets().unwrap().unwrap();

        assert_eq!(loaded, widgets);
        let raw = std::fs::read_to_string(dir.path().join("widgetRegistry.json")).unwrap();
        assert!(raw.contains("\"schemaVersion\": 1"));
        assert!(!dir.path().join("widgetRegistry.json.tmp").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_save_from_multi_threaded_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let layout = vec![LayoutEntry::placed("w1", &KPI_RULE, 0, 0)];

        store.save_layout(&layout).unwrap();

        assert_eq!(store.load_layout().unwrap(), Some(layout));
    }

    #[tokio::test]
    async fn test_save_from_current_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let widgets = vec![widget("a", WidgetKind::Kpi)];

        store.save_widgets(&widgets).unwrap();

        assert_eq!(store.load_widgets().unwrap(), Some(widgets));
    }

    #[test]
    fn test_legacy_layout_array_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = json!([
            {"i": "w1", "x": 0, "y": 0, "w": 4, "h": 3, "minW": 3, "maxW": 6, "minH": 3, "maxH": 4, "static": false}
        ]);
        std::fs::write(dir.path().join("layout.json"), legacy.to_string()).unwrap();

        let store = JsonFileStore::new(dir.path());
        let layout = store.load_layout().unwrap().unwrap();

        assert_eq!(layout, vec![LayoutEntry::placed("w1", &KPI_RULE, 0, 0)]);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let value = json!({"schemaVersion": SCHEMA_VERSION + 1, "data": []});
        let err = migrate(LAYOUT_BLOB, value).unwrap_err();
        assert!(matches!(err, DashboardError::Persistence { blob: "layout", .. }));
    }

    #[test]
    fn test_corrupted_blob_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("widgetRegistry.json"), "{not json").unwrap();

        let store = JsonFileStore::new(dir.path());
        assert!(matches!(
            store.load_widgets(),
            Err(DashboardError::Persistence { .. })
        ));
    }
}
