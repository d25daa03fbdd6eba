// Repository trait for metrics service access
use crate::domain::catalog::VideoSource;
use crate::domain::field::FieldKey;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[async_trait]
pub trait MetricsRepository: Send + Sync {
    /// List all collections known to the metrics service
    async fn list_collections(&self) -> anyhow::Result<Vec<String>>;

    /// List the video sources of a collection with their event counts
    async fn list_sources(&self, collection: &str) -> anyhow::Result<Vec<VideoSource>>;

    /// Every rule count for one collection + source
    async fn field_counts(&self, collection: &str, source: &str) -> anyhow::Result<BTreeMap<String, f64>>;

    /// The count of a single rule; `None` when the service does not report it
    async fn rule_count(&self, key: &FieldKey) -> anyhow::Result<Option<f64>>;
}
