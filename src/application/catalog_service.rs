// Catalog service - Lookups backing the widget configuration flow
use crate::application::metrics_repository::MetricsRepository;
use crate::domain::catalog::VideoSource;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct CatalogService {
    repository: Arc<dyn MetricsRepository>,
}

impl CatalogService {
    pub fn new(repository: Arc<dyn MetricsRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_collections(&self) -> anyhow::Result<Vec<String>> {
        let mut collections = self.repository.list_collections().await?;
        collections.sort();
        collections.dedup();
        Ok(collections)
    }

    pub async fn list_sources(&self, collection: &str) -> anyhow::Result<Vec<VideoSource>> {
        let mut sources = self.repository.list_sources(collection).await?;
        // Busiest sources first, then by name
        sources.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));
        Ok(sources)
    }

    pub async fn field_counts(&self, collection: &str, source: &str) -> anyhow::Result<BTreeMap<String, f64>> {
        self.repository.field_counts(collection, source).await
    }
}
