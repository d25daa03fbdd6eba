// HTTP metrics service repository implementation
use crate::application::metrics_repository::MetricsRepository;
use crate::domain::catalog::VideoSource;
use crate::domain::field::FieldKey;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpMetricsRepository {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CollectionsResponse {
    collections: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourcesResponse {
    video_sources: Vec<SourceCount>,
}

#[derive(Debug, Deserialize)]
struct SourceCount {
    source: String,
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldCountsResponse {
    #[serde(default)]
    field_counts: BTreeMap<String, f64>,
}

impl HttpMetricsRepository {
    pub fn new(base_url: String, token: Option<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build metrics HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            client,
        })
    }

    fn build_url(&self, path: &str, params: &[(&str, &str)]) -> String {
        let query: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
            .collect();

        if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query.join("&"))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = self.build_url(path, params);
        tracing::debug!("GET {}", url);

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Metrics service {} failed with status {}: {}", path, status, body);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse metrics service response for {}", path))
    }
}

#[async_trait]
impl MetricsRepository for HttpMetricsRepository {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let response: CollectionsResponse = self.get_json("/collections", &[]).await?;
        Ok(response.collections)
    }

    async fn list_sources(&self, collection: &str) -> Result<Vec<VideoSource>> {
        let response: SourcesResponse = self
            .get_json("/sources", &[("collection", collection)])
            .await?;

        Ok(response
            .video_sources
            .into_iter()
            .map(|s| VideoSource::new(s.source, s.count))
            .collect())
    }

    async fn field_counts(&self, collection: &str, source: &str) -> Result<BTreeMap<String, f64>> {
        let response: FieldCountsResponse = self
            .get_json("/counts", &[("collection", collection), ("source", source)])
            .await?;
        Ok(response.field_counts)
    }

    async fn rule_count(&self, key: &FieldKey) -> Result<Option<f64>> {
        let response: FieldCountsResponse = self
            .get_json(
                "/counts",
                &[
                    ("collection", key.collection.as_str()),
                    ("source", key.source.as_str()),
                    ("rule", key.rule.as_str()),
                ],
            )
            .await?;
        Ok(response.field_counts.get(&key.rule).copied())
    }
}
