use crate::application::field_poller::PollerSettings;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub metrics: MetricsSettings,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsSettings {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageSettings {
    /// Directory for the registry and layout blobs; in-memory when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_interval_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl AppConfig {
    pub fn poller_settings(&self) -> anyhow::Result<PollerSettings> {
        if self.poller.interval_secs == 0 {
            anyhow::bail!("poller.interval_secs must be greater than zero");
        }
        if self.poller.request_timeout_secs == 0 {
            anyhow::bail!("poller.request_timeout_secs must be greater than zero");
        }
        Ok(PollerSettings {
            interval: Duration::from_secs(self.poller.interval_secs),
            request_timeout: Duration::from_secs(self.poller.request_timeout_secs),
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid server.bind {}: {}", self.server.bind, e))
    }
}

/// Load `config/dashboard.*` overlaid with `DASHBOARD__SECTION__KEY` variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("DASHBOARD")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
