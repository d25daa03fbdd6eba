// Main entry point - Dependency injection and server setup
use std::sync::Arc;
use axum::{
    Router,
    routing::{delete, get, patch},
};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use dashboard_sync::application::catalog_service::CatalogService;
use dashboard_sync::application::dashboard_service::DashboardService;
use dashboard_sync::application::field_cache::FieldCache;
use dashboard_sync::application::field_poller::FieldPoller;
use dashboard_sync::application::persistence::DashboardStore;
use dashboard_sync::infrastructure::config::load_app_config;
use dashboard_sync::infrastructure::http_metrics_repository::HttpMetricsRepository;
use dashboard_sync::infrastructure::json_store::JsonFileStore;
use dashboard_sync::infrastructure::memory_store::MemoryStore;
use dashboard_sync::presentation::app_state::AppState;
use dashboard_sync::presentation::handlers::{
    add_widget, field_counts, get_dashboard, get_layout, health_check, list_collections,
    list_fields, list_sources, list_widgets, remove_widget, replace_layout, restyle_widget,
    stream_fields,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let app_config = load_app_config()?;
    let poller_settings = app_config.poller_settings()?;
    let addr = app_config.bind_addr()?;

    // Create repository (infrastructure layer)
    let repository = Arc::new(HttpMetricsRepository::new(
        app_config.metrics.base_url.clone(),
        app_config.metrics.token.clone(),
        poller_settings.request_timeout,
    )?);

    let store: Arc<dyn DashboardStore> = match &app_config.storage.dir {
        Some(dir) => {
            tracing::info!("Persisting dashboard state under {}", dir.display());
            Arc::new(JsonFileStore::new(dir.clone()))
        }
        None => {
            tracing::warn!("No storage.dir configured, dashboard state will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };

    // Create services (application layer)
    let poller = FieldPoller::new(repository.clone(), FieldCache::new(), poller_settings);
    tracing::info!(
        "Refreshing fields every {:?} (timeout {:?})",
        poller.settings().interval,
        poller.settings().request_timeout
    );
    let catalog_service = CatalogService::new(repository);
    let dashboard_service = DashboardService::open(store, poller.clone());

    // Create application state
    let state = Arc::new(AppState {
        catalog_service,
        dashboard_service: dashboard_service.clone(),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/catalog/collections", get(list_collections))
        .route("/catalog/sources", get(list_sources))
        .route("/catalog/counts", get(field_counts))
        .route("/dashboard", get(get_dashboard))
        .route("/widgets", get(list_widgets).post(add_widget))
        .route("/widgets/:id", delete(remove_widget))
        .route("/widgets/:id/style", patch(restyle_widget))
        .route("/layout", get(get_layout).put(replace_layout))
        .route("/fields", get(list_fields))
        .route("/fields/stream", get(stream_fields))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    tracing::info!("Starting dashboard-sync service on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dashboard_service.shutdown();
    poller.shutdown();
    tracing::info!("Dashboard-sync service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
