// HTTP request handlers
use crate::application::dashboard_service::DashboardSnapshot;
use crate::domain::errors::DashboardError;
use crate::domain::field::{CachedValue, FieldKey};
use crate::domain::layout::LayoutEntry;
use crate::domain::widget::{StyleEdit, WidgetDefinition, WidgetDraft};
use crate::infrastructure::sse_stream::sse_from_receiver;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct SourcesQuery {
    pub collection: String,
}

#[derive(Deserialize)]
pub struct CountsQuery {
    pub collection: String,
    pub source: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    pub key: FieldKey,
    #[serde(flatten)]
    pub cached: CachedValue,
}

/// Maps caller-visible dashboard errors onto HTTP statuses
pub struct ApiError(DashboardError);

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            DashboardError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::StateInconsistency { .. } => StatusCode::CONFLICT,
            DashboardError::UnknownWidget { .. } => StatusCode::NOT_FOUND,
            DashboardError::TransientFetch { .. } | DashboardError::Persistence { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if !self.0.is_caller_visible() {
            tracing::error!("Internal dashboard error: {}", self.0);
            return (status, Json(json!({ "error": "internal error" }))).into_response();
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn upstream_error(what: &str, err: anyhow::Error) -> Response {
    tracing::warn!("Error fetching {}: {:#}", what, err);
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": format!("metrics service unavailable: {}", what) })),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_collections(State(state): State<Arc<AppState>>) -> Response {
    match state.catalog_service.list_collections().await {
        Ok(collections) => Json(json!({ "collections": collections })).into_response(),
        Err(e) => upstream_error("collections", e),
    }
}

pub async fn list_sources(
    Query(query): Query<SourcesQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.catalog_service.list_sources(&query.collection).await {
        Ok(sources) => Json(json!({ "videoSources": sources })).into_response(),
        Err(e) => upstream_error("sources", e),
    }
}

pub async fn field_counts(
    Query(query): Query<CountsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state
        .catalog_service
        .field_counts(&query.collection, &query.source)
        .await
    {
        Ok(counts) => Json(json!({ "fieldCounts": counts })).into_response(),
        Err(e) => upstream_error("field counts", e),
    }
}

/// Widgets with their geometry and latest values
pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> Json<DashboardSnapshot> {
    Json(state.dashboard_service.snapshot())
}

pub async fn list_widgets(State(state): State<Arc<AppState>>) -> Json<Vec<WidgetDefinition>> {
    Json(state.dashboard_service.widgets())
}

pub async fn add_widget(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<WidgetDraft>,
) -> Result<(StatusCode, Json<WidgetDefinition>), ApiError> {
    let widget = state.dashboard_service.add_widget(draft)?;
    Ok((StatusCode::CREATED, Json(widget)))
}

/// Removing an absent widget is not an error
pub async fn remove_widget(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> StatusCode {
    state.dashboard_service.remove_widget(&id);
    StatusCode::NO_CONTENT
}

pub async fn restyle_widget(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(edit): Json<StyleEdit>,
) -> Result<Json<WidgetDefinition>, ApiError> {
    Ok(Json(state.dashboard_service.restyle_widget(&id, &edit)?))
}

pub async fn get_layout(State(state): State<Arc<AppState>>) -> Json<Vec<LayoutEntry>> {
    Json(state.dashboard_service.layout())
}

/// Replace the whole layout after a drag or resize
pub async fn replace_layout(
    State(state): State<Arc<AppState>>,
    Json(entries): Json<Vec<LayoutEntry>>,
) -> Result<Json<Vec<LayoutEntry>>, ApiError> {
    Ok(Json(state.dashboard_service.replace_layout(entries)?))
}

pub async fn list_fields(State(state): State<Arc<AppState>>) -> Json<Vec<FieldValue>> {
    let values = state
        .dashboard_service
        .poller()
        .cache()
        .snapshot()
        .into_iter()
        .map(|(key, cached)| FieldValue { key, cached })
        .collect();
    Json(values)
}

/// Stream field updates as Server-Sent Events
pub async fn stream_fields(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rx = state.dashboard_service.poller().subscribe_updates();
    sse_from_receiver(rx)
}
