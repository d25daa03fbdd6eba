// Presentation layer - HTTP API consumed by the dashboard renderer
pub mod app_state;
pub mod handlers;
