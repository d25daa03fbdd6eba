// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod http_metrics_repository;
pub mod json_store;
pub mod memory_store;
pub mod sse_stream;
