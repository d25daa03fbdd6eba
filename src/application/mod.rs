// Application layer - Services and the ports they depend on
pub mod catalog_service;
pub mod dashboard_service;
pub mod field_cache;
pub mod field_poller;
pub mod layout_engine;
pub mod metrics_repository;
pub mod persistence;
pub mod widget_registry;

#[cfg(test)]
pub mod test_support;
