// Dashboard composition and live-data synchronization service
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
