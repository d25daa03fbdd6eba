// Domain layer - Pure dashboard model, no I/O
pub mod catalog;
pub mod errors;
pub mod field;
pub mod icon;
pub mod layout;
pub mod widget;
