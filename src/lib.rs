// Public API for integration tests and the server binary

pub mod api;
pub mod blob;
pub mod config;
pub mod error;
pub mod state;
pub mod types;
