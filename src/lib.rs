pub mod config;
pub mod constants;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod site;

// Ports and their adapters for remote access
pub mod app;
pub mod infra;

// Logging and metrics
pub mod observability;
