pub mod app;
pub mod auth;
pub mod authz;
pub mod config;
pub mod db;
pub mod docs;
pub mod errors;
pub mod models;
pub mod oauth;
pub mod routes;
pub mod session;

// Re-export commonly used items for tests
pub use app::{create_app, AppState};
pub use config::AppConfig;
