pub mod api;
pub mod app;
pub mod auth;
pub mod buckets;
pub mod config;
pub mod errors;
pub mod format;
pub mod handlers;
pub mod models;
pub mod resource;
pub mod state;
pub mod task;
pub mod ui;
pub mod views;

pub use app::router;
pub use config::Config;
pub use state::AppState;
