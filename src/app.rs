use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::plays_page))
        .route("/stats", get(handlers::stats_page))
        .route("/login", get(handlers::login_form).post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/api/health", get(handlers::health))
        .route("/api/stats", get(handlers::stats_buckets))
        .with_state(state)
}
