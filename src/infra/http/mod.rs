//! HTTP surface: routes, JSON mapping and request logging.

pub mod error;
mod handlers;
pub mod middleware;
mod state;

pub use error::ApiError;
pub use state::HttpState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use self::middleware::{log_responses, set_request_context};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::health))
        .route(
            "/api/subfeddit/{name}/comments",
            get(handlers::list_comments),
        )
        .route("/api/sentiment/analyze", post(handlers::analyze_sentiment))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
