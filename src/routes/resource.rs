//! Resource routes: everything under the mount prefix goes to one dispatcher.
//! `<prefix>/async/:id` reports queued requests.

use crate::handlers::{dispatch, job_status};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

pub fn resource_routes(state: AppState) -> Router {
    let prefix = state.settings.api_prefix.clone();
    let limit = state.settings.max_body_bytes;
    Router::new()
        .route(&format!("{}/async/:id", prefix), get(job_status))
        .route(&format!("{}/*path", prefix), any(dispatch))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}
