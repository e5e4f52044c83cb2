//! HTTP routes over a cached query engine.
//!
//! Requests carry WGS84 coordinates; handlers convert them into the plane of
//! the snapshot they pin and convert results back before replying.

use std::{fmt, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use campusmap_core::{DatasetSource, cache::CachedEngine, engine::RetryPolicy};
use tower_http::cors::{Any, CorsLayer};

mod dto;
mod error;
mod handlers;

pub use error::ApiError;

/// Shared state behind every route.
pub struct AppState {
    cached: CachedEngine,
    source: Arc<dyn DatasetSource>,
    retry: RetryPolicy,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("cached", &self.cached)
            .field("source", &self.source.describe())
            .field("retry", &self.retry)
            .finish()
    }
}

impl AppState {
    /// Serve `cached`, reloading from `source` on administrative request.
    pub fn new(cached: CachedEngine, source: Arc<dyn DatasetSource>, retry: RetryPolicy) -> Self {
        Self {
            cached,
            source,
            retry,
        }
    }
}

/// Build the router. Any origin may call it.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/nearest", get(handlers::nearest))
        .route("/route", get(handlers::route))
        .route("/features", get(handlers::features))
        .route("/rooms/find", get(handlers::find_room))
        .route("/buildings", get(handlers::buildings))
        .route("/health", get(handlers::health))
        .route("/reload", post(handlers::reload))
        .route("/cache/clear", post(handlers::clear_cache))
        .layer(cors)
        .with_state(state)
}
