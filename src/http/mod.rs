//! HTTP surface: routes, handlers and the JSON error envelope.

use std::{sync::Arc, time::Duration};

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::app::AppState;

pub mod beckn;
pub mod compare;
pub mod error;
pub mod health;
pub mod locations;

pub use error::AppError;

fn cors(frontend_url: &str) -> CorsLayer {
    let origin = match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(err) => {
            warn!("Invalid FRONTEND_URL {frontend_url}: {err}; cross-origin requests disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(60 * 60))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/api/health", get(health::health_handler))
        .route("/api/compare", post(compare::compare_handler))
        .route("/api/beckn/on_search", post(beckn::on_search_handler))
        .route("/api/locations/search", get(locations::search_handler))
        .route("/api/locations/reverse", get(locations::reverse_handler))
        .layer(cors(&state.config.frontend_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
