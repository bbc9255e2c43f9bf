//! Application wiring (axum router + service construction).
//!
//! - `services.rs`: gateway/session/registry/notifier construction
//! - `dispatcher.rs`: the front-controller pipeline
//! - `errors.rs`: fault-to-response mapping

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use col_dispatch::CommandRegistry;

use crate::config::AppConfig;
use crate::middleware::{self, SessionState};

pub mod dispatcher;
pub mod errors;
pub mod services;

/// Shared state the dispatch pipeline reads on every request.
pub struct AppState {
    pub config: AppConfig,
    pub registry: CommandRegistry,
}

/// Build the router: one public health probe, everything else behind the
/// session check.
pub fn build_app(state: Arc<AppState>, session_state: SessionState) -> Router {
    let protected = Router::new()
        .route(
            "/",
            get(dispatcher::handle_read).post(dispatcher::handle_write),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    session_state,
                    middleware::session_middleware,
                ))
                .layer(Extension(state)),
        );

    Router::new()
        .route("/health", get(health))
        .merge(protected)
}

async fn health() -> &'static str {
    "ok"
}
