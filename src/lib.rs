//! Folio Server Library
//!
//! The query and relationship-discovery layer of a personal document
//! library.
//!
//! # Modules
//!
//! - `search`: faceted, full-text, keyset-paginated search plus the
//!   smart-collection evaluator
//! - `relations`: embedding-driven relationship inference
//! - `db`: SQLite document and relationship stores
//! - `routes`: thin axum handlers over the above

pub mod config;
pub mod db;
pub mod error;
pub mod relations;
pub mod routes;
pub mod search;
pub mod state;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api/v1/search", routes::search::router())
        .nest("/api/v1/documents", routes::documents::router())
        .nest("/api/v1/smart-collections", routes::smart::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
