//! Search API routes

use axum::{extract::State, routing::post, Json, Router};

use crate::error::Result;
use crate::search::{ResultPage, SearchEngine, SearchRequest};
use crate::state::AppState;

/// Create the search router
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(search))
}

/// Faceted, cursor-paginated document search
///
/// POST /api/v1/search
async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<ResultPage>> {
    let engine = SearchEngine::new(state.db(), &state.config().search);
    let page = engine.search(&request).await?;
    Ok(Json(page))
}
