//! Smart-collection API routes

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::Document;
use crate::error::Result;
use crate::search::{evaluate_smart_collection, SmartCollectionRule};
use crate::state::AppState;

/// Create the smart-collections router
pub fn router() -> Router<AppState> {
    Router::new().route("/evaluate", post(evaluate))
}

/// Evaluation request: an owner plus a stored rule definition
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub owner_id: String,
    #[serde(default)]
    pub rule: SmartCollectionRule,
}

/// Evaluation response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub count: usize,
    pub documents: Vec<Document>,
}

/// Evaluate a smart-collection rule on demand
///
/// POST /api/v1/smart-collections/evaluate
async fn evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>> {
    let documents = evaluate_smart_collection(
        state.db(),
        &request.owner_id,
        &request.rule,
        &state.config().search,
    )
    .await?;

    Ok(Json(EvaluateResponse {
        count: documents.len(),
        documents,
    }))
}
