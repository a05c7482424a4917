//! Document API routes
//!
//! A deliberately thin ingest/read seam: full CRUD lives with the
//! surrounding system. The embedding endpoint is the relationship
//! engine's sole trigger - storing a vector immediately runs inference
//! for that document.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{Document, DocumentStore, NewDocument, RelationshipEdge, RelationshipStore};
use crate::error::{AppError, Result};
use crate::relations::{RelationReport, RelationshipEngine};
use crate::state::AppState;

/// Create the documents router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_document))
        .route("/:id", get(get_document))
        .route("/:id/embedding", put(set_embedding))
        .route("/:id/relationships", get(list_relationships))
}

/// Owner scope for read endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub owner_id: String,
}

/// Ingest a document record
///
/// POST /api/v1/documents
async fn create_document(
    State(state): State<AppState>,
    Json(data): Json<NewDocument>,
) -> Result<Json<Document>> {
    if data.owner_id.trim().is_empty() {
        return Err(AppError::Validation("ownerId is required".to_string()));
    }
    if data.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }

    let document = DocumentStore::new(state.db()).insert(&data).await?;
    Ok(Json(document))
}

/// Fetch a single document
///
/// GET /api/v1/documents/:id?ownerId=...
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Document>> {
    let document = DocumentStore::new(state.db())
        .get(&query.owner_id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("document {id}")))?;

    Ok(Json(document))
}

/// Embedding write request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetEmbeddingRequest {
    pub owner_id: String,
    pub embedding: Vec<f32>,
}

/// Embedding write response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetEmbeddingResponse {
    pub document_id: String,
    #[serde(flatten)]
    pub report: RelationReport,
}

/// Store a document's embedding and run relationship inference
///
/// PUT /api/v1/documents/:id/embedding
async fn set_embedding(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SetEmbeddingRequest>,
) -> Result<Json<SetEmbeddingResponse>> {
    if request.embedding.is_empty() {
        return Err(AppError::Validation("embedding must not be empty".to_string()));
    }

    let store = DocumentStore::new(state.db());
    let updated = store
        .set_embedding(&request.owner_id, &id, &request.embedding)
        .await?;
    if !updated {
        return Err(AppError::NotFound(format!("document {id}")));
    }

    let engine = RelationshipEngine::new(state.db(), &state.config().relations);
    let report = engine
        .on_embedding_available(&request.owner_id, &id)
        .await?;

    Ok(Json(SetEmbeddingResponse {
        document_id: id,
        report,
    }))
}

/// Relationship list response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipList {
    pub document_id: String,
    pub count: usize,
    pub relationships: Vec<RelationshipEdge>,
}

/// List a document's edges, strongest first
///
/// GET /api/v1/documents/:id/relationships?ownerId=...
async fn list_relationships(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<RelationshipList>> {
    let relationships = RelationshipStore::new(state.db())
        .list_for_document(&query.owner_id, &id)
        .await?;

    Ok(Json(RelationshipList {
        document_id: id,
        count: relationships.len(),
        relationships,
    }))
}
