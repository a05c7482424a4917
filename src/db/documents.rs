//! Document store operations
//!
//! Every read and write here is scoped to a single owner. Embeddings are
//! stored as little-endian f32 BLOBs and similarity is computed in Rust;
//! a linear scan over one owner's library is fine for a personal
//! collection and can move to a vector index later without changing the
//! call surface.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Column list shared by every document SELECT. The embedding BLOB is
/// deliberately not part of it; vectors are fetched on their own.
pub const DOCUMENT_COLUMNS: &str = "d.id, d.owner_id, d.title, d.file_name, d.media_type, \
     d.file_size, d.page_count, d.progress, d.last_read_position, d.last_read_at, \
     d.is_favorite, d.note_count, d.session_count, d.archived_at, d.series_id, \
     d.series_order, d.created_at, d.updated_at";

/// One item in a user's library
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub file_name: String,
    pub media_type: String,
    pub file_size: i64,
    pub page_count: Option<i64>,
    /// Reading progress fraction, 0..100
    pub progress: f64,
    pub last_read_position: Option<String>,
    /// RFC3339 UTC; sorts lexicographically, which keyset pagination relies on
    pub last_read_at: Option<String>,
    pub is_favorite: bool,
    pub note_count: i64,
    pub session_count: i64,
    pub archived_at: Option<String>,
    pub series_id: Option<String>,
    pub series_order: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Create document request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub owner_id: String,
    pub title: String,
    pub file_name: String,
    pub media_type: String,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub page_count: Option<i64>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub series_order: Option<i64>,
}

/// A typed bind value for dynamically assembled SQL
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Real(f64),
}

/// Nearest-neighbor lookup result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighbor {
    pub document_id: String,
    pub similarity: f64,
}

/// Document repository
pub struct DocumentStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DocumentStore<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a document, scoped to its owner
    pub async fn get(&self, owner_id: &str, id: &str) -> Result<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.owner_id = ? AND d.id = ?"
        ))
        .bind(owner_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(document)
    }

    /// Insert a new document
    pub async fn insert(&self, data: &NewDocument) -> Result<Document> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, title, file_name, media_type, file_size,
                                   page_count, is_favorite, series_id, series_order,
                                   created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&data.owner_id)
        .bind(&data.title)
        .bind(&data.file_name)
        .bind(&data.media_type)
        .bind(data.file_size)
        .bind(data.page_count)
        .bind(data.is_favorite)
        .bind(&data.series_id)
        .bind(data.series_order)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.get(&data.owner_id, &id).await?.ok_or_else(|| {
            AppError::Internal("Failed to fetch created document".to_string())
        })
    }

    /// Store or replace a document's embedding vector
    ///
    /// Returns false when the document does not exist for this owner.
    pub async fn set_embedding(&self, owner_id: &str, id: &str, vector: &[f32]) -> Result<bool> {
        let blob = embedding_to_blob(vector);
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE documents SET embedding = ?, updated_at = ? WHERE owner_id = ? AND id = ?",
        )
        .bind(blob)
        .bind(&now)
        .bind(owner_id)
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch a document's embedding vector, if computed
    pub async fn embedding(&self, owner_id: &str, id: &str) -> Result<Option<Vec<f32>>> {
        let row: Option<(Option<Vec<u8>>,)> = sqlx::query_as(
            "SELECT embedding FROM documents WHERE owner_id = ? AND id = ?",
        )
        .bind(owner_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.and_then(|(blob,)| blob).map(|blob| blob_to_embedding(&blob)))
    }

    /// Nearest neighbors by cosine similarity among the owner's documents
    ///
    /// Only candidates with a computed embedding and similarity at or above
    /// the threshold qualify; results are ordered by similarity descending
    /// and truncated to `limit`. Candidates with a mismatched vector length
    /// are skipped with a warning.
    pub async fn nearest_neighbors(
        &self,
        owner_id: &str,
        vector: &[f32],
        exclude_id: &str,
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<Neighbor>> {
        let rows: Vec<(String, Vec<u8>)> = sqlx::query_as(
            r#"
            SELECT id, embedding
            FROM documents
            WHERE owner_id = ? AND id != ? AND embedding IS NOT NULL
            "#,
        )
        .bind(owner_id)
        .bind(exclude_id)
        .fetch_all(self.pool)
        .await?;

        let mut neighbors: Vec<Neighbor> = Vec::new();

        for (id, blob) in rows {
            let candidate = blob_to_embedding(&blob);
            if candidate.len() != vector.len() {
                tracing::warn!(
                    document_id = %id,
                    expected = vector.len(),
                    actual = candidate.len(),
                    "skipping candidate with mismatched embedding length"
                );
                continue;
            }

            let similarity = cosine_similarity(vector, &candidate);
            if similarity >= threshold {
                neighbors.push(Neighbor {
                    document_id: id,
                    similarity,
                });
            }
        }

        neighbors.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        neighbors.truncate(limit);

        Ok(neighbors)
    }

    /// Execute an assembled document query with typed binds
    pub async fn fetch(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Document>> {
        let mut query = sqlx::query_as::<_, Document>(sql);

        for param in params {
            query = match param {
                SqlParam::Text(v) => query.bind(v.clone()),
                SqlParam::Int(v) => query.bind(*v),
                SqlParam::Real(v) => query.bind(*v),
            };
        }

        Ok(query.fetch_all(self.pool).await?)
    }

    /// Add a document to a collection (membership record only)
    pub async fn add_to_collection(&self, collection_id: &str, document_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO collection_documents (collection_id, document_id) VALUES (?, ?)",
        )
        .bind(collection_id)
        .bind(document_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Tag a document (membership record only)
    pub async fn add_tag(&self, tag_id: &str, document_id: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO document_tags (tag_id, document_id) VALUES (?, ?)")
            .bind(tag_id)
            .bind(document_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }
}

/// Convert an f32 embedding to a little-endian BLOB
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Convert a little-endian BLOB back to an f32 embedding
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("chunks_exact yields 4 bytes")))
        .collect()
}

/// Cosine similarity between two vectors, `1 - cosine_distance`
///
/// Zero-magnitude vectors yield 0.0 rather than NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    dot / denom
}
