//! Relationship store operations
//!
//! Edges are directional rows; the inference engine writes both
//! directions of a discovered pair. Inserts are first-write-wins: an
//! existing edge for an ordered pair is left untouched so re-discovery
//! never churns scores or reorders a stable graph.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;

/// A directed, scored link between two documents of the same owner
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipEdge {
    pub id: String,
    pub owner_id: String,
    pub document_id: String,
    pub related_document_id: String,
    pub kind: String,
    /// Relevance in [0, 100], identical in both directions of a pair
    pub score: f64,
    pub description: String,
    pub status: String,
    pub created_at: String,
}

/// Relationship repository
pub struct RelationshipStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RelationshipStore<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an edge unless one already exists for the ordered pair
    ///
    /// Returns the created edge, or None when the pair was already linked.
    /// The UNIQUE(document_id, related_document_id) constraint makes a
    /// concurrent duplicate insert no-op safely.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_if_absent(
        &self,
        owner_id: &str,
        document_id: &str,
        related_document_id: &str,
        kind: &str,
        score: f64,
        description: &str,
        status: &str,
    ) -> Result<Option<RelationshipEdge>> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO document_relationships
                (id, owner_id, document_id, related_document_id, kind, score,
                 description, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (document_id, related_document_id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(owner_id)
        .bind(document_id)
        .bind(related_document_id)
        .bind(kind)
        .bind(score)
        .bind(description)
        .bind(status)
        .bind(&now)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(RelationshipEdge {
            id,
            owner_id: owner_id.to_string(),
            document_id: document_id.to_string(),
            related_document_id: related_document_id.to_string(),
            kind: kind.to_string(),
            score,
            description: description.to_string(),
            status: status.to_string(),
            created_at: now,
        }))
    }

    /// List edges originating at a document, strongest first
    pub async fn list_for_document(
        &self,
        owner_id: &str,
        document_id: &str,
    ) -> Result<Vec<RelationshipEdge>> {
        let edges = sqlx::query_as::<_, RelationshipEdge>(
            r#"
            SELECT id, owner_id, document_id, related_document_id, kind, score,
                   description, status, created_at
            FROM document_relationships
            WHERE owner_id = ? AND document_id = ?
            ORDER BY score DESC, related_document_id ASC
            "#,
        )
        .bind(owner_id)
        .bind(document_id)
        .fetch_all(self.pool)
        .await?;

        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn insert_if_absent_is_first_write_wins() {
        let pool = memory_pool().await;
        let store = RelationshipStore::new(&pool);

        let first = store
            .insert_if_absent("alice", "a", "b", "shared_topic", 72.5, "auto", "completed")
            .await
            .unwrap();
        assert!(first.is_some());

        // Re-discovery with a different score must not overwrite
        let second = store
            .insert_if_absent("alice", "a", "b", "identical", 99.0, "auto", "completed")
            .await
            .unwrap();
        assert!(second.is_none());

        let edges = store.list_for_document("alice", "a").await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, "shared_topic");
        assert_eq!(edges[0].score, 72.5);
    }

    #[tokio::test]
    async fn reverse_direction_is_a_distinct_row() {
        let pool = memory_pool().await;
        let store = RelationshipStore::new(&pool);

        store
            .insert_if_absent("alice", "a", "b", "identical", 95.0, "auto", "completed")
            .await
            .unwrap();
        let reverse = store
            .insert_if_absent("alice", "b", "a", "identical", 95.0, "auto", "completed")
            .await
            .unwrap();
        assert!(reverse.is_some());

        assert_eq!(store.list_for_document("alice", "a").await.unwrap().len(), 1);
        assert_eq!(store.list_for_document("alice", "b").await.unwrap().len(), 1);
    }
}
