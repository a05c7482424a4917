//! Relationship inference engine
//!
//! Triggered whenever a document's embedding is created or replaced;
//! there is no scheduled sweep. Queries the owner's nearest neighbors,
//! classifies each by similarity band, and writes both directions of
//! every qualifying pair idempotently.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::RelationConfig;
use crate::db::{DocumentStore, RelationshipEdge, RelationshipStore};
use crate::error::{AppError, Result};

/// Provenance string for automatically derived edges, distinguishing
/// them from any manually curated ones.
pub const AUTO_EDGE_DESCRIPTION: &str = "Derived automatically from embedding similarity";

/// Relationship taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Identical,
    Extension,
    SharedTopic,
    Tangential,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Identical => "identical",
            RelationshipKind::Extension => "extension",
            RelationshipKind::SharedTopic => "shared_topic",
            RelationshipKind::Tangential => "tangential",
        }
    }
}

/// Similarity bands, evaluated top-down, first match wins.
///
/// Tangential is the fallback below every band: it is never produced
/// under the default 0.70 candidate threshold and becomes reachable only
/// when the threshold is configured lower. That asymmetry is deliberate;
/// the kind exists for manually curated and lower-confidence paths.
const BANDS: &[(f64, RelationshipKind)] = &[
    (0.90, RelationshipKind::Identical),
    (0.80, RelationshipKind::Extension),
    (0.70, RelationshipKind::SharedTopic),
];

/// Classify a similarity score into a relationship kind
pub fn classify(similarity: f64) -> RelationshipKind {
    for (threshold, kind) in BANDS {
        if similarity >= *threshold {
            return *kind;
        }
    }
    RelationshipKind::Tangential
}

/// Stored relevance: similarity scaled to [0, 100], two decimal places
pub fn relevance_score(similarity: f64) -> f64 {
    (similarity * 10_000.0).round() / 100.0
}

/// A candidate whose edge creation failed and was skipped
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedCandidate {
    pub document_id: String,
    pub similarity: f64,
    pub reason: String,
}

/// Outcome of one embedding-triggered inference pass
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationReport {
    /// Edges actually inserted this pass (existing pairs are untouched
    /// and do not appear here)
    pub created: Vec<RelationshipEdge>,
    /// Candidates skipped by a per-candidate failure; partial success is
    /// surfaced, never swallowed
    pub skipped: Vec<SkippedCandidate>,
}

/// Embedding-driven edge discovery
pub struct RelationshipEngine<'a> {
    pool: &'a SqlitePool,
    config: RelationConfig,
}

impl<'a> RelationshipEngine<'a> {
    pub fn new(pool: &'a SqlitePool, config: &RelationConfig) -> Self {
        Self {
            pool,
            config: config.clone(),
        }
    }

    /// Discover and persist edges for a freshly embedded document
    ///
    /// No-ops (zero edges, no error) when the document has no embedding
    /// yet; embeddings may legitimately lag behind ingestion. A failure
    /// fetching candidates is fatal for the invocation; a failure on one
    /// candidate's writes skips that candidate and continues.
    pub async fn on_embedding_available(
        &self,
        owner_id: &str,
        document_id: &str,
    ) -> Result<RelationReport> {
        let documents = DocumentStore::new(self.pool);

        if documents.get(owner_id, document_id).await?.is_none() {
            return Err(AppError::NotFound(format!("document {document_id}")));
        }

        let Some(vector) = documents.embedding(owner_id, document_id).await? else {
            tracing::debug!(document_id, "no embedding yet, nothing to infer");
            return Ok(RelationReport::default());
        };

        let neighbors = documents
            .nearest_neighbors(
                owner_id,
                &vector,
                document_id,
                self.config.similarity_threshold,
                self.config.max_neighbors,
            )
            .await?;

        let edges = RelationshipStore::new(self.pool);
        let mut report = RelationReport::default();

        for neighbor in neighbors {
            let kind = classify(neighbor.similarity);
            let score = relevance_score(neighbor.similarity);

            if let Err(e) = self
                .link_pair(
                    &edges,
                    owner_id,
                    document_id,
                    &neighbor.document_id,
                    kind,
                    score,
                    &mut report.created,
                )
                .await
            {
                tracing::warn!(
                    candidate = %neighbor.document_id,
                    error = %e,
                    "skipping candidate after edge write failure"
                );
                report.skipped.push(SkippedCandidate {
                    document_id: neighbor.document_id,
                    similarity: neighbor.similarity,
                    reason: e.to_string(),
                });
            }
        }

        tracing::info!(
            document_id,
            created = report.created.len(),
            skipped = report.skipped.len(),
            "relationship inference complete"
        );

        Ok(report)
    }

    /// Write both directions of a pair; existing directions are left as-is.
    ///
    /// Inserted edges are recorded in `created` as they land, so if the
    /// reverse write fails the already-persisted forward edge is still
    /// reported; the report always reflects the store.
    #[allow(clippy::too_many_arguments)]
    async fn link_pair(
        &self,
        edges: &RelationshipStore<'_>,
        owner_id: &str,
        source_id: &str,
        related_id: &str,
        kind: RelationshipKind,
        score: f64,
        created: &mut Vec<RelationshipEdge>,
    ) -> Result<()> {
        for (from, to) in [(source_id, related_id), (related_id, source_id)] {
            if let Some(edge) = edges
                .insert_if_absent(
                    owner_id,
                    from,
                    to,
                    kind.as_str(),
                    score,
                    AUTO_EDGE_DESCRIPTION,
                    "completed",
                )
                .await?
            {
                created.push(edge);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memory_pool, NewDocument};

    #[test]
    fn bands_classify_top_down() {
        assert_eq!(classify(1.0), RelationshipKind::Identical);
        assert_eq!(classify(0.90), RelationshipKind::Identical);
        assert_eq!(classify(0.899), RelationshipKind::Extension);
        assert_eq!(classify(0.80), RelationshipKind::Extension);
        assert_eq!(classify(0.799), RelationshipKind::SharedTopic);
        assert_eq!(classify(0.70), RelationshipKind::SharedTopic);
        // Reachable only when the candidate threshold is configured below 0.70
        assert_eq!(classify(0.5), RelationshipKind::Tangential);
    }

    #[test]
    fn relevance_rounds_to_two_decimals() {
        assert_eq!(relevance_score(0.95), 95.0);
        assert_eq!(relevance_score(0.70711), 70.71);
        assert_eq!(relevance_score(0.123456), 12.35);
        assert_eq!(relevance_score(1.0), 100.0);
    }

    async fn seed_with_embedding(
        pool: &sqlx::SqlitePool,
        owner: &str,
        title: &str,
        embedding: Option<&[f32]>,
    ) -> String {
        let store = DocumentStore::new(pool);
        let doc = store
            .insert(&NewDocument {
                owner_id: owner.to_string(),
                title: title.to_string(),
                file_name: format!("{title}.epub"),
                media_type: "application/epub+zip".to_string(),
                file_size: 0,
                page_count: None,
                is_favorite: false,
                series_id: None,
                series_order: None,
            })
            .await
            .unwrap();

        if let Some(vector) = embedding {
            store.set_embedding(owner, &doc.id, vector).await.unwrap();
        }

        doc.id
    }

    #[tokio::test]
    async fn creates_symmetric_edges_with_banded_kind() {
        let pool = memory_pool().await;
        let engine = RelationshipEngine::new(&pool, &RelationConfig::default());

        // cosine(e1, e2) = 0.95
        let d1 = seed_with_embedding(&pool, "alice", "D1", Some(&[1.0, 0.0])).await;
        let d2 = seed_with_embedding(&pool, "alice", "D2", Some(&[0.95, 0.312_25])).await;

        let report = engine.on_embedding_available("alice", &d1).await.unwrap();
        assert_eq!(report.created.len(), 2);
        assert!(report.skipped.is_empty());

        let edges = RelationshipStore::new(&pool);
        let forward = edges.list_for_document("alice", &d1).await.unwrap();
        let reverse = edges.list_for_document("alice", &d2).await.unwrap();
        assert_eq!(forward.len(), 1);
        assert_eq!(reverse.len(), 1);

        for edge in [&forward[0], &reverse[0]] {
            assert_eq!(edge.kind, "identical");
            assert_eq!(edge.score, 95.0);
            assert_eq!(edge.status, "completed");
            assert_eq!(edge.description, AUTO_EDGE_DESCRIPTION);
        }
        assert_eq!(forward[0].related_document_id, d2);
        assert_eq!(reverse[0].related_document_id, d1);
    }

    #[tokio::test]
    async fn reinvocation_creates_no_additional_edges() {
        let pool = memory_pool().await;
        let engine = RelationshipEngine::new(&pool, &RelationConfig::default());

        let d1 = seed_with_embedding(&pool, "alice", "D1", Some(&[1.0, 0.0])).await;
        let d2 = seed_with_embedding(&pool, "alice", "D2", Some(&[0.95, 0.312_25])).await;

        let first = engine.on_embedding_available("alice", &d1).await.unwrap();
        assert_eq!(first.created.len(), 2);

        let again = engine.on_embedding_available("alice", &d1).await.unwrap();
        assert!(again.created.is_empty());

        // Triggering from the other side is also a no-op
        let from_other = engine.on_embedding_available("alice", &d2).await.unwrap();
        assert!(from_other.created.is_empty());

        let edges = RelationshipStore::new(&pool);
        assert_eq!(edges.list_for_document("alice", &d1).await.unwrap().len(), 1);
        assert_eq!(edges.list_for_document("alice", &d2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn below_threshold_candidates_are_excluded() {
        let pool = memory_pool().await;
        let engine = RelationshipEngine::new(&pool, &RelationConfig::default());

        let d1 = seed_with_embedding(&pool, "alice", "D1", Some(&[1.0, 0.0])).await;
        // cosine = 0.60, below the 0.70 default threshold
        seed_with_embedding(&pool, "alice", "D2", Some(&[0.60, 0.80])).await;

        let report = engine.on_embedding_available("alice", &d1).await.unwrap();
        assert!(report.created.is_empty());
    }

    #[tokio::test]
    async fn never_links_across_owners() {
        let pool = memory_pool().await;
        let engine = RelationshipEngine::new(&pool, &RelationConfig::default());

        let d1 = seed_with_embedding(&pool, "alice", "D1", Some(&[1.0, 0.0])).await;
        let foreign = seed_with_embedding(&pool, "bob", "D2", Some(&[1.0, 0.0])).await;

        let report = engine.on_embedding_available("alice", &d1).await.unwrap();
        assert!(report.created.is_empty());

        let edges = RelationshipStore::new(&pool);
        assert!(edges.list_for_document("alice", &d1).await.unwrap().is_empty());
        assert!(edges.list_for_document("bob", &foreign).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_embedding_is_a_no_op_not_an_error() {
        let pool = memory_pool().await;
        let engine = RelationshipEngine::new(&pool, &RelationConfig::default());

        let d1 = seed_with_embedding(&pool, "alice", "D1", None).await;
        seed_with_embedding(&pool, "alice", "D2", Some(&[1.0, 0.0])).await;

        let report = engine.on_embedding_available("alice", &d1).await.unwrap();
        assert!(report.created.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let pool = memory_pool().await;
        let engine = RelationshipEngine::new(&pool, &RelationConfig::default());

        let err = engine
            .on_embedding_available("alice", "no-such-doc")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    /// Make every relationship insert touching `document_id` fail, in the
    /// given direction(s). Stands in for a transient store failure.
    async fn reject_edge_writes(pool: &sqlx::SqlitePool, document_id: &str, both_directions: bool) {
        let condition = if both_directions {
            format!(
                "NEW.document_id = '{document_id}' OR NEW.related_document_id = '{document_id}'"
            )
        } else {
            format!("NEW.document_id = '{document_id}'")
        };
        sqlx::query(&format!(
            "CREATE TRIGGER reject_edge_writes BEFORE INSERT ON document_relationships \
             WHEN {condition} \
             BEGIN SELECT RAISE(ABORT, 'edge write rejected'); END"
        ))
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn failed_candidate_is_skipped_and_the_rest_proceed() {
        let pool = memory_pool().await;
        let engine = RelationshipEngine::new(&pool, &RelationConfig::default());

        let d1 = seed_with_embedding(&pool, "alice", "D1", Some(&[1.0, 0.0])).await;
        // cosine 0.95: processed first, and its writes will fail
        let bad = seed_with_embedding(&pool, "alice", "Bad", Some(&[0.95, 0.312_25])).await;
        // cosine 0.75: processed after the failure
        let good = seed_with_embedding(&pool, "alice", "Good", Some(&[0.75, 0.661_438])).await;

        reject_edge_writes(&pool, &bad, true).await;

        let report = engine.on_embedding_available("alice", &d1).await.unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].document_id, bad);
        assert!(report.skipped[0].reason.contains("edge write rejected"));

        // The surviving candidate still got both directions
        assert_eq!(report.created.len(), 2);
        assert!(report.created.iter().all(|e| e.document_id != bad
            && e.related_document_id != bad));

        let edges = RelationshipStore::new(&pool);
        let listed = edges.list_for_document("alice", &d1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].related_document_id, good);
        assert!(edges.list_for_document("alice", &bad).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reverse_failure_still_reports_the_persisted_forward_edge() {
        let pool = memory_pool().await;
        let engine = RelationshipEngine::new(&pool, &RelationConfig::default());

        let d1 = seed_with_embedding(&pool, "alice", "D1", Some(&[1.0, 0.0])).await;
        let d2 = seed_with_embedding(&pool, "alice", "D2", Some(&[0.95, 0.312_25])).await;

        // Only the reverse direction (d2 -> d1) fails; the forward edge lands
        reject_edge_writes(&pool, &d2, false).await;

        let report = engine.on_embedding_available("alice", &d1).await.unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].document_id, d2);

        // The forward edge exists in the store and the report says so
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].document_id, d1);
        assert_eq!(report.created[0].related_document_id, d2);

        let edges = RelationshipStore::new(&pool);
        assert_eq!(edges.list_for_document("alice", &d1).await.unwrap().len(), 1);
        assert!(edges.list_for_document("alice", &d2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn respects_top_k_limit() {
        let pool = memory_pool().await;
        let config = RelationConfig {
            similarity_threshold: 0.70,
            max_neighbors: 2,
        };
        let engine = RelationshipEngine::new(&pool, &config);

        let d1 = seed_with_embedding(&pool, "alice", "D1", Some(&[1.0, 0.0])).await;
        for i in 0..4 {
            seed_with_embedding(&pool, "alice", &format!("C{i}"), Some(&[1.0, 0.0])).await;
        }

        let report = engine.on_embedding_available("alice", &d1).await.unwrap();
        // Two pairs, both directions each
        assert_eq!(report.created.len(), 4);

        let edges = RelationshipStore::new(&pool);
        assert_eq!(edges.list_for_document("alice", &d1).await.unwrap().len(), 2);
    }
}
