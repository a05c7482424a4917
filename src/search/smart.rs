//! Smart-collection predicate evaluator
//!
//! A narrower sibling of the search executor: evaluates a stored filter
//! definition against the owner's documents. Archived documents are
//! excluded unconditionally as a base condition, never as an optional
//! filter.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::config::SearchConfig;
use crate::db::{Document, DocumentStore, SqlParam, DOCUMENT_COLUMNS};
use crate::error::{AppError, Result};

/// A saved filter definition, evaluated on demand
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartCollectionRule {
    pub progress_min: Option<f64>,
    pub progress_max: Option<f64>,
    /// RFC3339; matches documents created at or after this instant
    pub uploaded_after: Option<String>,
    /// RFC3339; matches documents last read strictly before this instant
    pub last_read_before: Option<String>,
    pub has_notes: Option<bool>,
}

/// Evaluate a smart-collection rule for one owner
///
/// Results are ordered by last reading activity descending (never-read
/// documents last), then creation descending, and bounded by the
/// configured maximum page size.
pub async fn evaluate_smart_collection(
    pool: &SqlitePool,
    owner_id: &str,
    rule: &SmartCollectionRule,
    limits: &SearchConfig,
) -> Result<Vec<Document>> {
    if owner_id.trim().is_empty() {
        return Err(AppError::Validation("ownerId is required".to_string()));
    }

    // Base conditions: owner scope and the mandatory archived exclusion
    let mut conds = vec![
        "d.owner_id = ?".to_string(),
        "d.archived_at IS NULL".to_string(),
    ];
    let mut params = vec![SqlParam::Text(owner_id.to_string())];

    if let Some(min) = rule.progress_min {
        conds.push("d.progress >= ?".to_string());
        params.push(SqlParam::Real(min));
    }
    if let Some(max) = rule.progress_max {
        conds.push("d.progress <= ?".to_string());
        params.push(SqlParam::Real(max));
    }
    if let Some(after) = &rule.uploaded_after {
        conds.push("d.created_at >= ?".to_string());
        params.push(SqlParam::Text(normalize_rfc3339("uploadedAfter", after)?));
    }
    if let Some(before) = &rule.last_read_before {
        conds.push("d.last_read_at IS NOT NULL AND d.last_read_at < ?".to_string());
        params.push(SqlParam::Text(normalize_rfc3339("lastReadBefore", before)?));
    }
    match rule.has_notes {
        Some(true) => conds.push("d.note_count > 0".to_string()),
        Some(false) => conds.push("d.note_count = 0".to_string()),
        None => {}
    }

    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE {} \
         ORDER BY d.last_read_at DESC, d.created_at DESC LIMIT ?",
        conds.join(" AND "),
    );
    params.push(SqlParam::Int(limits.max_page_size));

    DocumentStore::new(pool).fetch(&sql, &params).await
}

fn normalize_rfc3339(field: &str, raw: &str) -> Result<String> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc).to_rfc3339())
        .map_err(|_| AppError::Validation(format!("invalid RFC3339 value for '{field}'")))
}
