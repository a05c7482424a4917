//! Query compiler and executor
//!
//! Lowers a SearchRequest into a single owner-scoped SQL statement:
//! predicate conjunction, optional FTS5 match, keyset pagination, and a
//! deterministic ORDER BY. The id tie-break is not cosmetic: it is the
//! pagination anchor, and without it a keyset scan can skip or repeat
//! rows under concurrent writes.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::cursor::{Cursor, SortValue};
use super::filter::parse_filters;
use crate::config::SearchConfig;
use crate::db::{Document, DocumentStore, SqlParam, DOCUMENT_COLUMNS};
use crate::error::{AppError, Result};

/// The fixed sort-key vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Last reading activity; NULL for never-opened documents
    LastActivity,
    CreatedAt,
    UpdatedAt,
    Progress,
    FileSize,
    Title,
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::LastActivity
    }
}

impl SortKey {
    pub fn column(&self) -> &'static str {
        match self {
            SortKey::LastActivity => "last_read_at",
            SortKey::CreatedAt => "created_at",
            SortKey::UpdatedAt => "updated_at",
            SortKey::Progress => "progress",
            SortKey::FileSize => "file_size",
            SortKey::Title => "title",
        }
    }

    /// Title is excluded: text collation makes its keyset comparison
    /// unreliable, so title-sorted scans are first-page only.
    pub fn supports_cursor(&self) -> bool {
        !matches!(self, SortKey::Title)
    }

    /// The cursor anchor value this key extracts from a row
    pub fn sort_value(&self, doc: &Document) -> SortValue {
        match self {
            SortKey::LastActivity => doc
                .last_read_at
                .clone()
                .map(SortValue::Text)
                .unwrap_or(SortValue::Null),
            SortKey::CreatedAt => SortValue::Text(doc.created_at.clone()),
            SortKey::UpdatedAt => SortValue::Text(doc.updated_at.clone()),
            SortKey::Progress => SortValue::Real(doc.progress),
            SortKey::FileSize => SortValue::Int(doc.file_size),
            SortKey::Title => SortValue::Text(doc.title.clone()),
        }
    }
}

/// Sort direction; only descending is specified for now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Desc,
}

/// A faceted, cursor-paginated search request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub owner_id: String,
    /// Free-text query over title and file name; empty means no constraint
    #[serde(default)]
    pub query: Option<String>,
    /// Open filter map, parsed into the closed filter vocabulary
    #[serde(default)]
    pub filters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub sort_dir: SortDirection,
    /// Opaque token from a previous page
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    /// Reject unrecognized filter keys instead of ignoring them
    #[serde(default)]
    pub strict_filters: bool,
}

/// One page of results plus the token to resume the scan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    pub documents: Vec<Document>,
    /// Absent when the scan is exhausted or the sort key is not cursorable
    pub next_cursor: Option<String>,
}

/// Stateless search executor; safe to invoke concurrently
pub struct SearchEngine<'a> {
    pool: &'a SqlitePool,
    limits: SearchConfig,
}

impl<'a> SearchEngine<'a> {
    pub fn new(pool: &'a SqlitePool, limits: &SearchConfig) -> Self {
        Self {
            pool,
            limits: limits.clone(),
        }
    }

    /// Execute a search request. Read-only.
    pub async fn search(&self, request: &SearchRequest) -> Result<ResultPage> {
        if request.owner_id.trim().is_empty() {
            return Err(AppError::Validation("ownerId is required".to_string()));
        }

        let filters = parse_filters(&request.filters, request.strict_filters)?;

        let cursor = match &request.cursor {
            Some(token) => {
                if !request.sort_by.supports_cursor() {
                    return Err(AppError::Validation(format!(
                        "sort key '{}' does not support cursor pagination",
                        request.sort_by.column()
                    )));
                }
                Some(Cursor::decode(token, request.sort_by)?)
            }
            None => None,
        };

        let limit = request
            .limit
            .unwrap_or(self.limits.default_page_size)
            .clamp(1, self.limits.max_page_size);

        let mut conds = vec!["d.owner_id = ?".to_string()];
        let mut params = vec![SqlParam::Text(request.owner_id.clone())];

        for filter in &filters {
            filter.push_sql(&mut conds, &mut params);
        }

        if let Some(text) = request.query.as_deref() {
            push_text_match(text, &mut conds, &mut params);
        }

        if let Some(cursor) = &cursor {
            push_keyset(cursor, request.sort_by.column(), &mut conds, &mut params);
        }

        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE {} \
             ORDER BY d.{col} DESC, d.id DESC LIMIT ?",
            conds.join(" AND "),
            col = request.sort_by.column(),
        );
        params.push(SqlParam::Int(limit));

        let documents = DocumentStore::new(self.pool).fetch(&sql, &params).await?;

        let next_cursor = if documents.len() == limit as usize && request.sort_by.supports_cursor()
        {
            documents.last().map(|last| {
                Cursor::new(
                    request.sort_by,
                    request.sort_by.sort_value(last),
                    last.id.clone(),
                )
                .encode()
            })
        } else {
            None
        };

        Ok(ResultPage {
            documents,
            next_cursor,
        })
    }
}

/// Full-text conjunct over the same derived text the FTS index covers
fn push_text_match(text: &str, conds: &mut Vec<String>, params: &mut Vec<SqlParam>) {
    let sanitized = sanitize_match_query(text);
    if sanitized.is_empty() {
        return;
    }

    conds.push(
        "d.rowid IN (SELECT rowid FROM documents_fts WHERE documents_fts MATCH ?)".to_string(),
    );
    params.push(SqlParam::Text(sanitized));
}

/// Keyset conjunct: rows strictly "before" the cursor position in the
/// descending (sort value, id) ordering. NULL sort values order last, so
/// a non-null anchor still admits the whole NULL region, and a NULL
/// anchor narrows to NULL rows past the anchor id.
fn push_keyset(cursor: &Cursor, col: &str, conds: &mut Vec<String>, params: &mut Vec<SqlParam>) {
    match &cursor.sort_value {
        SortValue::Null => {
            conds.push(format!("(d.{col} IS NULL AND d.id < ?)"));
            params.push(SqlParam::Text(cursor.document_id.clone()));
        }
        value => {
            let anchor = match value {
                SortValue::Int(v) => SqlParam::Int(*v),
                SortValue::Real(v) => SqlParam::Real(*v),
                SortValue::Text(v) => SqlParam::Text(v.clone()),
                SortValue::Null => unreachable!("handled above"),
            };
            conds.push(format!(
                "((d.{col} IS NOT NULL AND (d.{col} < ? OR (d.{col} = ? AND d.id < ?))) \
                 OR d.{col} IS NULL)"
            ));
            params.push(anchor.clone());
            params.push(anchor);
            params.push(SqlParam::Text(cursor.document_id.clone()));
        }
    }
}

/// Sanitize a free-text query for FTS5 MATCH
///
/// FTS5 operators and bareword punctuation cause syntax errors, so
/// anything beyond a single alphanumeric term is wrapped as a quoted
/// phrase (internal quotes escaped), which the tokenizer then splits
/// the same way it split the indexed text.
fn sanitize_match_query(query: &str) -> String {
    let trimmed = query.trim();

    // Nothing the tokenizer could match: no text constraint at all
    if !trimmed.chars().any(char::is_alphanumeric) {
        return String::new();
    }

    if trimmed.chars().all(char::is_alphanumeric) {
        trimmed.to_string()
    } else {
        format!("\"{}\"", trimmed.replace('"', "\"\""))
    }
}
