//! Typed filter vocabulary shared by search and smart collections
//!
//! Requests carry filters as an open JSON map; the map is parsed into a
//! closed set of variants so the SQL lowering is exhaustive. Absence of
//! a key means "no constraint". Unrecognized keys are ignored by default
//! (forward compatibility) and rejected in strict mode.

use serde_json::{Map, Value};

use crate::db::SqlParam;
use crate::error::{AppError, Result};

/// One recognized filter predicate
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentFilter {
    /// Exact media type match
    MediaType(String),
    Favorite(bool),
    /// Derived from note_count > 0
    HasNotes(bool),
    /// Derived from session_count > 0 (a named activity filter; the
    /// source field carries no audio semantics)
    HasActivity(bool),
    /// Inclusive progress range, 0..100
    Progress { min: Option<f64>, max: Option<f64> },
    /// Inclusive byte-size range
    FileSize { min: Option<i64>, max: Option<i64> },
    /// Inclusive creation-date range, RFC3339 bounds
    CreatedBetween {
        after: Option<String>,
        before: Option<String>,
    },
    /// Member of at least one of the given collections
    InCollections(Vec<String>),
    /// Carries at least one of the given tags
    HasTags(Vec<String>),
}

impl DocumentFilter {
    /// Append this filter's conjunct and binds to an assembled query
    pub fn push_sql(&self, conds: &mut Vec<String>, params: &mut Vec<SqlParam>) {
        match self {
            DocumentFilter::MediaType(value) => {
                conds.push("d.media_type = ?".to_string());
                params.push(SqlParam::Text(value.clone()));
            }
            DocumentFilter::Favorite(value) => {
                conds.push("d.is_favorite = ?".to_string());
                params.push(SqlParam::Int(i64::from(*value)));
            }
            DocumentFilter::HasNotes(true) => conds.push("d.note_count > 0".to_string()),
            DocumentFilter::HasNotes(false) => conds.push("d.note_count = 0".to_string()),
            DocumentFilter::HasActivity(true) => conds.push("d.session_count > 0".to_string()),
            DocumentFilter::HasActivity(false) => conds.push("d.session_count = 0".to_string()),
            DocumentFilter::Progress { min, max } => {
                if let Some(min) = min {
                    conds.push("d.progress >= ?".to_string());
                    params.push(SqlParam::Real(*min));
                }
                if let Some(max) = max {
                    conds.push("d.progress <= ?".to_string());
                    params.push(SqlParam::Real(*max));
                }
            }
            DocumentFilter::FileSize { min, max } => {
                if let Some(min) = min {
                    conds.push("d.file_size >= ?".to_string());
                    params.push(SqlParam::Int(*min));
                }
                if let Some(max) = max {
                    conds.push("d.file_size <= ?".to_string());
                    params.push(SqlParam::Int(*max));
                }
            }
            DocumentFilter::CreatedBetween { after, before } => {
                if let Some(after) = after {
                    conds.push("d.created_at >= ?".to_string());
                    params.push(SqlParam::Text(after.clone()));
                }
                if let Some(before) = before {
                    conds.push("d.created_at <= ?".to_string());
                    params.push(SqlParam::Text(before.clone()));
                }
            }
            DocumentFilter::InCollections(ids) => {
                push_membership(conds, params, "collection_documents", "collection_id", ids);
            }
            DocumentFilter::HasTags(ids) => {
                push_membership(conds, params, "document_tags", "tag_id", ids);
            }
        }
    }
}

fn push_membership(
    conds: &mut Vec<String>,
    params: &mut Vec<SqlParam>,
    table: &str,
    column: &str,
    ids: &[String],
) {
    // Empty id sets are dropped at parse time
    let placeholders = vec!["?"; ids.len()].join(", ");
    conds.push(format!(
        "EXISTS (SELECT 1 FROM {table} m WHERE m.document_id = d.id AND m.{column} IN ({placeholders}))"
    ));
    params.extend(ids.iter().cloned().map(SqlParam::Text));
}

/// Parse the open filter map of a request into typed filters
///
/// In lenient mode (the default) unknown keys are skipped; malformed
/// values for recognized keys are always a validation error naming the
/// offending filter.
pub fn parse_filters(map: &Map<String, Value>, strict: bool) -> Result<Vec<DocumentFilter>> {
    let mut filters = Vec::with_capacity(map.len());

    for (key, value) in map {
        let filter = match key.as_str() {
            "mediaType" => Some(DocumentFilter::MediaType(expect_string(key, value)?)),
            "isFavorite" => Some(DocumentFilter::Favorite(expect_bool(key, value)?)),
            "hasNotes" => Some(DocumentFilter::HasNotes(expect_bool(key, value)?)),
            "hasActivity" => Some(DocumentFilter::HasActivity(expect_bool(key, value)?)),
            "progress" => {
                let (min, max) = expect_f64_range(key, value)?;
                Some(DocumentFilter::Progress { min, max })
            }
            "fileSize" => {
                let (min, max) = expect_i64_range(key, value)?;
                Some(DocumentFilter::FileSize { min, max })
            }
            "createdBetween" => {
                let (after, before) = expect_date_range(key, value)?;
                Some(DocumentFilter::CreatedBetween { after, before })
            }
            "collections" => expect_id_set(key, value)?.map(DocumentFilter::InCollections),
            "tags" => expect_id_set(key, value)?.map(DocumentFilter::HasTags),
            _ => {
                if strict {
                    return Err(AppError::Validation(format!("unknown filter '{key}'")));
                }
                tracing::debug!(filter = %key, "ignoring unrecognized filter");
                None
            }
        };

        if let Some(filter) = filter {
            filters.push(filter);
        }
    }

    Ok(filters)
}

fn invalid(key: &str, expected: &str) -> AppError {
    AppError::Validation(format!("invalid value for filter '{key}': expected {expected}"))
}

fn expect_string(key: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(key, "a string"))
}

fn expect_bool(key: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| invalid(key, "a boolean"))
}

fn expect_f64_range(key: &str, value: &Value) -> Result<(Option<f64>, Option<f64>)> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(key, "an object with numeric min/max"))?;
    let bound = |name: &str| -> Result<Option<f64>> {
        match obj.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| invalid(key, "numeric min/max bounds")),
        }
    };
    Ok((bound("min")?, bound("max")?))
}

fn expect_i64_range(key: &str, value: &Value) -> Result<(Option<i64>, Option<i64>)> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(key, "an object with integer min/max"))?;
    let bound = |name: &str| -> Result<Option<i64>> {
        match obj.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| invalid(key, "integer min/max bounds")),
        }
    };
    Ok((bound("min")?, bound("max")?))
}

fn expect_date_range(key: &str, value: &Value) -> Result<(Option<String>, Option<String>)> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(key, "an object with RFC3339 after/before"))?;
    let bound = |name: &str| -> Result<Option<String>> {
        match obj.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => {
                let raw = v
                    .as_str()
                    .ok_or_else(|| invalid(key, "RFC3339 date strings"))?;
                let parsed = chrono::DateTime::parse_from_rfc3339(raw)
                    .map_err(|_| invalid(key, "RFC3339 date strings"))?;
                // Normalize to UTC so lexicographic comparison is sound
                Ok(Some(parsed.with_timezone(&chrono::Utc).to_rfc3339()))
            }
        }
    };
    Ok((bound("after")?, bound("before")?))
}

/// Membership filters with an empty id set are treated as absent
fn expect_id_set(key: &str, value: &Value) -> Result<Option<Vec<String>>> {
    let arr = value
        .as_array()
        .ok_or_else(|| invalid(key, "an array of ids"))?;
    let ids = arr
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(|| invalid(key, "string ids")))
        .collect::<Result<Vec<String>>>()?;

    if ids.is_empty() {
        tracing::debug!(filter = %key, "empty id set treated as no constraint");
        return Ok(None);
    }

    Ok(Some(ids))
}
