//! Opaque keyset-pagination cursors
//!
//! A cursor captures the last-seen (sort value, document id) pair of a
//! descending scan. Tokens are versioned JSON wrapped in URL-safe base64
//! and must round-trip byte-for-byte; decoding rejects foreign or stale
//! tokens (wrong version, wrong sort key) instead of guessing.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::query::SortKey;
use crate::error::{AppError, Result};

pub const CURSOR_VERSION: u8 = 1;

/// The last-seen sort value, typed to match the sort key's column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

/// Decoded pagination cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "v")]
    pub version: u8,
    #[serde(rename = "k")]
    pub sort_key: SortKey,
    #[serde(rename = "s")]
    pub sort_value: SortValue,
    #[serde(rename = "id")]
    pub document_id: String,
}

impl Cursor {
    pub fn new(sort_key: SortKey, sort_value: SortValue, document_id: String) -> Self {
        Self {
            version: CURSOR_VERSION,
            sort_key,
            sort_value,
            document_id,
        }
    }

    /// Encode into an opaque token
    pub fn encode(&self) -> String {
        // Serializing a plain struct of primitives cannot fail
        let json = serde_json::to_vec(self).expect("cursor serialization is infallible");
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a token and check it belongs to the requested sort key
    pub fn decode(token: &str, expected_key: SortKey) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| AppError::Validation("malformed cursor".to_string()))?;

        let cursor: Cursor = serde_json::from_slice(&bytes)
            .map_err(|_| AppError::Validation("malformed cursor".to_string()))?;

        if cursor.version != CURSOR_VERSION {
            return Err(AppError::Validation(format!(
                "unsupported cursor version {}",
                cursor.version
            )));
        }

        if cursor.sort_key != expected_key {
            return Err(AppError::Validation(
                "cursor does not match the requested sort key".to_string(),
            ));
        }

        Ok(cursor)
    }
}
