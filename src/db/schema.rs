//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;
    sqlx::query(FTS_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Documents table (one row per item in a user's library)
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    title TEXT NOT NULL,
    file_name TEXT NOT NULL,
    media_type TEXT NOT NULL,
    file_size INTEGER NOT NULL DEFAULT 0,
    page_count INTEGER,
    -- Reading progress fraction, 0..100
    progress REAL NOT NULL DEFAULT 0,
    last_read_position TEXT,
    last_read_at TEXT,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    note_count INTEGER NOT NULL DEFAULT 0,
    session_count INTEGER NOT NULL DEFAULT 0,
    archived_at TEXT,
    series_id TEXT,
    series_order INTEGER,
    -- Fixed-length f32 vector, little-endian bytes; NULL until computed
    embedding BLOB,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id);
CREATE INDEX IF NOT EXISTS idx_documents_owner_last_read ON documents(owner_id, last_read_at);
CREATE INDEX IF NOT EXISTS idx_documents_owner_created ON documents(owner_id, created_at);

-- Collection membership (collections themselves live with the CRUD layer)
CREATE TABLE IF NOT EXISTS collection_documents (
    collection_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    PRIMARY KEY (collection_id, document_id)
);

CREATE INDEX IF NOT EXISTS idx_collection_documents_document ON collection_documents(document_id);

-- Tag membership
CREATE TABLE IF NOT EXISTS document_tags (
    tag_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    PRIMARY KEY (tag_id, document_id)
);

CREATE INDEX IF NOT EXISTS idx_document_tags_document ON document_tags(document_id);

-- Similarity-derived edges. Directional rows, but the engine always
-- writes both directions of a discovered pair. The UNIQUE constraint
-- makes the ordered-pair insert atomic: a concurrent duplicate insert
-- no-ops instead of producing two edges.
CREATE TABLE IF NOT EXISTS document_relationships (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    related_document_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    score REAL NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    UNIQUE (document_id, related_document_id)
);

CREATE INDEX IF NOT EXISTS idx_relationships_owner ON document_relationships(owner_id);
CREATE INDEX IF NOT EXISTS idx_relationships_document ON document_relationships(document_id);
"#;

// The FTS index is built over exactly the columns the query-time matcher
// evaluates (title, file_name). If either side changes, both must change,
// otherwise result selectivity silently diverges from the index.
const FTS_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
    title,
    file_name,
    content='documents',
    content_rowid='rowid',
    tokenize='unicode61 remove_diacritics 2'
);

CREATE TRIGGER IF NOT EXISTS documents_fts_insert AFTER INSERT ON documents BEGIN
    INSERT INTO documents_fts(rowid, title, file_name)
    VALUES(new.rowid, new.title, new.file_name);
END;

CREATE TRIGGER IF NOT EXISTS documents_fts_delete AFTER DELETE ON documents BEGIN
    INSERT INTO documents_fts(documents_fts, rowid, title, file_name)
    VALUES('delete', old.rowid, old.title, old.file_name);
END;

CREATE TRIGGER IF NOT EXISTS documents_fts_update AFTER UPDATE ON documents BEGIN
    INSERT INTO documents_fts(documents_fts, rowid, title, file_name)
    VALUES('delete', old.rowid, old.title, old.file_name);
    INSERT INTO documents_fts(rowid, title, file_name)
    VALUES(new.rowid, new.title, new.file_name);
END;
"#;
