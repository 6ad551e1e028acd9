//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Documents table (one physical file under verification)
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    property_id TEXT NOT NULL,
    document_number TEXT NOT NULL,
    storage_key TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    file_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    hashed_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_documents_property ON documents(property_id);
CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);

-- Fingerprint history (append-only, never mutated or deleted)
CREATE TABLE IF NOT EXISTS document_hashes (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    digest TEXT NOT NULL,
    algorithm TEXT NOT NULL DEFAULT 'sha256',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_document_hashes_document
    ON document_hashes(document_id, created_at);

-- Verifier decisions (immutable once created)
CREATE TABLE IF NOT EXISTS verifications (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    verifier_id TEXT NOT NULL,
    outcome TEXT NOT NULL,
    reason TEXT,
    discrepancy TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_verifications_document ON verifications(document_id);
"#;
