//! Document, fingerprint, and verification persistence
//!
//! Ids and timestamps are stored as TEXT (UUID strings, RFC 3339) and
//! parsed in the repository; a malformed stored value surfaces as a
//! consistency error rather than being silently patched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{ConsistencyError, Result, ValidationError};
use crate::verification::{Discrepancy, VerificationOutcome};

// ============================================================================
// Document Status
// ============================================================================

/// Lifecycle state of a document; only ever advances forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Combined object exists, fingerprint not yet recorded
    Pending,
    /// Fingerprint recorded, awaiting a verification decision
    Hashed,
    /// Candidate matched the recorded fingerprint
    Verified,
    /// Candidate mismatched, or a verifier rejected manually
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Hashed => "hashed",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "hashed" => Some(Self::Hashed),
            "verified" => Some(Self::Verified),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// True once a fingerprint has been recorded (hashed or later)
    pub fn has_fingerprint(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Rejected)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

/// One physical file under verification
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub property_id: Uuid,
    pub document_number: String,
    pub storage_key: String,
    pub mime_type: String,
    pub file_size: i64,
    pub file_name: String,
    pub status: DocumentStatus,
    pub hashed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a document row (the upload-acceptance step)
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub property_id: Uuid,
    pub document_number: String,
    pub storage_key: String,
    pub mime_type: String,
    pub file_size: i64,
    pub file_name: String,
}

/// One recorded content fingerprint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentHash {
    pub id: Uuid,
    pub document_id: Uuid,
    pub digest: String,
    pub algorithm: String,
    pub created_at: DateTime<Utc>,
}

/// One verifier decision against a document
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub id: Uuid,
    pub document_id: Uuid,
    pub verifier_id: Uuid,
    pub outcome: VerificationOutcome,
    pub reason: Option<String>,
    pub discrepancy: Option<Discrepancy>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a verification row
#[derive(Debug, Clone)]
pub struct NewVerification {
    pub document_id: Uuid,
    pub verifier_id: Uuid,
    pub outcome: VerificationOutcome,
    pub reason: Option<String>,
    pub discrepancy: Option<Discrepancy>,
}

// ============================================================================
// Raw rows
// ============================================================================

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    property_id: String,
    document_number: String,
    storage_key: String,
    mime_type: String,
    file_size: i64,
    file_name: String,
    status: String,
    hashed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct DocumentHashRow {
    id: String,
    document_id: String,
    digest: String,
    algorithm: String,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct VerificationRow {
    id: String,
    document_id: String,
    verifier_id: String,
    outcome: String,
    reason: Option<String>,
    discrepancy: Option<String>,
    created_at: String,
}

fn parse_uuid(entity: &'static str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        ConsistencyError::InvalidRecord {
            entity,
            detail: format!("invalid uuid '{}'", value),
        }
        .into()
    })
}

fn parse_timestamp(entity: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            ConsistencyError::InvalidRecord {
                entity,
                detail: format!("invalid timestamp '{}'", value),
            }
            .into()
        })
}

impl TryFrom<DocumentRow> for Document {
    type Error = crate::error::IntegrityError;

    fn try_from(row: DocumentRow) -> Result<Self> {
        let status = DocumentStatus::parse(&row.status).ok_or_else(|| {
            ConsistencyError::InvalidRecord {
                entity: "document",
                detail: format!("invalid status '{}'", row.status),
            }
        })?;

        Ok(Document {
            id: parse_uuid("document", &row.id)?,
            property_id: parse_uuid("document", &row.property_id)?,
            document_number: row.document_number,
            storage_key: row.storage_key,
            mime_type: row.mime_type,
            file_size: row.file_size,
            file_name: row.file_name,
            status,
            hashed_at: row
                .hashed_at
                .as_deref()
                .map(|v| parse_timestamp("document", v))
                .transpose()?,
            created_at: parse_timestamp("document", &row.created_at)?,
            updated_at: parse_timestamp("document", &row.updated_at)?,
        })
    }
}

impl TryFrom<DocumentHashRow> for DocumentHash {
    type Error = crate::error::IntegrityError;

    fn try_from(row: DocumentHashRow) -> Result<Self> {
        Ok(DocumentHash {
            id: parse_uuid("document_hash", &row.id)?,
            document_id: parse_uuid("document_hash", &row.document_id)?,
            digest: row.digest,
            algorithm: row.algorithm,
            created_at: parse_timestamp("document_hash", &row.created_at)?,
        })
    }
}

impl TryFrom<VerificationRow> for Verification {
    type Error = crate::error::IntegrityError;

    fn try_from(row: VerificationRow) -> Result<Self> {
        let outcome = VerificationOutcome::parse(&row.outcome).ok_or_else(|| {
            ConsistencyError::InvalidRecord {
                entity: "verification",
                detail: format!("invalid outcome '{}'", row.outcome),
            }
        })?;

        let discrepancy = row
            .discrepancy
            .as_deref()
            .map(|json| {
                serde_json::from_str::<Discrepancy>(json).map_err(|e| {
                    ConsistencyError::InvalidRecord {
                        entity: "verification",
                        detail: format!("invalid discrepancy payload: {}", e),
                    }
                })
            })
            .transpose()?;

        Ok(Verification {
            id: parse_uuid("verification", &row.id)?,
            document_id: parse_uuid("verification", &row.document_id)?,
            verifier_id: parse_uuid("verification", &row.verifier_id)?,
            outcome,
            reason: row.reason,
            discrepancy,
            created_at: parse_timestamp("verification", &row.created_at)?,
        })
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Repository over documents, fingerprints, and verifications
pub struct DocumentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DocumentRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a document row in `pending` status
    pub async fn insert_document(&self, data: &NewDocument) -> Result<Document> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO documents
                (id, property_id, document_number, storage_key, mime_type,
                 file_size, file_name, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(data.property_id.to_string())
        .bind(&data.document_number)
        .bind(&data.storage_key)
        .bind(&data.mime_type)
        .bind(data.file_size)
        .bind(&data.file_name)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        self.load_document(id).await?.ok_or_else(|| {
            ConsistencyError::InvalidRecord {
                entity: "document",
                detail: "failed to fetch created row".to_string(),
            }
            .into()
        })
    }

    /// Load a document by id
    pub async fn load_document(&self, id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, property_id, document_number, storage_key, mime_type,
                   file_size, file_name, status, hashed_at, created_at, updated_at
            FROM documents
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(Document::try_from).transpose()
    }

    /// Advance a document's status, optionally stamping `hashed_at`
    pub async fn update_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        hashed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        let result = match hashed_at {
            Some(ts) => {
                sqlx::query(
                    r#"
                    UPDATE documents SET status = ?, hashed_at = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(status.as_str())
                .bind(ts.to_rfc3339())
                .bind(&now)
                .bind(id.to_string())
                .execute(self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE documents SET status = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(status.as_str())
                .bind(&now)
                .bind(id.to_string())
                .execute(self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(ValidationError::UnknownDocument(id).into());
        }

        Ok(())
    }

    /// Append a fingerprint to a document's history
    pub async fn insert_document_hash(
        &self,
        document_id: Uuid,
        digest: &str,
        algorithm: &str,
    ) -> Result<DocumentHash> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO document_hashes (id, document_id, digest, algorithm, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(document_id.to_string())
        .bind(digest)
        .bind(algorithm)
        .bind(created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(DocumentHash {
            id,
            document_id,
            digest: digest.to_string(),
            algorithm: algorithm.to_string(),
            created_at,
        })
    }

    /// Most recently created fingerprint for a document
    pub async fn load_latest_document_hash(
        &self,
        document_id: Uuid,
    ) -> Result<Option<DocumentHash>> {
        let row = sqlx::query_as::<_, DocumentHashRow>(
            r#"
            SELECT id, document_id, digest, algorithm, created_at
            FROM document_hashes
            WHERE document_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(document_id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(DocumentHash::try_from).transpose()
    }

    /// Number of fingerprint rows for a document
    pub async fn count_document_hashes(&self, document_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM document_hashes WHERE document_id = ?
            "#,
        )
        .bind(document_id.to_string())
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Record a verifier decision
    pub async fn insert_verification(&self, data: &NewVerification) -> Result<Verification> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        let discrepancy_json = data
            .discrepancy
            .as_ref()
            .map(|d| {
                serde_json::to_string(d).map_err(|e| ConsistencyError::InvalidRecord {
                    entity: "verification",
                    detail: format!("unserializable discrepancy: {}", e),
                })
            })
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO verifications
                (id, document_id, verifier_id, outcome, reason, discrepancy, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(data.document_id.to_string())
        .bind(data.verifier_id.to_string())
        .bind(data.outcome.as_str())
        .bind(&data.reason)
        .bind(&discrepancy_json)
        .bind(created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(Verification {
            id,
            document_id: data.document_id,
            verifier_id: data.verifier_id,
            outcome: data.outcome,
            reason: data.reason.clone(),
            discrepancy: data.discrepancy.clone(),
            created_at,
        })
    }

    /// All decisions recorded against a document, oldest first
    pub async fn load_verifications(&self, document_id: Uuid) -> Result<Vec<Verification>> {
        let rows = sqlx::query_as::<_, VerificationRow>(
            r#"
            SELECT id, document_id, verifier_id, outcome, reason, discrepancy, created_at
            FROM verifications
            WHERE document_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(document_id.to_string())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Verification::try_from).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
