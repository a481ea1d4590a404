//! SQLite-backed document and audit store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pdfsign_core::{AuditRecord, DocumentRecord, DocumentStore, SignError};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Document row as stored
#[derive(Debug, Clone, FromRow)]
struct DbDocument {
    id: String,
    user_id: String,
    original_file_name: String,
    storage_path: String,
    original_hash: String,
    page_count: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DbDocument> for DocumentRecord {
    type Error = SignError;

    fn try_from(row: DbDocument) -> Result<Self, Self::Error> {
        Ok(DocumentRecord {
            id: row.id,
            user_id: row.user_id,
            original_file_name: row.original_file_name,
            storage_path: row.storage_path,
            original_hash: row.original_hash,
            page_count: row.page_count,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Audit row as stored
#[derive(Debug, Clone, FromRow)]
struct DbAudit {
    id: String,
    pdf_id: String,
    user_id: String,
    original_hash: String,
    signed_hash: String,
    fields_meta: String,
    signed_at: DateTime<Utc>,
}

impl TryFrom<DbAudit> for AuditRecord {
    type Error = SignError;

    fn try_from(row: DbAudit) -> Result<Self, Self::Error> {
        let fields_meta = serde_json::from_str(&row.fields_meta)
            .map_err(|e| SignError::StorageError(format!("Corrupt fields_meta: {}", e)))?;
        Ok(AuditRecord {
            id: row.id,
            pdf_id: row.pdf_id,
            user_id: row.user_id,
            original_hash: row.original_hash,
            signed_hash: row.signed_hash,
            fields_meta,
            signed_at: row.signed_at,
        })
    }
}

fn storage(e: sqlx::Error) -> SignError {
    SignError::StorageError(e.to_string())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_document(&self, record: &DocumentRecord) -> Result<(), SignError> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, user_id, original_file_name, storage_path, original_hash, page_count, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.original_file_name)
        .bind(&record.storage_path)
        .bind(&record.original_hash)
        .bind(record.page_count)
        .bind(record.status.as_str())
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn find_document(&self, id: &str) -> Result<Option<DocumentRecord>, SignError> {
        let row: Option<DbDocument> = sqlx::query_as(
            r#"
            SELECT id, user_id, original_file_name, storage_path, original_hash, page_count,
                   status, created_at, updated_at
            FROM documents
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(DocumentRecord::try_from).transpose()
    }

    async fn record_signing(&self, audit: &AuditRecord) -> Result<(), SignError> {
        let fields_meta = serde_json::to_string(&audit.fields_meta)
            .map_err(|e| SignError::StorageError(e.to_string()))?;

        let mut tx = self.pool.begin().await.map_err(storage)?;

        let updated = sqlx::query(
            r#"
            UPDATE documents
            SET status = 'signed', updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(audit.signed_at.to_rfc3339())
        .bind(&audit.pdf_id)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Err(SignError::NotFound(format!("PDF {}", audit.pdf_id)));
        }

        sqlx::query(
            r#"
            INSERT INTO pdf_audits (id, pdf_id, user_id, original_hash, signed_hash, fields_meta, signed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&audit.id)
        .bind(&audit.pdf_id)
        .bind(&audit.user_id)
        .bind(&audit.original_hash)
        .bind(&audit.signed_hash)
        .bind(&fields_meta)
        .bind(audit.signed_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn audits_for(&self, pdf_id: &str) -> Result<Vec<AuditRecord>, SignError> {
        let rows: Vec<DbAudit> = sqlx::query_as(
            r#"
            SELECT id, pdf_id, user_id, original_hash, signed_hash, fields_meta, signed_at
            FROM pdf_audits
            WHERE pdf_id = ?
            ORDER BY rowid ASC
            "#,
        )
        .bind(pdf_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }
}
