//! Document metadata and audit persistence

use crate::audit::AuditRecord;
use crate::error::SignError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Signed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Signed => "signed",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(DocumentStatus::Uploaded),
            "signed" => Ok(DocumentStatus::Signed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(SignError::StorageError(format!(
                "Unknown document status: {}",
                other
            ))),
        }
    }
}

/// An uploaded PDF and where its bytes live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub user_id: String,
    pub original_file_name: String,
    pub storage_path: String,
    pub original_hash: String,
    pub page_count: i64,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// A freshly uploaded document
    pub fn uploaded(
        id: String,
        user_id: &str,
        original_file_name: &str,
        storage_path: String,
        original_hash: String,
        page_count: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: user_id.to_string(),
            original_file_name: original_file_name.to_string(),
            storage_path,
            original_hash,
            page_count,
            status: DocumentStatus::Uploaded,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persistence seam for documents and their audit trail
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, record: &DocumentRecord) -> Result<(), SignError>;

    async fn find_document(&self, id: &str) -> Result<Option<DocumentRecord>, SignError>;

    /// Insert the audit record and flip the document to Signed as one unit.
    /// Either both happen or neither does.
    async fn record_signing(&self, audit: &AuditRecord) -> Result<(), SignError>;

    /// Audit records for a document, oldest first
    async fn audits_for(&self, pdf_id: &str) -> Result<Vec<AuditRecord>, SignError>;
}

/// In-process store, used by tests and single-process tools
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryTables>,
}

#[derive(Default)]
struct MemoryTables {
    documents: HashMap<String, DocumentRecord>,
    audits: Vec<AuditRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<std::sync::MutexGuard<'_, MemoryTables>, SignError> {
        self.inner
            .lock()
            .map_err(|_| SignError::StorageError("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_document(&self, record: &DocumentRecord) -> Result<(), SignError> {
        self.tables()?
            .documents
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find_document(&self, id: &str) -> Result<Option<DocumentRecord>, SignError> {
        Ok(self.tables()?.documents.get(id).cloned())
    }

    async fn record_signing(&self, audit: &AuditRecord) -> Result<(), SignError> {
        let mut tables = self.tables()?;
        let document = tables
            .documents
            .get_mut(&audit.pdf_id)
            .ok_or_else(|| SignError::NotFound(format!("PDF {}", audit.pdf_id)))?;
        document.status = DocumentStatus::Signed;
        document.updated_at = audit.signed_at;
        tables.audits.push(audit.clone());
        Ok(())
    }

    async fn audits_for(&self, pdf_id: &str) -> Result<Vec<AuditRecord>, SignError> {
        Ok(self
            .tables()?
            .audits
            .iter()
            .filter(|a| a.pdf_id == pdf_id)
            .cloned()
            .collect())
    }
}
