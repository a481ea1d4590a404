//! Hash-anchored signing audit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// One successful signing pass. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    pub pdf_id: String,
    pub user_id: String,
    pub original_hash: String,
    pub signed_hash: String,
    /// Field list exactly as submitted
    pub fields_meta: serde_json::Value,
    pub signed_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        pdf_id: &str,
        user_id: &str,
        original_hash: String,
        signed_hash: String,
        fields_meta: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            pdf_id: pdf_id.to_string(),
            user_id: user_id.to_string(),
            original_hash,
            signed_hash,
            fields_meta,
            signed_at: Utc::now(),
        }
    }
}

/// Lowercase hex SHA-256 of a byte buffer
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
