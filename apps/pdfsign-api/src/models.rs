//! Request and response bodies for the PDF signing API

use pdfsign_core::{DocumentStatus, FieldOutcome};
use serde::{Deserialize, Serialize};

/// Upload a PDF as base64
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    pub pdf_base64: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub original_file_name: String,
    pub page_count: i64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: String,
    pub original_file_name: String,
    pub page_count: i64,
    pub status: DocumentStatus,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_url: Option<String>,
}

/// Fields stay raw JSON here so the audit keeps exactly what was sent
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPdfRequest {
    pub pdf_id: String,
    pub fields: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPdfResponse {
    pub signed_pdf_url: String,
    pub original_hash: String,
    pub signed_hash: String,
    pub audit_id: String,
    pub fields: Vec<FieldOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatteSignatureRequest {
    pub image_base64: String,
    #[serde(default = "default_strength")]
    pub strength: f32,
}

fn default_strength() -> f32 {
    1.0
}
