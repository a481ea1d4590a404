//! HTTP handlers for the PDF signing API

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use pdfsign_core::{
    get_page_count, sha256_hex, signed_path_for, validate_submission, AuditRecord,
    DocumentRecord, DocumentStatus, SignError, SignRequest,
};
use sigmatte_core::MatteRequest;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::UserId;
use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Store an uploaded PDF under `<upload_root>/<user>/<millis>-<name>`
pub async fn upload_pdf(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Json(req): Json<UploadRequest>,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let pdf_data = BASE64
        .decode(req.pdf_base64.trim())
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid PDF base64: {}", e)))?;

    let page_count = get_page_count(&pdf_data).map_err(|e| match e {
        SignError::ParseError(msg) => ApiError::InvalidRequest(format!("Not a readable PDF: {}", msg)),
        other => other.into(),
    })?;

    let file_name = sanitize_segment(&req.file_name, "document.pdf");
    let user_dir = state
        .config
        .upload_root
        .join(sanitize_segment(&user_id, "anonymous"));
    tokio::fs::create_dir_all(&user_dir)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    let path = user_dir.join(format!("{}-{}", Utc::now().timestamp_millis(), file_name));
    tokio::fs::write(&path, &pdf_data)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    let storage_path = path.to_string_lossy().into_owned();

    let record = DocumentRecord::uploaded(
        Uuid::new_v4().to_string(),
        &user_id,
        &req.file_name,
        storage_path,
        sha256_hex(&pdf_data),
        page_count as i64,
    );
    state.store.insert_document(&record).await?;

    tracing::info!("Uploaded PDF {} ({} pages) for {}", record.id, page_count, user_id);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: state.public_url(&record.storage_path),
            id: record.id,
            original_file_name: record.original_file_name,
            page_count: record.page_count,
        }),
    ))
}

/// Owner-only document metadata
pub async fn get_pdf(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let record = owned_document(&state, &id, &user_id).await?;

    let signed_url = (record.status == DocumentStatus::Signed)
        .then(|| state.public_url(&signed_path_for(&record.storage_path)));

    Ok(Json(DocumentResponse {
        url: state.public_url(&record.storage_path),
        id: record.id,
        original_file_name: record.original_file_name,
        page_count: record.page_count,
        status: record.status,
        signed_url,
    }))
}

/// Bake the submitted fields into the PDF
pub async fn sign_pdf(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Json(req): Json<SignPdfRequest>,
) -> Result<Json<SignPdfResponse>, ApiError> {
    let request = SignRequest::from_json_fields(&req.pdf_id, &user_id, req.fields)?;
    validate_submission(&request.fields)?;

    let outcome = state.pipeline.sign(request).await?;

    Ok(Json(SignPdfResponse {
        signed_pdf_url: state.public_url(&outcome.signed_path),
        original_hash: outcome.original_hash,
        signed_hash: outcome.signed_hash,
        audit_id: outcome.audit_id,
        fields: outcome.fields,
    }))
}

/// Owner-only audit trail, oldest first
pub async fn list_audits(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    owned_document(&state, &id, &user_id).await?;
    Ok(Json(state.store.audits_for(&id).await?))
}

/// Clean up a signature photo: transparent background, black ink, cropped
pub async fn matte_signature(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MatteSignatureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    sigmatte_core::matte::validate_strength(req.strength)?;

    let payload = req
        .image_base64
        .split_once(',')
        .filter(|(prefix, _)| prefix.starts_with("data:"))
        .map_or(req.image_base64.as_str(), |(_, data)| data);
    let encoded = BASE64
        .decode(payload.trim())
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid image base64: {}", e)))?;

    let png = state
        .matte
        .run(MatteRequest {
            encoded,
            strength: req.strength,
        })
        .await?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

async fn owned_document(
    state: &AppState,
    id: &str,
    user_id: &str,
) -> Result<DocumentRecord, ApiError> {
    let record = state
        .store
        .find_document(id)
        .await?
        .ok_or_else(|| SignError::NotFound(format!("PDF {}", id)))?;
    if record.user_id != user_id {
        return Err(SignError::Unauthorized.into());
    }
    Ok(record)
}

/// Reduce untrusted text to one safe path segment
fn sanitize_segment(raw: &str, fallback: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}
