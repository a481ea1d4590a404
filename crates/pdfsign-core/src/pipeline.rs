//! End-to-end signing: load, render, hash, persist, audit
//!
//! Ordering on disk and in the store:
//! 1. signed bytes are written to `<signed>.tmp`
//! 2. the audit record and the Signed status commit together
//! 3. the temp file is renamed onto the signed path
//!
//! A failure before step 2 leaves no audit and no temp file behind.
//! Image decoding, rendering and saving run on the blocking pool.

use crate::audit::{sha256_hex, AuditRecord};
use crate::document::SigningDocument;
use crate::error::SignError;
use crate::fetch::ImageFetcher;
use crate::field::{parse_fields, Field};
use crate::lock::DocumentLocks;
use crate::render::{render_fields, FieldOutcome, RenderContext, SignatureImages};
use crate::store::DocumentStore;
use futures::future::join_all;
use serde::Serialize;
use sigmatte_core::RasterImage;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// One signing call. Fields are consumed by the pass.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub pdf_id: String,
    pub user_id: String,
    pub fields: Vec<Field>,
    /// What gets written to the audit record
    pub fields_meta: serde_json::Value,
}

impl SignRequest {
    pub fn new(pdf_id: &str, user_id: &str, fields: Vec<Field>) -> Result<Self, SignError> {
        let fields_meta = serde_json::to_value(&fields)
            .map_err(|e| SignError::ValidationError(e.to_string()))?;
        Ok(Self {
            pdf_id: pdf_id.to_string(),
            user_id: user_id.to_string(),
            fields,
            fields_meta,
        })
    }

    /// Parse raw field JSON, keeping it verbatim for the audit
    pub fn from_json_fields(
        pdf_id: &str,
        user_id: &str,
        raw: Vec<serde_json::Value>,
    ) -> Result<Self, SignError> {
        let fields = parse_fields(&raw)?;
        Ok(Self {
            pdf_id: pdf_id.to_string(),
            user_id: user_id.to_string(),
            fields,
            fields_meta: serde_json::Value::Array(raw),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutcome {
    pub signed_path: String,
    pub original_hash: String,
    pub signed_hash: String,
    pub audit_id: String,
    pub fields: Vec<FieldOutcome>,
}

impl SignOutcome {
    pub fn skipped_count(&self) -> usize {
        self.fields.iter().filter(|f| !f.is_rendered()).count()
    }
}

pub struct SigningPipeline {
    store: Arc<dyn DocumentStore>,
    fetcher: Arc<dyn ImageFetcher>,
    locks: DocumentLocks,
}

impl SigningPipeline {
    pub fn new(store: Arc<dyn DocumentStore>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            store,
            fetcher,
            locks: DocumentLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Sign with today's local date for empty date fields
    pub async fn sign(&self, request: SignRequest) -> Result<SignOutcome, SignError> {
        self.sign_with(request, RenderContext::now()).await
    }

    pub async fn sign_with(
        &self,
        request: SignRequest,
        ctx: RenderContext,
    ) -> Result<SignOutcome, SignError> {
        let SignRequest {
            pdf_id,
            user_id,
            fields,
            fields_meta,
        } = request;

        let _guard = self.locks.acquire(&pdf_id).await;

        let record = self
            .store
            .find_document(&pdf_id)
            .await?
            .ok_or_else(|| SignError::NotFound(format!("PDF {}", pdf_id)))?;
        if record.user_id != user_id {
            return Err(SignError::Unauthorized);
        }

        let original = tokio::fs::read(&record.storage_path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    SignError::NotFound(format!("File for PDF {} is missing", pdf_id))
                }
                _ => SignError::StorageError(e.to_string()),
            })?;
        let original_hash = sha256_hex(&original);
        if original_hash != record.original_hash {
            warn!(pdf_id = %pdf_id, "Stored bytes differ from the upload hash");
        }

        let images = self.prefetch(&fields).await;

        let (signed, outcomes) = tokio::task::spawn_blocking(move || {
            let mut doc = SigningDocument::load(&original)?;
            let outcomes = render_fields(&mut doc, &fields, &images, &ctx);
            Ok::<_, SignError>((doc.save()?, outcomes))
        })
        .await
        .map_err(|e| SignError::SerializationError(format!("Render task failed: {}", e)))??;
        let signed_hash = sha256_hex(&signed);

        let signed_path = signed_path_for(&record.storage_path);
        let temp_path = temp_path_for(&signed_path);
        tokio::fs::write(&temp_path, &signed)
            .await
            .map_err(|e| SignError::StorageError(format!("{}: {}", temp_path, e)))?;

        let audit = AuditRecord::new(
            &pdf_id,
            &user_id,
            original_hash.clone(),
            signed_hash.clone(),
            fields_meta,
        );
        if let Err(e) = self.store.record_signing(&audit).await {
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                warn!(path = %temp_path, error = %cleanup, "Failed to remove temp file");
            }
            return Err(e);
        }

        tokio::fs::rename(&temp_path, &signed_path)
            .await
            .map_err(|e| SignError::StorageError(format!("{}: {}", signed_path, e)))?;

        let outcome = SignOutcome {
            signed_path,
            original_hash,
            signed_hash,
            audit_id: audit.id,
            fields: outcomes,
        };
        info!(
            pdf_id = %pdf_id,
            fields = outcome.fields.len(),
            skipped = outcome.skipped_count(),
            "Signed PDF"
        );
        Ok(outcome)
    }

    /// Fetch and decode every distinct signature image concurrently
    async fn prefetch(&self, fields: &[Field]) -> SignatureImages {
        let mut urls: Vec<&str> = Vec::new();
        for url in fields.iter().filter_map(Field::signature_url) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }

        let fetched = join_all(urls.into_iter().map(|url| async move {
            let image = match self.fetcher.fetch(url).await {
                Ok(bytes) => tokio::task::spawn_blocking(move || RasterImage::decode(&bytes))
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|decoded| decoded.map_err(|e| e.to_string())),
                Err(e) => Err(e.to_string()),
            };
            (url.to_string(), image)
        }))
        .await;

        fetched.into_iter().collect()
    }
}

/// `a/b/123-file.pdf` -> `a/b/123-file-signed.pdf`; no extension gets
/// `-signed` appended
pub fn signed_path_for(storage_path: &str) -> String {
    let path = Path::new(storage_path);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => path
            .with_file_name(format!(
                "{}-signed.{}",
                stem.to_string_lossy(),
                ext.to_string_lossy()
            ))
            .to_string_lossy()
            .into_owned(),
        _ => format!("{}-signed", storage_path),
    }
}

fn temp_path_for(signed_path: &str) -> String {
    format!("{}.tmp", signed_path)
}
