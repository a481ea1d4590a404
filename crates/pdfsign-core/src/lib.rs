//! Field compositing and signing for uploaded PDFs
//!
//! Callers submit percent-positioned fields (text, date, signature image,
//! radio) against a stored PDF. The pipeline bakes them into the page
//! content, writes the signed copy next to the original and records a
//! SHA-256 anchored audit entry.
//!
//! - [`coords`]: percent rectangles to PDF page space
//! - [`render`]: content-stream drawing per field kind
//! - [`pipeline`]: load → render → persist → audit, serialized per document

pub mod audit;
pub mod coords;
pub mod document;
pub mod error;
pub mod fetch;
pub mod field;
pub mod lock;
pub mod pipeline;
pub mod render;
pub mod store;

pub use audit::{sha256_hex, AuditRecord};
pub use coords::{to_page_rect, to_percent_rect, PageRect};
pub use document::SigningDocument;
pub use error::{SignError, SkipReason};
pub use fetch::{FetchError, HttpFetcher, ImageFetcher, DEFAULT_FETCH_TIMEOUT};
pub use field::{effective_font_size, parse_fields, validate_submission, Field, FieldKind};
pub use lock::{DocumentGuard, DocumentLocks};
pub use pipeline::{signed_path_for, SignOutcome, SignRequest, SigningPipeline};
pub use render::{render_fields, FieldOutcome, RenderContext, SignatureImages};
pub use store::{DocumentRecord, DocumentStatus, DocumentStore, MemoryStore};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<usize, SignError> {
    Ok(SigningDocument::load(bytes)?.page_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::create_test_pdf;

    #[test]
    fn test_get_page_count() {
        let pdf = create_test_pdf(&[(612, 792), (612, 792), (595, 842)]);
        assert_eq!(get_page_count(&pdf).unwrap(), 3);
    }

    #[test]
    fn test_get_page_count_rejects_garbage() {
        assert!(matches!(
            get_page_count(&[0u8; 64]),
            Err(SignError::ParseError(_))
        ));
    }
}
