use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not your document")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Failed to serialize PDF: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Why a single field left no mark on the output. Never fatal to the call.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "camelCase")]
pub enum SkipReason {
    #[error("page {0} does not exist")]
    InvalidPage(i64),

    #[error("unknown field type")]
    UnknownType,

    #[error("signature field has no image")]
    MissingSignature,

    #[error("signature image unavailable: {0}")]
    SignatureUnavailable(String),

    #[error("drawing failed: {0}")]
    DrawFailed(String),
}
