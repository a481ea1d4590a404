use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatteError {
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Failed to encode PNG: {0}")]
    EncodeError(String),

    #[error("Invalid matte strength: {0} (must be a positive number)")]
    InvalidStrength(f32),

    #[error("Pixel buffer is {actual} bytes, expected {expected} for the given dimensions")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Signature is empty: no visible ink after matting")]
    EmptySignature,

    #[error("Matte worker is no longer running")]
    WorkerGone,
}
