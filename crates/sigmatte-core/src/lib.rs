//! Signature matting
//!
//! Turns a photographed or scanned signature into a transparent PNG of
//! black ink, tightly cropped:
//! - [`matte::matte`]: percentile ink/background estimate + gamma alpha
//! - [`crop::crop`]: trim to the visible ink
//! - [`worker::MatteWorker`]: the same chain on a dedicated thread

pub mod crop;
pub mod error;
pub mod matte;
pub mod raster;
pub mod worker;

pub use crop::{bounding_box, crop, CropBox};
pub use error::MatteError;
pub use matte::{estimate_levels, matte, InkLevels};
pub use raster::RasterImage;
pub use worker::{MatteReply, MatteRequest, MatteWorker, PendingMatte};

/// Matte, crop and PNG-encode an already decoded image
pub fn process(image: RasterImage, strength: f32) -> Result<Vec<u8>, MatteError> {
    let matted = matte(image, strength)?;
    let cropped = crop(matted)?;
    cropped.encode_png()
}

/// Decode an uploaded photo and return the cleaned signature as PNG bytes
pub fn remove_background(bytes: &[u8], strength: f32) -> Result<Vec<u8>, MatteError> {
    matte::validate_strength(strength)?;
    process(RasterImage::decode(bytes)?, strength)
}
