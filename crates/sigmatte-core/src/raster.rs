//! Owned RGBA raster buffers and their PNG/JPEG codec boundary

use crate::error::MatteError;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use std::fmt;

/// RGBA8 image. Each pipeline stage takes it by value and hands it on.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage(RgbaImage);

impl RasterImage {
    /// Wrap an existing row-major RGBA buffer, checking it matches the dimensions
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, MatteError> {
        let expected = width as usize * height as usize * 4;
        let actual = pixels.len();
        if actual != expected {
            return Err(MatteError::BufferSizeMismatch { expected, actual });
        }
        RgbaImage::from_raw(width, height, pixels)
            .map(Self)
            .ok_or(MatteError::BufferSizeMismatch { expected, actual })
    }

    /// Decode any supported raster format (PNG, JPEG) into RGBA8
    pub fn decode(bytes: &[u8]) -> Result<Self, MatteError> {
        let rgba = image::load_from_memory(bytes)
            .map_err(|e| MatteError::DecodeError(e.to_string()))?
            .to_rgba8();
        Ok(Self(rgba))
    }

    /// Encode as an RGBA PNG
    pub fn encode_png(&self) -> Result<Vec<u8>, MatteError> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(
                self.0.as_raw(),
                self.width(),
                self.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| MatteError::EncodeError(e.to_string()))?;
        Ok(out)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.0
    }

    pub fn as_rgba_mut(&mut self) -> &mut RgbaImage {
        &mut self.0
    }

    /// Raw row-major RGBA bytes
    pub fn pixels(&self) -> &[u8] {
        self.0.as_raw()
    }

    /// RGBA components of the pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.0.get_pixel(x, y).0
    }

    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.0.get_pixel(x, y).0[3]
    }
}

impl From<RgbaImage> for RasterImage {
    fn from(image: RgbaImage) -> Self {
        Self(image)
    }
}

// Pixel buffers can be megabytes; keep Debug output to the shape.
impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("bytes", &self.pixels().len())
            .finish()
    }
}
