//! Global-threshold ink matting
//!
//! Brightness is sampled over the whole image; the 5th and 95th percentiles
//! stand in for the ink and paper levels. Every pixel then gets an alpha
//! from where its brightness falls between the two, shaped by a gamma
//! exponent (`strength`). Output ink is always pure black.

use crate::error::MatteError;
use crate::raster::RasterImage;
use image::Rgba;
use tracing::debug;

pub const INK_PERCENTILE: f64 = 0.05;
pub const BACKGROUND_PERCENTILE: f64 = 0.95;

/// Estimated brightness of the ink strokes and of the paper
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InkLevels {
    pub ink: f32,
    pub background: f32,
}

impl InkLevels {
    /// Alpha byte for a pixel of the given brightness.
    ///
    /// A flat image (`background == ink`) classifies nothing as ink.
    pub fn alpha_for(&self, brightness: f32, strength: f32) -> u8 {
        let range = self.background - self.ink;
        if range <= 0.0 {
            return 0;
        }
        let alpha = ((self.background - brightness) / range)
            .clamp(0.0, 1.0)
            .powf(strength);
        (alpha * 255.0).round() as u8
    }
}

/// Mean of the R, G and B channels
pub fn brightness(px: &[u8]) -> f32 {
    (px[0] as f32 + px[1] as f32 + px[2] as f32) / 3.0
}

/// Percentile-based ink/background estimate; `None` for an empty image
pub fn estimate_levels(image: &RasterImage) -> Option<InkLevels> {
    let mut samples: Vec<f32> = image
        .as_rgba()
        .pixels()
        .map(|px| brightness(&px.0))
        .collect();
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(|a, b| a.total_cmp(b));

    let n = samples.len();
    let at = |p: f64| samples[((n as f64 * p).floor() as usize).min(n - 1)];

    Some(InkLevels {
        ink: at(INK_PERCENTILE),
        background: at(BACKGROUND_PERCENTILE),
    })
}

pub fn validate_strength(strength: f32) -> Result<(), MatteError> {
    if strength.is_finite() && strength > 0.0 {
        Ok(())
    } else {
        Err(MatteError::InvalidStrength(strength))
    }
}

/// Replace every pixel with black ink whose alpha encodes how ink-like it was
pub fn matte(mut image: RasterImage, strength: f32) -> Result<RasterImage, MatteError> {
    validate_strength(strength)?;

    let Some(levels) = estimate_levels(&image) else {
        return Ok(image);
    };
    debug!(
        ink = levels.ink,
        background = levels.background,
        strength,
        "matting {}x{} image",
        image.width(),
        image.height()
    );

    for px in image.as_rgba_mut().pixels_mut() {
        let alpha = levels.alpha_for(brightness(&px.0), strength);
        *px = Rgba([0, 0, 0, alpha]);
    }

    Ok(image)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn gray_image(width: u32, height: u32, levels: &[u8]) -> RasterImage {
        let pixels = levels.iter().flat_map(|&v| [v, v, v, 255]).collect();
        RasterImage::from_rgba(width, height, pixels).unwrap()
    }

    /// 8x8 checkerboard of 40/220 with the dark cell at (4, 4) set to 130
    fn checkerboard() -> RasterImage {
        let mut levels = Vec::with_capacity(64);
        for y in 0..8u32 {
            for x in 0..8u32 {
                let v = if (x, y) == (4, 4) {
                    130
                } else if (x + y) % 2 == 0 {
                    40
                } else {
                    220
                };
                levels.push(v);
            }
        }
        gray_image(8, 8, &levels)
    }

    #[test]
    fn test_checkerboard_levels() {
        // Sorted: 31 x 40, one 130, 32 x 220. Index 3 -> 40, index 60 -> 220.
        let levels = estimate_levels(&checkerboard()).unwrap();
        assert_eq!(levels.ink, 40.0);
        assert_eq!(levels.background, 220.0);
    }

    #[test]
    fn test_checkerboard_interior_alpha() {
        let out = matte(checkerboard(), 1.0).unwrap();
        // (220 - 130) / 180 = 0.5 -> 127.5 rounds to 128
        assert_eq!(out.pixel(4, 4), [0, 0, 0, 128]);
        assert_eq!(out.pixel(2, 2), [0, 0, 0, 255]);
        assert_eq!(out.pixel(3, 2), [0, 0, 0, 0]);

        let sharper = matte(checkerboard(), 2.0).unwrap();
        // 0.5^2 * 255 = 63.75
        assert_eq!(sharper.alpha(4, 4), 64);
    }

    #[test]
    fn test_uniform_gray_is_fully_transparent() {
        let out = matte(gray_image(4, 4, &[128; 16]), 1.5).unwrap();
        assert!(out.pixels().chunks_exact(4).all(|px| px == [0, 0, 0, 0]));
    }

    #[test]
    fn test_colored_ink_becomes_black() {
        let mut pixels = Vec::new();
        for i in 0..20 {
            if i < 5 {
                pixels.extend_from_slice(&[20, 40, 200, 255]); // blue pen
            } else {
                pixels.extend_from_slice(&[250, 250, 245, 255]); // paper
            }
        }
        let img = RasterImage::from_rgba(20, 1, pixels).unwrap();
        let out = matte(img, 1.0).unwrap();
        assert_eq!(out.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(out.pixel(19, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_rejects_non_positive_strength() {
        for strength in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = matte(gray_image(1, 1, &[0]), strength).unwrap_err();
            assert!(matches!(err, MatteError::InvalidStrength(_)));
        }
    }

    #[test]
    fn test_empty_image_passes_through() {
        let img = RasterImage::from_rgba(0, 0, Vec::new()).unwrap();
        let out = matte(img, 1.0).unwrap();
        assert!(out.is_empty());
    }
}
