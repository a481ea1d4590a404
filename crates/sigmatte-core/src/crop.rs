//! Trim a matted signature to its visible ink

use crate::error::MatteError;
use crate::raster::RasterImage;
use image::imageops;

/// Pixel rectangle within a raster, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Tight box around every pixel with alpha > 0, or `None` if there is none
pub fn bounding_box(image: &RasterImage) -> Option<CropBox> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, px) in image.as_rgba().enumerate_pixels() {
        if px.0[3] == 0 {
            continue;
        }
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
        found = true;
    }

    if !found {
        return None;
    }

    Some(CropBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Crop to the visible ink. An image with no visible pixel is an
/// `EmptySignature` error rather than a zero-size result.
pub fn crop(image: RasterImage) -> Result<RasterImage, MatteError> {
    let bbox = bounding_box(&image).ok_or(MatteError::EmptySignature)?;

    if bbox.x == 0 && bbox.y == 0 && bbox.width == image.width() && bbox.height == image.height()
    {
        return Ok(image);
    }

    let cropped = imageops::crop_imm(image.as_rgba(), bbox.x, bbox.y, bbox.width, bbox.height);
    Ok(cropped.to_image().into())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn sparse_alpha() -> impl Strategy<Value = RasterImage> {
        (1u32..16, 1u32..16)
            .prop_flat_map(|(w, h)| {
                (
                    Just((w, h)),
                    prop::collection::vec(prop_oneof![4 => Just(0u8), 1 => 1u8..=255], (w * h) as usize),
                    (0..w, 0..h),
                )
            })
            .prop_map(|((w, h), mut alphas, (sx, sy))| {
                // Guarantee at least one visible pixel
                alphas[(sy * w + sx) as usize] = 255;
                let pixels = alphas.iter().flat_map(|&a| [0, 0, 0, a]).collect();
                RasterImage::from_rgba(w, h, pixels).unwrap()
            })
    }

    proptest! {
        /// Property: every border line of the crop touches visible ink
        #[test]
        fn crop_is_tight(img in sparse_alpha()) {
            let out = crop(img).unwrap();
            let (w, h) = (out.width(), out.height());
            prop_assert!((0..w).any(|x| out.alpha(x, 0) > 0), "top row empty");
            prop_assert!((0..w).any(|x| out.alpha(x, h - 1) > 0), "bottom row empty");
            prop_assert!((0..h).any(|y| out.alpha(0, y) > 0), "left column empty");
            prop_assert!((0..h).any(|y| out.alpha(w - 1, y) > 0), "right column empty");
        }

        /// Property: cropping never drops visible ink
        #[test]
        fn crop_keeps_all_ink(img in sparse_alpha()) {
            let visible = img.pixels().chunks_exact(4).filter(|px| px[3] > 0).count();
            let out = crop(img).unwrap();
            let kept = out.pixels().chunks_exact(4).filter(|px| px[3] > 0).count();
            prop_assert_eq!(visible, kept);
        }
    }
}
