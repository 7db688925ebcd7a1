//! Image normalization for breed photo uploads

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;

use crate::error::Result;

/// Target shape for uploaded images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    /// JPEG quality factor, 0 to 100
    pub quality: u8,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 900,
            quality: 88,
        }
    }
}

/// A crop window inside a source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The centered window of `target_w : target_h` aspect inside a
/// `src_w` x `src_h` image. A wider-than-target source keeps full height
/// and slices horizontally; a taller one keeps full width and slices
/// vertically. Extents round to nearest, offsets round down.
pub fn center_crop_rect(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> CropRect {
    if src_w == 0 || src_h == 0 || target_w == 0 || target_h == 0 {
        return CropRect {
            x: 0,
            y: 0,
            width: src_w,
            height: src_h,
        };
    }

    let target_ratio = target_w as f64 / target_h as f64;
    let src_ratio = src_w as f64 / src_h as f64;

    let (crop_w, crop_h) = if src_ratio > target_ratio {
        let w = (src_h as f64 * target_ratio).round() as u32;
        (w.min(src_w), src_h)
    } else {
        let h = (src_w as f64 / target_ratio).round() as u32;
        (src_w, h.min(src_h))
    };

    CropRect {
        x: ((src_w - crop_w) as f64 / 2.0).floor() as u32,
        y: ((src_h - crop_h) as f64 / 2.0).floor() as u32,
        width: crop_w,
        height: crop_h,
    }
}

/// Decode raw image bytes, center-crop to the spec's aspect, resize to
/// its exact dimensions, and re-encode as JPEG at its quality factor.
pub fn normalize_image(bytes: &[u8], spec: &ImageSpec) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let (src_w, src_h) = img.dimensions();
    let rect = center_crop_rect(src_w, src_h, spec.width, spec.height);

    let resized = img
        .crop_imm(rect.x, rect.y, rect.width, rect.height)
        .resize_exact(spec.width, spec.height, FilterType::Lanczos3);
    let rgb = resized.to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, spec.quality).encode_image(&rgb)?;
    Ok(out)
}
