//! Image enhancement for OCR
//!
//! Turns the detected fixture region into renderings Tesseract reads well:
//! a distance-compensating upscale, luminance conversion, a 3x3 sharpen and
//! hard binarization, plus a tone-inverted copy for light-on-dark labels.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use tracing::debug;

use super::constants::{
    BINARIZE_THRESHOLD, LARGE_REGION_SCALE, SMALL_REGION_FRACTION, SMALL_REGION_SCALE,
};
use super::segmentation::DetectionBounds;

/// Enhanced renderings of the detected region
pub struct EnhancedCrop {
    /// Binarized crop, dark text on light background
    pub normal: GrayImage,
    /// Tone-inverted copy of `normal`
    pub inverted: GrayImage,
    /// Width after upscaling
    pub width: u32,
}

/// Upscale factor for a region covering `area_fraction` of the frame.
/// Distant fixtures (small regions) get the larger factor.
pub fn region_scale(area_fraction: f32) -> f32 {
    if area_fraction < SMALL_REGION_FRACTION {
        SMALL_REGION_SCALE
    } else {
        LARGE_REGION_SCALE
    }
}

/// Crop `bounds` out of `frame` and build both OCR renderings
pub fn enhance_region(frame: &RgbImage, bounds: &DetectionBounds) -> EnhancedCrop {
    let crop = imageops::crop_imm(frame, bounds.x, bounds.y, bounds.width, bounds.height).to_image();
    let scale = region_scale(bounds.area_fraction);
    let upscaled = apply_upscale(&crop, scale);

    debug!(
        "OCR crop {}x{} scaled by {} to {}x{}",
        crop.width(),
        crop.height(),
        scale,
        upscaled.width(),
        upscaled.height()
    );

    let gray = apply_grayscale(&upscaled);
    let sharpened = imageproc::filter::sharpen3x3(&gray);
    let normal = apply_binarize(&sharpened, BINARIZE_THRESHOLD);

    let mut inverted = normal.clone();
    imageops::invert(&mut inverted);

    EnhancedCrop {
        width: normal.width(),
        normal,
        inverted,
    }
}

/// Resize by a fractional factor with a high-quality filter
fn apply_upscale(image: &RgbImage, scale: f32) -> RgbImage {
    let new_w = ((image.width() as f32 * scale) as u32).max(1);
    let new_h = ((image.height() as f32 * scale) as u32).max(1);
    imageops::resize(image, new_w, new_h, FilterType::CatmullRom)
}

/// Luminance with the standard weights
fn apply_grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        let gray = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
        Luma([gray as u8])
    })
}

/// Hard threshold: above `threshold` becomes white, everything else black
fn apply_binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = if pixel[0] > threshold { 255 } else { 0 };
    }
    out
}
