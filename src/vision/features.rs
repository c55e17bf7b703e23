//! Visual fingerprint computation

use image::RgbImage;

use super::constants::{CENTER_CROP_FRACTION, EDGE_LUMA_DELTA, EDGE_SAMPLE_STEP};
use super::segmentation::{rgb_to_hsl, DetectionBounds};
use super::VisualFeatures;

/// Compute the fingerprint of a detected region.
///
/// Edge density and aspect ratio describe the region itself; colour comes
/// from the centre of the whole frame, which is stable under small framing
/// differences between photos of the same fixture.
pub fn extract_features(image: &RgbImage, bounds: &DetectionBounds) -> VisualFeatures {
    let aspect_ratio = if bounds.height > 0 {
        bounds.width as f32 / bounds.height as f32
    } else {
        1.0
    };

    let (hue, saturation, lightness) = center_hsl(image);

    VisualFeatures {
        aspect_ratio: aspect_ratio.max(f32::MIN_POSITIVE),
        edge_density: edge_density(image, bounds),
        hue,
        saturation,
        brightness: (lightness * 255.0).clamp(0.0, 255.0),
    }
}

/// Fraction of grid samples inside `bounds` with a strong luminance step
/// to the right or below
pub fn edge_density(image: &RgbImage, bounds: &DetectionBounds) -> f32 {
    let step = EDGE_SAMPLE_STEP;
    let (img_w, img_h) = image.dimensions();
    let x_end = (bounds.x + bounds.width).min(img_w);
    let y_end = (bounds.y + bounds.height).min(img_h);

    let mut edges = 0u32;
    let mut count = 0u32;

    let mut y = bounds.y;
    while y + step < y_end {
        let mut x = bounds.x;
        while x + step < x_end {
            let lum = luminance(image, x, y);
            let right = luminance(image, x + step, y);
            let down = luminance(image, x, y + step);
            if (lum - right).abs() > EDGE_LUMA_DELTA || (lum - down).abs() > EDGE_LUMA_DELTA {
                edges += 1;
            }
            count += 1;
            x += step;
        }
        y += step;
    }

    if count == 0 {
        0.0
    } else {
        edges as f32 / count as f32
    }
}

/// HSL of the mean colour of the central crop, sampling every 4th pixel
fn center_hsl(image: &RgbImage) -> (f32, f32, f32) {
    let (width, height) = image.dimensions();
    let crop_w = (width as f32 * CENTER_CROP_FRACTION) as u32;
    let crop_h = (height as f32 * CENTER_CROP_FRACTION) as u32;
    let start_x = (width - crop_w) / 2;
    let start_y = (height - crop_h) / 2;

    let (mut r, mut g, mut b, mut n) = (0.0f64, 0.0f64, 0.0f64, 0u64);
    let total = (crop_w * crop_h) as usize;
    for i in (0..total).step_by(4) {
        let x = start_x + (i as u32 % crop_w);
        let y = start_y + (i as u32 / crop_w);
        let px = image.get_pixel(x, y);
        r += px[0] as f64;
        g += px[1] as f64;
        b += px[2] as f64;
        n += 1;
    }

    if n == 0 {
        return rgb_to_hsl(128.0, 128.0, 128.0);
    }

    let n = n as f64;
    rgb_to_hsl((r / n) as f32, (g / n) as f32, (b / n) as f32)
}

fn luminance(image: &RgbImage, x: u32, y: u32) -> f32 {
    let px = image.get_pixel(x, y);
    0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32
}
