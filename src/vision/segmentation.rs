//! Foreground segmentation
//!
//! Finds the fixture in a field photo by discarding sky and blown-out
//! background on a coarse sampling grid, then labelling the remaining
//! foreground with an explicit-stack connected-component pass.
//!
//! This is an approximation: the mask is sampled every `sample_stride`
//! pixels, so blob boxes are accurate to one grid cell and thin structures
//! narrower than the stride can be missed or split.

use image::RgbImage;
use tracing::debug;

use super::{RejectReason, VisionConfig};

/// Bounding box of the region selected for OCR, in frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Fraction of the frame covered by the padded box
    pub area_fraction: f32,
}

/// A connected region of foreground samples (grid coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blob {
    pub min_gx: usize,
    pub min_gy: usize,
    pub max_gx: usize,
    pub max_gy: usize,
    /// Number of grid samples in the blob
    pub samples: usize,
}

impl Blob {
    fn at(gx: usize, gy: usize) -> Self {
        Self {
            min_gx: gx,
            min_gy: gy,
            max_gx: gx,
            max_gy: gy,
            samples: 0,
        }
    }

    fn include(&mut self, gx: usize, gy: usize) {
        self.min_gx = self.min_gx.min(gx);
        self.min_gy = self.min_gy.min(gy);
        self.max_gx = self.max_gx.max(gx);
        self.max_gy = self.max_gy.max(gy);
        self.samples += 1;
    }
}

/// Down-sampled boolean foreground mask
#[derive(Debug, Clone)]
pub struct ForegroundMask {
    pub grid_width: usize,
    pub grid_height: usize,
    cells: Vec<bool>,
}

impl ForegroundMask {
    /// Sample `image` every `stride` pixels and mark non-background samples
    pub fn sample(image: &RgbImage, stride: u32) -> Self {
        let stride = stride.max(1);
        let (width, height) = image.dimensions();
        let grid_width = width.div_ceil(stride) as usize;
        let grid_height = height.div_ceil(stride) as usize;

        let mut cells = Vec::with_capacity(grid_width * grid_height);
        for gy in 0..grid_height {
            for gx in 0..grid_width {
                let px = image.get_pixel(gx as u32 * stride, gy as u32 * stride);
                cells.push(!is_background(px[0], px[1], px[2]));
            }
        }

        Self {
            grid_width,
            grid_height,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn is_foreground(&self, idx: usize) -> bool {
        self.cells[idx]
    }
}

/// Label 4-connected foreground components.
///
/// Uses an explicit stack, never recursion. Each component stops growing once
/// it has visited `max_visited` nodes; cells already queued stay marked so the
/// outer scan does not restart from them.
pub fn label_components(mask: &ForegroundMask, max_visited: usize) -> Vec<Blob> {
    let (gw, gh) = (mask.grid_width, mask.grid_height);
    let mut visited = vec![false; mask.len()];
    let mut stack: Vec<usize> = Vec::new();
    let mut blobs = Vec::new();

    for start in 0..mask.len() {
        if visited[start] || !mask.is_foreground(start) {
            continue;
        }

        visited[start] = true;
        stack.clear();
        stack.push(start);

        let mut blob = Blob::at(start % gw, start / gw);
        let mut visited_nodes = 0usize;

        while let Some(idx) = stack.pop() {
            if visited_nodes >= max_visited {
                debug!("Component search hit the {} node guard", max_visited);
                break;
            }
            visited_nodes += 1;

            let (gx, gy) = (idx % gw, idx / gw);
            blob.include(gx, gy);

            let mut push = |n: usize| {
                if !visited[n] && mask.is_foreground(n) {
                    visited[n] = true;
                    stack.push(n);
                }
            };

            if gx + 1 < gw {
                push(idx + 1);
            }
            if gx > 0 {
                push(idx - 1);
            }
            if gy + 1 < gh {
                push(idx + gw);
            }
            if gy > 0 {
                push(idx - gw);
            }
        }

        blobs.push(blob);
    }

    blobs
}

/// Locate the fixture region in `image`.
///
/// Returns the padded box of the largest plausible blob, or the reason the
/// scene was rejected.
pub fn detect_object(image: &RgbImage, config: &VisionConfig) -> Result<DetectionBounds, RejectReason> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(RejectReason::SceneRejected);
    }

    let stride = config.sample_stride.max(1);
    let mask = ForegroundMask::sample(image, stride);
    let blobs = label_components(&mask, config.max_visited_nodes);

    let min_samples = config.min_blob_area_fraction * mask.len() as f32;
    let ground_line = height as f32 * config.bottom_margin_fraction;

    // Pixel extent of a grid cell runs to the next sample row, clamped to the frame
    let cell_end = |g: usize, limit: u32| ((g as u32 + 1) * stride).min(limit);

    let best = blobs
        .iter()
        .filter(|b| (b.samples as f32) >= min_samples)
        .filter(|b| ((cell_end(b.max_gy, height) - 1) as f32) <= ground_line)
        .fold(None::<&Blob>, |best, b| match best {
            Some(current) if current.samples >= b.samples => Some(current),
            _ => Some(b),
        });

    let Some(best) = best else {
        debug!(
            "Scene rejected: {} blobs, none above {:.0} samples clear of the ground",
            blobs.len(),
            min_samples
        );
        return Err(RejectReason::SceneRejected);
    };

    let pad = config.region_padding;
    let x0 = (best.min_gx as u32 * stride).saturating_sub(pad);
    let y0 = (best.min_gy as u32 * stride).saturating_sub(pad);
    let x1 = (cell_end(best.max_gx, width) + pad).min(width);
    let y1 = (cell_end(best.max_gy, height) + pad).min(height);

    let bounds = DetectionBounds {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
        area_fraction: ((x1 - x0) * (y1 - y0)) as f32 / (width * height) as f32,
    };

    if bounds.height as f32 / bounds.width.max(1) as f32 > config.max_pole_aspect {
        debug!("Region {}x{} rejected as pole-shaped", bounds.width, bounds.height);
        return Err(RejectReason::PoleShaped);
    }

    Ok(bounds)
}

/// Sky or overexposed backdrop
pub fn is_background(r: u8, g: u8, b: u8) -> bool {
    let (h, s, l) = rgb_to_hsl(r as f32, g as f32, b as f32);
    let blue_hue = h > 170.0 && h < 270.0;
    if blue_hue && s > 0.15 && l > 0.3 {
        return true;
    }
    l > 0.95 && s < 0.1
}

/// Convert 0-255 RGB to (hue degrees in [0,360), saturation, lightness)
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let (r, g, b) = (r / 255.0, g / 255.0, b / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f32::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let sector = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    let mut h = sector * 60.0;
    if h >= 360.0 {
        h -= 360.0;
    }
    (h.max(0.0), s.clamp(0.0, 1.0), l)
}
