//! Vision Layer
//!
//! Pixel-level analysis of field photos: foreground segmentation, visual
//! fingerprints and OCR-oriented renderings of the detected fixture.
//!
//! Everything here is synchronous and CPU-bound. Callers on an async runtime
//! should run it on the blocking pool.

pub mod constants;
pub mod features;
pub mod ocr_preprocess;
pub mod segmentation;

pub use segmentation::DetectionBounds;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::debug;

use crate::capture::RawImage;
use constants::*;

/// Visual fingerprint of a photographed fixture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualFeatures {
    /// Region width / height, always > 0
    pub aspect_ratio: f32,
    /// Fraction of sampled points on a luminance edge (0.0 - 1.0)
    pub edge_density: f32,
    /// Hue of the frame centre in degrees [0, 360)
    pub hue: f32,
    /// Saturation of the frame centre (0.0 - 1.0)
    pub saturation: f32,
    /// Lightness of the frame centre (0.0 - 255.0)
    pub brightness: f32,
}

impl VisualFeatures {
    /// Placeholder carried by images that could not be analysed
    pub fn degenerate() -> Self {
        Self {
            aspect_ratio: 1.0,
            edge_density: 0.0,
            hue: 0.0,
            saturation: 0.0,
            brightness: 0.0,
        }
    }

    /// Check every component against its documented range
    pub fn is_within_bounds(&self) -> bool {
        self.aspect_ratio > 0.0
            && (0.0..=1.0).contains(&self.edge_density)
            && (0.0..360.0).contains(&self.hue)
            && (0.0..=1.0).contains(&self.saturation)
            && (0.0..=255.0).contains(&self.brightness)
    }
}

/// Why a photo was not usable for OCR
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Bytes could not be decoded as an image
    DecodeFailure(String),
    /// Only sky/street detected, or every blob was too small or touched the ground
    SceneRejected,
    /// The selected region is a tall, narrow pole
    PoleShaped,
    /// A region was found but is too far away to read
    InsufficientResolution { width: u32 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::DecodeFailure(e) => write!(f, "Image could not be decoded: {}", e),
            RejectReason::SceneRejected => write!(f, "Only background scenery (sky/street) detected"),
            RejectReason::PoleShaped => write!(f, "Detected object is a pole, not a fixture"),
            RejectReason::InsufficientResolution { width } => {
                write!(f, "Fixture too distant ({}px crop)", width)
            }
        }
    }
}

/// Output of `FeatureExtractor::preprocess`
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// Binarized crop of the fixture region
    pub ocr_crop: DynamicImage,
    /// Tone-inverted copy of `ocr_crop`
    pub inverted_crop: DynamicImage,
    /// Downscaled, otherwise unprocessed full frame
    pub full_frame: DynamicImage,
    /// Visual fingerprint (degenerate when analysis failed early)
    pub features: VisualFeatures,
    verdict: Result<(), RejectReason>,
}

impl PreprocessedImage {
    fn rejected(frame: DynamicImage, features: VisualFeatures, reason: RejectReason) -> Self {
        Self {
            ocr_crop: frame.clone(),
            inverted_crop: frame.clone(),
            full_frame: frame,
            features,
            verdict: Err(reason),
        }
    }

    /// Whether the image is usable for OCR
    pub fn is_valid(&self) -> bool {
        self.verdict.is_ok()
    }

    /// Rejection reason, if any
    pub fn rejection(&self) -> Option<&RejectReason> {
        self.verdict.as_ref().err()
    }

    /// Fingerprint worth remembering: present once a fixture region was found.
    /// Decode failures and rejected scenes carry only the degenerate placeholder.
    pub fn fingerprint(&self) -> Option<VisualFeatures> {
        match &self.verdict {
            Ok(()) | Err(RejectReason::InsufficientResolution { .. }) => Some(self.features),
            Err(_) => None,
        }
    }

    /// Human-readable verdict
    pub fn reason(&self) -> String {
        match &self.verdict {
            Ok(()) => "OK".to_string(),
            Err(reason) => reason.to_string(),
        }
    }

    /// Lightly compressed JPEG of the full frame
    pub fn full_frame_jpeg(&self) -> Result<Vec<u8>, image::ImageError> {
        let rgb = self.full_frame.to_rgb8();
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, FULL_FRAME_JPEG_QUALITY).encode_image(&rgb)?;
        Ok(buf)
    }
}

/// Configuration for segmentation and feature extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Longest side of the working frame for `preprocess`
    pub max_dimension: u32,
    /// Longest side of the working frame for `score`
    pub score_max_dimension: u32,
    /// Stride of the background sampling grid
    pub sample_stride: u32,
    /// Minimum blob size as a fraction of the sampled frame
    pub min_blob_area_fraction: f32,
    /// Blobs reaching below this fraction of the height are ground bleed-through
    pub bottom_margin_fraction: f32,
    /// Maximum region height/width
    pub max_pole_aspect: f32,
    /// Visited-node guard per connected component
    pub max_visited_nodes: usize,
    /// Padding around the selected blob
    pub region_padding: u32,
    /// Minimum width of the upscaled OCR crop
    pub min_crop_width: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            score_max_dimension: SCORE_MAX_DIMENSION,
            sample_stride: SAMPLE_STRIDE,
            min_blob_area_fraction: MIN_BLOB_AREA_FRACTION,
            bottom_margin_fraction: BOTTOM_MARGIN_FRACTION,
            max_pole_aspect: MAX_POLE_ASPECT,
            max_visited_nodes: MAX_VISITED_NODES,
            region_padding: REGION_PADDING,
            min_crop_width: MIN_CROP_WIDTH,
        }
    }
}

/// Segmentation and feature extraction front-end
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: VisionConfig,
}

impl FeatureExtractor {
    /// Create an extractor with default tuning
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with custom tuning
    pub fn with_config(config: VisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Analyse a photo and produce OCR renderings plus a fingerprint.
    ///
    /// Never fails: undecodable or unusable photos come back invalid, with a
    /// reason and a (possibly degenerate) features vector.
    pub fn preprocess(&self, image: &RawImage) -> PreprocessedImage {
        let start = Instant::now();

        let frame = match decode_frame(&image.data, self.config.max_dimension) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Failed to decode {}: {}", image.name, e);
                return PreprocessedImage::rejected(
                    DynamicImage::new_luma8(0, 0),
                    VisualFeatures::degenerate(),
                    RejectReason::DecodeFailure(e.to_string()),
                );
            }
        };

        let bounds = match segmentation::detect_object(&frame, &self.config) {
            Ok(bounds) => bounds,
            Err(reason) => {
                debug!("{}: {}", image.name, reason);
                return PreprocessedImage::rejected(
                    DynamicImage::ImageRgb8(frame),
                    VisualFeatures::degenerate(),
                    reason,
                );
            }
        };

        let features = features::extract_features(&frame, &bounds);
        let crop = ocr_preprocess::enhance_region(&frame, &bounds);

        let verdict = if crop.width < self.config.min_crop_width {
            Err(RejectReason::InsufficientResolution { width: crop.width })
        } else {
            Ok(())
        };

        debug!(
            "Preprocessed {} in {:?}: region {:?}, verdict {:?}",
            image.name,
            start.elapsed(),
            bounds,
            verdict
        );

        PreprocessedImage {
            ocr_crop: DynamicImage::ImageLuma8(crop.normal),
            inverted_crop: DynamicImage::ImageLuma8(crop.inverted),
            full_frame: DynamicImage::ImageRgb8(frame),
            features,
            verdict,
        }
    }

    /// Quality score used to pick the best of several photos of one fixture.
    ///
    /// Higher is better; 0 for undecodable or rejected scenes.
    pub fn score(&self, image: &RawImage) -> f32 {
        let Ok(frame) = decode_frame(&image.data, self.config.score_max_dimension) else {
            return 0.0;
        };

        let Ok(bounds) = segmentation::detect_object(&frame, &self.config) else {
            return 0.0;
        };

        let features = features::extract_features(&frame, &bounds);
        combine_score(bounds.area_fraction, features.edge_density, features.brightness)
    }
}

/// Weighted blend of region size and detail, with a small exposure bonus
pub fn combine_score(area_fraction: f32, edge_density: f32, brightness: f32) -> f32 {
    let (low, high) = WELL_EXPOSED_RANGE;
    let bonus = if (low..=high).contains(&brightness) {
        SCORE_BRIGHTNESS_BONUS
    } else {
        0.0
    };
    area_fraction.clamp(0.0, 1.0) * SCORE_AREA_WEIGHT
        + edge_density.clamp(0.0, 1.0) * SCORE_EDGE_WEIGHT
        + bonus
}

/// Decode and shrink so the longest side is at most `max_dimension`
fn decode_frame(data: &[u8], max_dimension: u32) -> Result<RgbImage, image::ImageError> {
    let decoded = image::load_from_memory(data)?;
    let (w, h) = (decoded.width(), decoded.height());

    if w > max_dimension || h > max_dimension {
        let ratio = (max_dimension as f32 / w as f32).min(max_dimension as f32 / h as f32);
        let new_w = ((w as f32 * ratio) as u32).max(1);
        let new_h = ((h as f32 * ratio) as u32).max(1);
        Ok(decoded.resize_exact(new_w, new_h, FilterType::Triangle).to_rgb8())
    } else {
        Ok(decoded.to_rgb8())
    }
}
