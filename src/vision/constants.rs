//! Tuning constants for segmentation and feature extraction

/// Longest side of the working frame used by `preprocess`
pub const MAX_DIMENSION: u32 = 2000;

/// Longest side of the working frame used by `score`
pub const SCORE_MAX_DIMENSION: u32 = 600;

/// Pixel stride of the background sampling grid
pub const SAMPLE_STRIDE: u32 = 8;

/// Smallest blob kept, as a fraction of the frame's sampled area
pub const MIN_BLOB_AREA_FRACTION: f32 = 0.02;

/// A blob whose lowest pixel lies below this fraction of the frame height
/// touches the ground and is discarded
pub const BOTTOM_MARGIN_FRACTION: f32 = 0.99;

/// Height/width ratio above which a region is considered a pole
pub const MAX_POLE_ASPECT: f32 = 3.0;

/// Visited-node guard for one connected-component search
pub const MAX_VISITED_NODES: usize = 150_000;

/// Padding added around the selected blob, in pixels
pub const REGION_PADDING: u32 = 20;

/// Minimum width of the upscaled OCR crop
pub const MIN_CROP_WIDTH: u32 = 150;

/// Regions covering less than this fraction of the frame get the large upscale
pub const SMALL_REGION_FRACTION: f32 = 0.15;
pub const SMALL_REGION_SCALE: f32 = 3.0;
pub const LARGE_REGION_SCALE: f32 = 1.5;

/// Grid step for luminance-gradient sampling
pub const EDGE_SAMPLE_STEP: u32 = 4;

/// Luminance difference counted as an edge
pub const EDGE_LUMA_DELTA: f32 = 20.0;

/// Side of the central colour crop, as a fraction of the frame
pub const CENTER_CROP_FRACTION: f32 = 0.4;

/// Gray level above which a sharpened pixel becomes white
pub const BINARIZE_THRESHOLD: u8 = 160;

/// JPEG quality of the full-frame copy sent to the advisor
pub const FULL_FRAME_JPEG_QUALITY: u8 = 80;

/// Weights of the batch-selection score
pub const SCORE_AREA_WEIGHT: f32 = 0.6;
pub const SCORE_EDGE_WEIGHT: f32 = 0.4;
pub const SCORE_BRIGHTNESS_BONUS: f32 = 0.05;

/// Mean brightness range that earns the score bonus
pub const WELL_EXPOSED_RANGE: (f32, f32) = (60.0, 200.0);
