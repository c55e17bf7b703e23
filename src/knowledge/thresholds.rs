//! Decision thresholds and confidence tiers

/// Visual distance below which two photos show the same physical fixture
pub const EXACT_DUPLICATE_DISTANCE: f32 = 0.05;
/// Visual distance below which a fixture is related enough to fill gaps
pub const VISUAL_FUSION_DISTANCE: f32 = 0.20;

pub const CONFIDENCE_MODEL_AND_POWER: f32 = 0.92;
pub const CONFIDENCE_MODEL_ONLY: f32 = 0.70;
pub const CONFIDENCE_POWER_ONLY: f32 = 0.60;
pub const CONFIDENCE_NONE: f32 = 0.20;
pub const CONFIDENCE_DUPLICATE: f32 = 1.0;
/// Confidence when the advisor supplied a model the heuristics missed
pub const CONFIDENCE_ADVISOR_MODEL: f32 = 0.85;
/// Minimum confidence when visual memory supplied the model
pub const CONFIDENCE_VISUAL_MODEL: f32 = 0.75;
/// Results below this get visual-memory enrichment
pub const VISUAL_FUSION_FLOOR: f32 = 0.80;
/// Results below this go to manual review
pub const DEFAULT_REVIEW_THRESHOLD: f32 = 0.85;

/// Fuzzy match tolerance for long model names
pub const FUZZY_DEFAULT_TOLERANCE: usize = 2;
/// Non-digit characters allowed between a model name and its power
pub const MODEL_VALUE_WINDOW: usize = 10;
/// Characters of normalised OCR text kept on the result
pub const RAW_TEXT_LIMIT: usize = 80;

/// Exclusive bounds for a plausible rated power in watts
pub const MIN_PLAUSIBLE_POWER: u32 = 10;
pub const MAX_PLAUSIBLE_POWER: u32 = 500;
/// Line voltages and label years that look like powers
pub const POWER_DENYLIST: [u32; 7] = [110, 127, 220, 380, 2023, 2024, 2025];

/// Whether `power` could be a rated wattage
pub fn is_plausible_power(power: u32) -> bool {
    power > MIN_PLAUSIBLE_POWER && power < MAX_PLAUSIBLE_POWER && !POWER_DENYLIST.contains(&power)
}
