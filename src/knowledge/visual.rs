//! Visual memory matching

use super::TrainingExample;
use crate::vision::VisualFeatures;

const ASPECT_WEIGHT: f32 = 0.45;
const EDGE_WEIGHT: f32 = 0.35;
const HUE_WEIGHT: f32 = 0.10;
const BRIGHTNESS_WEIGHT: f32 = 0.05;
const SATURATION_WEIGHT: f32 = 0.05;

/// Weighted, normalised difference between two fingerprints.
///
/// Aspect ratio is measured relative to the reference, hue on the circle.
pub fn visual_distance(current: &VisualFeatures, reference: &VisualFeatures) -> f32 {
    let aspect = (current.aspect_ratio - reference.aspect_ratio).abs() / reference.aspect_ratio.max(0.1);
    let edge = (current.edge_density - reference.edge_density).abs();

    let raw_hue = (current.hue - reference.hue).abs();
    let hue = raw_hue.min(360.0 - raw_hue) / 180.0;

    let brightness = (current.brightness - reference.brightness).abs() / 255.0;
    let saturation = (current.saturation - reference.saturation).abs();

    aspect * ASPECT_WEIGHT
        + edge * EDGE_WEIGHT
        + hue * HUE_WEIGHT
        + brightness * BRIGHTNESS_WEIGHT
        + saturation * SATURATION_WEIGHT
}

/// Closest example carrying a feature snapshot, with its distance.
/// Ties keep the earlier example.
pub fn find_visual_match<'a>(
    features: &VisualFeatures,
    examples: &'a [TrainingExample],
) -> Option<(&'a TrainingExample, f32)> {
    examples
        .iter()
        .filter_map(|example| {
            example
                .features
                .as_ref()
                .map(|snapshot| (example, visual_distance(features, snapshot)))
        })
        .fold(None, |best, candidate| match best {
            Some((_, best_distance)) if best_distance <= candidate.1 => best,
            _ => Some(candidate),
        })
}
