//! Batch Layer
//!
//! Picking the best of several photos of one fixture and running whole
//! groups through the analysis pipeline under a concurrency cap.

pub mod scheduler;

pub use scheduler::{AnalysisRunner, JobOutcome, JobRunner, JobScheduler, DEFAULT_MAX_CONCURRENT_JOBS};

use tracing::{debug, warn};

use crate::capture::RawImage;
use crate::vision::FeatureExtractor;

/// Highest-scoring item; ties keep the earlier one.
///
/// A single item is returned without being scored.
pub fn select_best_by<T>(items: &[T], mut score: impl FnMut(&T) -> f32) -> Option<&T> {
    match items {
        [] => None,
        [only] => Some(only),
        _ => {
            let mut best: Option<(&T, f32)> = None;
            for item in items {
                let value = score(item);
                match best {
                    Some((_, best_value)) if best_value >= value => {}
                    _ => best = Some((item, value)),
                }
            }
            best.map(|(item, _)| item)
        }
    }
}

/// Best photo of a group by `FeatureExtractor::score`, scored on the
/// blocking pool
pub async fn select_best_image<'a>(
    extractor: &FeatureExtractor,
    images: &'a [RawImage],
) -> Option<&'a RawImage> {
    if images.len() <= 1 {
        return images.first();
    }

    let scorer = extractor.clone();
    let owned = images.to_vec();
    let scores = tokio::task::spawn_blocking(move || {
        owned.iter().map(|image| scorer.score(image)).collect::<Vec<f32>>()
    })
    .await;

    let scores = match scores {
        Ok(scores) => scores,
        Err(e) => {
            warn!("Scoring task failed, keeping first photo: {}", e);
            return images.first();
        }
    };

    let indices: Vec<usize> = (0..images.len()).collect();
    let best = select_best_by(&indices, |&i| scores[i]).copied()?;
    debug!("Selected {} (score {:.3}) from {} photos", images[best].name, scores[best], images.len());
    images.get(best)
}
