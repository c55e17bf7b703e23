//! Consensus engine
//!
//! Runs one photo through preprocessing, visual memory, OCR, the knowledge
//! base and the optional advisor, in that order, and merges what each stage
//! found. Never returns an error: every failure degrades the result instead.

use futures_util::future::join;
use image::DynamicImage;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{AnalysisResult, ReasonFragment, Source};
use crate::advisor::{Advisor, AdvisorRequest, AdvisorResponse, MAX_KNOWN_MODEL_HINTS};
use crate::capture::RawImage;
use crate::error::AdvisorError;
use crate::knowledge::thresholds::*;
use crate::knowledge::{Interpretation, KnowledgeBase, TrainingExample};
use crate::ocr::OcrPool;
use crate::vision::{FeatureExtractor, PreprocessedImage};

/// Minimum non-space characters for an OCR reading to be worth keeping
const MIN_READING_CHARS: usize = 4;

/// Default hard deadline for an advisor call
pub const DEFAULT_ADVISOR_TIMEOUT: Duration = Duration::from_secs(20);

/// Whole-photo analysis facade
pub struct ConsensusEngine {
    extractor: FeatureExtractor,
    ocr: Arc<OcrPool>,
    knowledge: KnowledgeBase,
    advisor: Option<Arc<dyn Advisor>>,
    advisor_timeout: Duration,
}

impl ConsensusEngine {
    pub fn new(extractor: FeatureExtractor, ocr: Arc<OcrPool>, knowledge: KnowledgeBase) -> Self {
        Self {
            extractor,
            ocr,
            knowledge,
            advisor: None,
            advisor_timeout: DEFAULT_ADVISOR_TIMEOUT,
        }
    }

    /// Consult `advisor` on every photo that reaches OCR, abandoning it after `timeout`
    pub fn with_advisor(mut self, advisor: Arc<dyn Advisor>, timeout: Duration) -> Self {
        self.advisor = Some(advisor);
        self.advisor_timeout = timeout;
        self
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Analyse one photo against the caller's confirmed examples
    pub async fn analyze(&self, image: &RawImage, examples: &[TrainingExample]) -> AnalysisResult {
        let start = Instant::now();

        let prep = match self.preprocess(image).await {
            Some(prep) => prep,
            None => return AnalysisResult::rejected("preprocessing task failed", None),
        };

        if !prep.is_valid() {
            info!("{} skipped: {}", image.name, prep.reason());
            return AnalysisResult::rejected(prep.reason(), prep.fingerprint());
        }

        let visual_match = self.knowledge.find_visual_match(&prep.features, examples);

        if let Some((example, distance)) = visual_match {
            if distance < EXACT_DUPLICATE_DISTANCE {
                info!("{}: exact visual duplicate of {} (distance {:.3})", image.name, example.model, distance);
                return duplicate_result(example, &prep);
            }
        }

        let (text, ocr_error) = self.read_text(&prep).await;
        let reading = self.knowledge.interpret(&text, examples);
        let mut result = heuristic_result(reading, &prep);
        if let Some(message) = ocr_error {
            result.reasoning.push(ReasonFragment::OcrFailed { message });
        }

        if let Some(advice) = self.consult_advisor(&prep, &result, examples).await {
            self.merge_advice(&mut result, advice);
        }

        if let Some((example, distance)) = visual_match {
            if distance < VISUAL_FUSION_DISTANCE {
                self.apply_visual_memory(&mut result, example, distance);
            }
        }

        debug!(
            "Analysed {} in {:?}: {:?} {:?}W at {:.2} ({:?})",
            image.name,
            start.elapsed(),
            result.model,
            result.power,
            result.confidence,
            result.source
        );

        result
    }

    async fn preprocess(&self, image: &RawImage) -> Option<PreprocessedImage> {
        let extractor = self.extractor.clone();
        let image = image.clone();

        match tokio::task::spawn_blocking(move || extractor.preprocess(&image)).await {
            Ok(prep) => Some(prep),
            Err(e) => {
                warn!("Preprocessing task failed: {}", e);
                None
            }
        }
    }

    /// OCR both crops; fall back to the full frame when neither reads as a label.
    /// Returns the combined text and the first OCR error, if any.
    async fn read_text(&self, prep: &PreprocessedImage) -> (String, Option<String>) {
        let mut error = None;
        let mut keep = |reading: Result<String, String>| match reading {
            Ok(text) => text,
            Err(e) => {
                error.get_or_insert(e);
                String::new()
            }
        };

        let (normal, inverted) = join(
            self.recognize(&prep.ocr_crop, "normal"),
            self.recognize(&prep.inverted_crop, "inverted"),
        )
        .await;
        let normal = keep(normal);
        let inverted = keep(inverted);

        let mut combined = format!("{} {}", normal, inverted);

        if !is_plausible_reading(&normal) && !is_plausible_reading(&inverted) {
            debug!("Crop readings implausible, trying the full frame");
            let full = keep(self.recognize(&prep.full_frame, "full frame").await);
            combined.push(' ');
            combined.push_str(&full);
        }

        (combined, error)
    }

    async fn recognize(&self, image: &DynamicImage, label: &str) -> Result<String, String> {
        self.ocr.recognize(image).await.map_err(|e| {
            warn!("OCR on {} rendering failed: {}", label, e);
            e.to_string()
        })
    }

    async fn consult_advisor(
        &self,
        prep: &PreprocessedImage,
        result: &AnalysisResult,
        examples: &[TrainingExample],
    ) -> Option<AdvisorResponse> {
        let advisor = self.advisor.as_ref()?;

        let image_jpeg = match prep.full_frame_jpeg() {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!("Could not encode frame for advisor: {}", e);
                return None;
            }
        };

        let request = AdvisorRequest {
            image_jpeg,
            ocr_text_hint: result.raw_text.clone().unwrap_or_default(),
            known_models: known_model_hints(examples),
        };

        let call = async {
            if !advisor.is_available().await {
                return Err(AdvisorError::Unavailable(advisor.name().to_string()));
            }
            advisor.advise(request).await
        };

        match tokio::time::timeout(self.advisor_timeout, call).await {
            Ok(Ok(advice)) => Some(advice),
            Ok(Err(e)) => {
                debug!("Advisor skipped: {}", e);
                None
            }
            Err(_) => {
                warn!("{}", AdvisorError::Timeout(self.advisor_timeout));
                None
            }
        }
    }

    fn merge_advice(&self, result: &mut AnalysisResult, advice: AdvisorResponse) {
        let advisor = self
            .advisor
            .as_ref()
            .map(|a| a.name().to_string())
            .unwrap_or_default();

        match (result.model.clone(), advice.model) {
            (None, Some(model)) => {
                result.reasoning.push(ReasonFragment::AdvisorModel {
                    advisor,
                    model: model.clone(),
                    reasoning: advice.reasoning,
                });
                result.model = Some(model);
                result.power = advice.power.or(result.power);
                result.confidence = CONFIDENCE_ADVISOR_MODEL;
                result.source = Source::ExternalAdvisor;
            }
            (Some(heuristic_model), Some(model)) if heuristic_model != model => {
                result.reasoning.push(ReasonFragment::AdvisorOverride {
                    advisor,
                    heuristic_model,
                    model: model.clone(),
                    reasoning: advice.reasoning,
                });
                // The heuristic power was validated against the replaced model
                let kept = result.power.filter(|&p| self.fits_table(&model, p));
                result.power = advice.power.or(kept);
                result.model = Some(model);
                result.confidence = result.confidence.min(CONFIDENCE_MODEL_ONLY);
                result.source = Source::ExternalAdvisor;
            }
            _ => {
                if let (None, Some(power)) = (result.power, advice.power) {
                    result.reasoning.push(ReasonFragment::AdvisorPower {
                        advisor,
                        power,
                        reasoning: advice.reasoning,
                    });
                    result.power = Some(power);
                    result.confidence = result.confidence.max(CONFIDENCE_POWER_ONLY);
                }
            }
        }
    }

    /// Check a related remembered fixture against the reading.
    ///
    /// A different model lowers confidence below review. Below the fusion
    /// floor, gaps are filled without overriding what OCR found; a power is
    /// only borrowed when it is valid for the result's model.
    fn apply_visual_memory(&self, result: &mut AnalysisResult, example: &TrainingExample, distance: f32) {
        let similarity = ((1.0 - distance) * 100.0).round().max(0.0) as u32;

        if let Some(model) = result.model.as_deref().filter(|m| *m != example.model) {
            debug!("Visual memory suggests {} against read {}", example.model, model);
            result.reasoning.push(ReasonFragment::VisualConflict {
                model: model.to_string(),
                visual_model: example.model.clone(),
                similarity,
            });
            result.confidence = result.confidence.min(CONFIDENCE_MODEL_ONLY);
        }

        if result.confidence >= VISUAL_FUSION_FLOOR {
            return;
        }

        if result.model.is_none() {
            result.model = Some(example.model.clone());
            result.confidence = result.confidence.max(CONFIDENCE_VISUAL_MODEL);
            result.source = Source::VisualMemory;
            result.reasoning.push(ReasonFragment::VisualModel {
                model: example.model.clone(),
                similarity,
            });
        }

        let power_fits = match result.model.as_deref() {
            Some(model) => model == example.model || self.fits_table(model, example.power),
            None => false,
        };
        if result.power.is_none() && power_fits {
            result.power = Some(example.power);
            result.reasoning.push(ReasonFragment::VisualPower { power: example.power });
        }

        result.confidence = result.confidence.min(CONFIDENCE_MODEL_AND_POWER);
    }

    /// Whether `power` is a rated power of `model` in the catalog
    fn fits_table(&self, model: &str, power: u32) -> bool {
        self.knowledge
            .catalog()
            .valid_powers(&model.trim().to_uppercase())
            .is_some_and(|powers| powers.contains(&power))
    }
}

fn heuristic_result(reading: Interpretation, prep: &PreprocessedImage) -> AnalysisResult {
    let mut result = AnalysisResult::empty(Source::Heuristic);
    result.model = reading.model;
    result.power = reading.power;
    result.confidence = reading.confidence;
    result.reasoning = reading.reasoning;
    result.raw_text = Some(reading.raw_text);
    result.features = Some(prep.features);
    result
}

fn duplicate_result(example: &TrainingExample, prep: &PreprocessedImage) -> AnalysisResult {
    let mut result = AnalysisResult::empty(Source::VisualMemory);
    result.model = Some(example.model.clone());
    result.power = Some(example.power);
    result.confidence = CONFIDENCE_DUPLICATE;
    result.features = Some(prep.features);
    result.reasoning.push(ReasonFragment::VisualDuplicate {
        model: example.model.clone(),
        power: example.power,
    });
    result
}

/// Enough characters and at least one digit
fn is_plausible_reading(text: &str) -> bool {
    text.chars().filter(|c| !c.is_whitespace()).count() >= MIN_READING_CHARS
        && text.chars().any(|c| c.is_ascii_digit())
}

/// Distinct `MODEL (NW)` labels, in example order
fn known_model_hints(examples: &[TrainingExample]) -> Vec<String> {
    let mut seen = HashSet::new();
    examples
        .iter()
        .map(|e| format!("{} ({}W)", e.model, e.power))
        .filter(|label| seen.insert(label.clone()))
        .take(MAX_KNOWN_MODEL_HINTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ReviewStatus;
    use crate::ocr::testing::ScriptedFactory;
    use crate::vision::test_images::fixture_photo;
    use crate::vision::VisualFeatures;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeAdvisor {
        available: bool,
        delay: Duration,
        response: AdvisorResponse,
        calls: AtomicUsize,
    }

    impl FakeAdvisor {
        fn answering(model: Option<&str>, power: Option<u32>) -> Self {
            Self {
                available: true,
                delay: Duration::ZERO,
                response: AdvisorResponse {
                    model: model.map(str::to_string),
                    power,
                    reasoning: "looked at it".to_string(),
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Advisor for FakeAdvisor {
        fn name(&self) -> &str {
            "fake"
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn advise(&self, request: AdvisorRequest) -> Result<AdvisorResponse, AdvisorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(&request.image_jpeg[..2], &[0xFF, 0xD8]);
            tokio::time::sleep(self.delay).await;
            Ok(self.response.clone())
        }
    }

    fn engine(factory: &ScriptedFactory) -> ConsensusEngine {
        let pool = OcrPool::new(2, factory.clone()).unwrap();
        ConsensusEngine::new(FeatureExtractor::new(), Arc::new(pool), KnowledgeBase::new())
    }

    fn photo() -> RawImage {
        fixture_photo(400, 300, (100, 60, 200, 150))
    }

    fn photo_features() -> VisualFeatures {
        FeatureExtractor::new().preprocess(&photo()).features
    }

    fn remembered(model: &str, power: u32, features: VisualFeatures) -> TrainingExample {
        TrainingExample {
            features: Some(features),
            ..TrainingExample::new(model, power)
        }
    }

    #[tokio::test]
    async fn test_undecodable_photo_fails_fast() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let result = engine(&factory)
            .analyze(&RawImage::new("junk.jpg", vec![0, 1, 2]), &[])
            .await;

        assert_eq!(result.confidence, 0.0);
        assert!(matches!(result.reasoning[0], ReasonFragment::Rejected { .. }));
        assert!(result.features.is_none());
        assert_eq!(factory.builds(), 0);
        assert_eq!(factory.calls(), 0);
    }

    #[tokio::test]
    async fn test_ground_scene_is_rejected_without_ocr() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let result = engine(&factory)
            .analyze(&fixture_photo(400, 300, (100, 150, 200, 150)), &[])
            .await;

        assert_eq!(result.confidence, 0.0);
        assert!(result.model.is_none());
        assert!(result.features.is_none());
        assert_eq!(factory.calls(), 0);
    }

    #[tokio::test]
    async fn test_tiny_fixture_is_rejected_without_ocr() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let result = engine(&factory)
            .analyze(&fixture_photo(400, 300, (200, 100, 16, 16)), &[])
            .await;

        assert_eq!(result.confidence, 0.0);
        assert!(result.model.is_none());
        assert!(result.power.is_none());
        assert!(matches!(result.reasoning[0], ReasonFragment::Rejected { .. }));
        assert_eq!(factory.calls(), 0);
    }

    #[tokio::test]
    async fn test_exact_duplicate_short_circuits() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let examples = vec![remembered("ORION", 100, photo_features())];
        let result = engine(&factory).analyze(&photo(), &examples).await;

        assert_eq!(result.model.as_deref(), Some("ORION"));
        assert_eq!(result.power, Some(100));
        assert_eq!(result.confidence, CONFIDENCE_DUPLICATE);
        assert_eq!(result.source, Source::VisualMemory);
        assert_eq!(factory.calls(), 0);
    }

    #[tokio::test]
    async fn test_ocr_reading_is_interpreted() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let result = engine(&factory).analyze(&photo(), &[]).await;

        assert_eq!(result.model.as_deref(), Some("VOLTANA"));
        assert_eq!(result.power, Some(60));
        assert_eq!(result.confidence, CONFIDENCE_MODEL_AND_POWER);
        assert_eq!(result.source, Source::Heuristic);
        assert!(result.features.is_some());
        assert_eq!(factory.calls(), 2);
    }

    #[tokio::test]
    async fn test_implausible_crops_fall_back_to_full_frame() {
        let factory = ScriptedFactory::new("LED");
        let result = engine(&factory).analyze(&photo(), &[]).await;

        assert_eq!(factory.calls(), 3);
        assert_eq!(result.confidence, CONFIDENCE_NONE);
        assert_eq!(result.reasoning, vec![ReasonFragment::InsufficientData]);
    }

    #[tokio::test]
    async fn test_ocr_pool_failure_degrades() {
        let mut factory = ScriptedFactory::new("VOLTANA 60");
        factory.fail_build = true;
        let result = engine(&factory).analyze(&photo(), &[]).await;

        assert_eq!(result.confidence, CONFIDENCE_NONE);
        assert!(result
            .reasoning
            .iter()
            .any(|r| matches!(r, ReasonFragment::OcrFailed { .. })));
    }

    #[tokio::test]
    async fn test_advisor_fills_missing_model() {
        let factory = ScriptedFactory::new("");
        let advisor = Arc::new(FakeAdvisor::answering(Some("BORA"), Some(60)));
        let result = engine(&factory)
            .with_advisor(advisor.clone(), Duration::from_secs(5))
            .analyze(&photo(), &[])
            .await;

        assert_eq!(advisor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.model.as_deref(), Some("BORA"));
        assert_eq!(result.power, Some(60));
        assert_eq!(result.confidence, CONFIDENCE_ADVISOR_MODEL);
        assert_eq!(result.source, Source::ExternalAdvisor);
    }

    #[tokio::test]
    async fn test_advisor_overrides_disagreeing_model() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let advisor = Arc::new(FakeAdvisor::answering(Some("ORION"), Some(40)));
        let result = engine(&factory)
            .with_advisor(advisor, Duration::from_secs(5))
            .analyze(&photo(), &[])
            .await;

        assert_eq!(result.model.as_deref(), Some("ORION"));
        assert_eq!(result.power, Some(40));
        assert_eq!(result.source, Source::ExternalAdvisor);
        assert_eq!(result.confidence, CONFIDENCE_MODEL_ONLY);
        assert_eq!(result.review_status(DEFAULT_REVIEW_THRESHOLD), ReviewStatus::PendingReview);
        assert!(result
            .reasoning
            .iter()
            .any(|r| matches!(r, ReasonFragment::AdvisorOverride { .. })));
    }

    #[tokio::test]
    async fn test_advisor_override_keeps_power_valid_for_new_model() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let advisor = Arc::new(FakeAdvisor::answering(Some("ORION"), None));
        let result = engine(&factory)
            .with_advisor(advisor, Duration::from_secs(5))
            .analyze(&photo(), &[])
            .await;

        assert_eq!(result.model.as_deref(), Some("ORION"));
        assert_eq!(result.power, Some(60));
        assert_eq!(result.confidence, CONFIDENCE_MODEL_ONLY);
        assert_eq!(result.review_status(DEFAULT_REVIEW_THRESHOLD), ReviewStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_advisor_override_drops_power_invalid_for_new_model() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let advisor = Arc::new(FakeAdvisor::answering(Some("MERAK"), None));
        let result = engine(&factory)
            .with_advisor(advisor, Duration::from_secs(5))
            .analyze(&photo(), &[])
            .await;

        assert_eq!(result.model.as_deref(), Some("MERAK"));
        assert!(result.power.is_none());
        assert!(result.confidence < DEFAULT_REVIEW_THRESHOLD);
    }

    #[tokio::test]
    async fn test_advisor_agreeing_keeps_heuristic() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let advisor = Arc::new(FakeAdvisor::answering(Some("VOLTANA"), Some(75)));
        let result = engine(&factory)
            .with_advisor(advisor, Duration::from_secs(5))
            .analyze(&photo(), &[])
            .await;

        assert_eq!(result.power, Some(60));
        assert_eq!(result.source, Source::Heuristic);
        assert_eq!(result.confidence, CONFIDENCE_MODEL_AND_POWER);
    }

    #[tokio::test]
    async fn test_advisor_fills_missing_power() {
        let factory = ScriptedFactory::new("V0LTANA");
        let advisor = Arc::new(FakeAdvisor::answering(None, Some(80)));
        let result = engine(&factory)
            .with_advisor(advisor, Duration::from_secs(5))
            .analyze(&photo(), &[])
            .await;

        assert_eq!(result.model.as_deref(), Some("VOLTANA"));
        assert_eq!(result.power, Some(80));
        assert!(matches!(result.reasoning.last(), Some(ReasonFragment::AdvisorPower { power: 80, .. })));
    }

    #[tokio::test]
    async fn test_advisor_power_alone_raises_tier() {
        let factory = ScriptedFactory::new("");
        let advisor = Arc::new(FakeAdvisor::answering(None, Some(80)));
        let result = engine(&factory)
            .with_advisor(advisor, Duration::from_secs(5))
            .analyze(&photo(), &[])
            .await;

        assert!(result.model.is_none());
        assert_eq!(result.power, Some(80));
        assert_eq!(result.confidence, CONFIDENCE_POWER_ONLY);
        assert_eq!(result.source, Source::Heuristic);
    }

    #[tokio::test]
    async fn test_unavailable_advisor_is_ignored() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let mut fake = FakeAdvisor::answering(Some("ORION"), Some(40));
        fake.available = false;
        let advisor = Arc::new(fake);
        let result = engine(&factory)
            .with_advisor(advisor.clone(), Duration::from_secs(5))
            .analyze(&photo(), &[])
            .await;

        assert_eq!(advisor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.model.as_deref(), Some("VOLTANA"));
    }

    #[tokio::test]
    async fn test_slow_advisor_is_abandoned() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let mut fake = FakeAdvisor::answering(Some("ORION"), Some(40));
        fake.delay = Duration::from_secs(5);
        let result = engine(&factory)
            .with_advisor(Arc::new(fake), Duration::from_millis(50))
            .analyze(&photo(), &[])
            .await;

        assert_eq!(result.model.as_deref(), Some("VOLTANA"));
        assert_eq!(result.source, Source::Heuristic);
    }

    #[tokio::test]
    async fn test_visual_fusion_fills_gaps() {
        let factory = ScriptedFactory::new("");
        let mut related = photo_features();
        related.aspect_ratio *= 1.2;
        let examples = vec![remembered("MERAK", 54, related)];

        let result = engine(&factory).analyze(&photo(), &examples).await;

        assert_eq!(result.model.as_deref(), Some("MERAK"));
        assert_eq!(result.power, Some(54));
        assert_eq!(result.confidence, CONFIDENCE_VISUAL_MODEL);
        assert_eq!(result.source, Source::VisualMemory);
        assert_eq!(factory.calls(), 3);
    }

    #[tokio::test]
    async fn test_related_fixture_with_other_model_is_ambiguous() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let mut related = photo_features();
        related.aspect_ratio *= 1.2;
        let examples = vec![remembered("MERAK", 54, related)];

        let result = engine(&factory).analyze(&photo(), &examples).await;

        assert_eq!(result.model.as_deref(), Some("VOLTANA"));
        assert_eq!(result.power, Some(60));
        assert_eq!(result.confidence, CONFIDENCE_MODEL_ONLY);
        assert_eq!(result.review_status(DEFAULT_REVIEW_THRESHOLD), ReviewStatus::PendingReview);
        assert!(matches!(
            result.reasoning.last(),
            Some(ReasonFragment::VisualConflict { visual_model, .. }) if visual_model == "MERAK"
        ));
    }

    #[tokio::test]
    async fn test_related_fixture_with_same_model_keeps_confident_read() {
        let factory = ScriptedFactory::new("VOLTANA 60");
        let mut related = photo_features();
        related.aspect_ratio *= 1.2;
        let examples = vec![remembered("VOLTANA", 80, related)];

        let result = engine(&factory).analyze(&photo(), &examples).await;

        assert_eq!(result.power, Some(60));
        assert_eq!(result.confidence, CONFIDENCE_MODEL_AND_POWER);
        assert_eq!(result.source, Source::Heuristic);
    }

    #[tokio::test]
    async fn test_visual_fusion_fills_power_of_same_model() {
        let factory = ScriptedFactory::new("V0LTANA");
        let mut related = photo_features();
        related.aspect_ratio *= 1.2;
        let examples = vec![remembered("VOLTANA", 80, related)];

        let result = engine(&factory).analyze(&photo(), &examples).await;

        assert_eq!(result.model.as_deref(), Some("VOLTANA"));
        assert_eq!(result.power, Some(80));
        assert_eq!(result.confidence, CONFIDENCE_MODEL_ONLY);
        assert!(matches!(result.reasoning.last(), Some(ReasonFragment::VisualPower { power: 80 })));
    }

    #[tokio::test]
    async fn test_visual_fusion_skips_power_outside_model_table() {
        let factory = ScriptedFactory::new("V0LTANA");
        let mut related = photo_features();
        related.aspect_ratio *= 1.2;
        let examples = vec![remembered("MERAK", 54, related)];

        let result = engine(&factory).analyze(&photo(), &examples).await;

        assert_eq!(result.model.as_deref(), Some("VOLTANA"));
        assert!(result.power.is_none());
        assert!(result
            .reasoning
            .iter()
            .any(|r| matches!(r, ReasonFragment::VisualConflict { .. })));
    }

    #[tokio::test]
    async fn test_visual_fusion_borrows_power_valid_for_read_model() {
        let factory = ScriptedFactory::new("V0LTANA");
        let mut related = photo_features();
        related.aspect_ratio *= 1.2;
        let examples = vec![remembered("ORION", 60, related)];

        let result = engine(&factory).analyze(&photo(), &examples).await;

        assert_eq!(result.model.as_deref(), Some("VOLTANA"));
        assert_eq!(result.power, Some(60));
        assert_eq!(result.confidence, CONFIDENCE_MODEL_ONLY);
    }

    #[tokio::test]
    async fn test_analysis_is_repeatable() {
        let factory = ScriptedFactory::new("SCHREDER 56");
        let engine = engine(&factory);
        let first = engine.analyze(&photo(), &[]).await;
        let second = engine.analyze(&photo(), &[]).await;

        assert_eq!(first.model, second.model);
        assert_eq!(first.power, second.power);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.features, second.features);
    }

    #[test]
    fn test_plausible_reading() {
        assert!(is_plausible_reading("BORA 60"));
        assert!(!is_plausible_reading("BORA"));
        assert!(!is_plausible_reading(" 6 0 "));
    }

    #[test]
    fn test_known_model_hints_are_distinct_and_capped() {
        let mut examples: Vec<_> = (0..30).map(|i| TrainingExample::new(format!("M{}", i), 60)).collect();
        examples.insert(1, TrainingExample::new("M0", 60));
        let hints = known_model_hints(&examples);
        assert_eq!(hints.len(), MAX_KNOWN_MODEL_HINTS);
        assert_eq!(hints[0], "M0 (60W)");
        assert_eq!(hints[1], "M1 (60W)");
    }
}
