//! Knowledge Layer
//!
//! Domain knowledge used to read nameplates: the manufacturer power table,
//! fuzzy model matching, OCR text interpretation and visual memory of
//! previously confirmed fixtures.
//!
//! The knowledge base never stores examples itself. Callers own the
//! `TrainingExample` collection and pass it in on every call.

pub mod catalog;
pub mod fuzzy;
pub mod interpret;
pub mod thresholds;
pub mod visual;

pub use catalog::PowerCatalog;
pub use fuzzy::fuzzy_contains;
pub use interpret::{normalize_text, Interpretation};
pub use visual::{find_visual_match, visual_distance};

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;
use crate::vision::VisualFeatures;
use thresholds::VISUAL_FUSION_DISTANCE;

/// A confirmed (model, power) label, optionally with what the pipeline saw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingExample {
    pub model: String,
    pub power: u32,
    /// Normalised OCR text that was misread for this fixture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_signature: Option<String>,
    /// Fingerprint of the confirmed photo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<VisualFeatures>,
}

impl TrainingExample {
    pub fn new(model: impl Into<String>, power: u32) -> Self {
        Self {
            model: model.into(),
            power,
            ocr_signature: None,
            features: None,
        }
    }

    /// Build an example from a human correction of `result`, keeping the
    /// result's text and fingerprint so similar photos can be recognised later
    pub fn from_correction(result: &AnalysisResult, model: &str, power: u32) -> Self {
        Self {
            model: model.trim().to_uppercase(),
            power,
            ocr_signature: result.raw_text.clone().filter(|text| !text.is_empty()),
            features: result.features.filter(|f| *f != VisualFeatures::degenerate()),
        }
    }
}

/// Stateless access to the domain knowledge
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    catalog: PowerCatalog,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeBase {
    /// Knowledge base backed by the built-in power table
    pub fn new() -> Self {
        Self::with_catalog(PowerCatalog::builtin())
    }

    pub fn with_catalog(catalog: PowerCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PowerCatalog {
        &self.catalog
    }

    /// Read a model and rated power out of raw OCR text
    pub fn interpret(&self, text: &str, examples: &[TrainingExample]) -> Interpretation {
        interpret::interpret_text(text, examples, &self.catalog)
    }

    /// Closest remembered fixture, if any example has a fingerprint
    pub fn find_visual_match<'a>(
        &self,
        features: &VisualFeatures,
        examples: &'a [TrainingExample],
    ) -> Option<(&'a TrainingExample, f32)> {
        visual::find_visual_match(features, examples)
    }

    /// Whether a newly confirmed `example` should relabel an earlier `result`
    pub fn should_relabel(&self, result: &AnalysisResult, example: &TrainingExample) -> bool {
        if let (Some(current), Some(snapshot)) = (&result.features, &example.features) {
            if visual_distance(current, snapshot) < VISUAL_FUSION_DISTANCE {
                return true;
            }
        }

        match (&result.raw_text, &example.ocr_signature) {
            (Some(text), Some(signature)) => {
                let signature = normalize_text(signature);
                !signature.is_empty() && normalize_text(text) == signature
            }
            _ => false,
        }
    }

    /// Indices of unconfirmed results that `example` retroactively relabels
    pub fn relabel_candidates(&self, results: &[AnalysisResult], example: &TrainingExample) -> Vec<usize> {
        results
            .iter()
            .enumerate()
            .filter(|(_, result)| !result.is_user_corrected())
            .filter(|(_, result)| self.should_relabel(result, example))
            .map(|(idx, _)| idx)
            .collect()
    }
}
