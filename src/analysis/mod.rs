//! Analysis Layer
//!
//! Result types and the consensus engine that fuses vision, OCR, the
//! knowledge base and an optional advisor into one reading per photo.

pub mod consensus;
pub mod reasoning;

pub use consensus::ConsensusEngine;
pub use reasoning::ReasonFragment;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::knowledge::thresholds::CONFIDENCE_DUPLICATE;
use crate::vision::VisualFeatures;

/// Where the final model/power came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Heuristic,
    VisualMemory,
    ExternalAdvisor,
    UserCorrected,
}

/// Whether a result can be accepted without a human look
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    AutoDetected,
    PendingReview,
}

/// Final reading of one photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: Uuid,
    pub model: Option<String>,
    pub power: Option<u32>,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub reasoning: Vec<ReasonFragment>,
    /// Normalised OCR text, when OCR ran
    pub raw_text: Option<String>,
    pub features: Option<VisualFeatures>,
    pub source: Source,
}

impl AnalysisResult {
    /// Result with nothing identified yet
    pub fn empty(source: Source) -> Self {
        Self {
            id: Uuid::new_v4(),
            model: None,
            power: None,
            confidence: 0.0,
            reasoning: Vec::new(),
            raw_text: None,
            features: None,
            source,
        }
    }

    /// Zero-confidence result for a photo that could not be analysed
    pub fn rejected(reason: impl Into<String>, features: Option<VisualFeatures>) -> Self {
        let mut result = Self::empty(Source::Heuristic);
        result.features = features;
        result.reasoning.push(ReasonFragment::Rejected { reason: reason.into() });
        result
    }

    /// Reasoning trail as display text
    pub fn reasoning_text(&self) -> String {
        reasoning::render(&self.reasoning)
    }

    pub fn review_status(&self, threshold: f32) -> ReviewStatus {
        if self.confidence < threshold || self.model.is_none() || self.power.is_none() {
            ReviewStatus::PendingReview
        } else {
            ReviewStatus::AutoDetected
        }
    }

    pub fn is_user_corrected(&self) -> bool {
        self.source == Source::UserCorrected
    }

    /// Overwrite with a human-confirmed label
    pub fn apply_correction(&mut self, model: &str, power: u32) {
        let model = model.trim().to_uppercase();
        self.reasoning.push(ReasonFragment::UserCorrected {
            model: model.clone(),
            power,
        });
        self.model = Some(model);
        self.power = Some(power);
        self.confidence = CONFIDENCE_DUPLICATE;
        self.source = Source::UserCorrected;
    }
}
