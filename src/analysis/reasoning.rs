//! Structured reasoning trail
//!
//! Each decision taken during an analysis appends one fragment. The trail is
//! only flattened to text for display.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of an analysis audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReasonFragment {
    /// Photo not usable, nothing else was attempted
    Rejected { reason: String },
    /// Same fixture as a confirmed example
    VisualDuplicate { model: String, power: u32 },
    ModelIdentified { model: String },
    /// Number found right after the model name
    ModelWithValue { model: String, power: u32 },
    ExplicitPower { power: u32 },
    /// Loose number validated against the power table
    TablePower { model: String, power: u32 },
    LeadingZeroCode { code: String, power: u32 },
    InsufficientData,
    OcrFailed { message: String },
    /// Advisor supplied a model the heuristics missed
    AdvisorModel { advisor: String, model: String, reasoning: String },
    /// Advisor disagreed with the heuristic model and won
    AdvisorOverride {
        advisor: String,
        heuristic_model: String,
        model: String,
        reasoning: String,
    },
    AdvisorPower { advisor: String, power: u32, reasoning: String },
    /// Model taken from a visually similar example
    VisualModel { model: String, similarity: u32 },
    VisualPower { power: u32 },
    /// A related remembered fixture carries a different model
    VisualConflict {
        model: String,
        visual_model: String,
        similarity: u32,
    },
    UserCorrected { model: String, power: u32 },
}

impl fmt::Display for ReasonFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReasonFragment::Rejected { reason } => write!(f, "Skipped: {}", reason),
            ReasonFragment::VisualDuplicate { model, power } => {
                write!(f, "Recognized from visual memory (exact duplicate of {} {}W)", model, power)
            }
            ReasonFragment::ModelIdentified { model } => write!(f, "Model identified: {}", model),
            ReasonFragment::ModelWithValue { model, power } => {
                write!(f, "Model + value pattern ({} {})", model, power)
            }
            ReasonFragment::ExplicitPower { power } => write!(f, "Explicit power: {}W", power),
            ReasonFragment::TablePower { model, power } => {
                write!(f, "Table power ({}): {}W", model, power)
            }
            ReasonFragment::LeadingZeroCode { code, power } => {
                write!(f, "Code {} read as {}W", code, power)
            }
            ReasonFragment::InsufficientData => write!(f, "Insufficient data"),
            ReasonFragment::OcrFailed { message } => write!(f, "OCR unavailable: {}", message),
            ReasonFragment::AdvisorModel { advisor, model, reasoning } => {
                write!(f, "Advisor ({}) identified {}: {}", advisor, model, reasoning)
            }
            ReasonFragment::AdvisorOverride {
                advisor,
                heuristic_model,
                model,
                reasoning,
            } => write!(
                f,
                "Ambiguous: advisor ({}) replaced heuristic {} with {}: {}",
                advisor, heuristic_model, model, reasoning
            ),
            ReasonFragment::AdvisorPower { advisor, power, reasoning } => {
                write!(f, "Power via advisor ({}): {}W, {}", advisor, power, reasoning)
            }
            ReasonFragment::VisualModel { model, similarity } => {
                write!(f, "Model {} suggested by visual similarity ({}%)", model, similarity)
            }
            ReasonFragment::VisualPower { power } => {
                write!(f, "Power estimated from visual memory: {}W", power)
            }
            ReasonFragment::VisualConflict {
                model,
                visual_model,
                similarity,
            } => write!(
                f,
                "Ambiguous: read {} but visual memory suggests {} ({}%)",
                model, visual_model, similarity
            ),
            ReasonFragment::UserCorrected { model, power } => {
                write!(f, "Corrected by user: {} {}W", model, power)
            }
        }
    }
}

/// Join fragments into the display form
pub fn render(fragments: &[ReasonFragment]) -> String {
    fragments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_joins_in_order() {
        let trail = vec![
            ReasonFragment::ModelIdentified { model: "BORA".to_string() },
            ReasonFragment::ExplicitPower { power: 60 },
        ];
        assert_eq!(render(&trail), "Model identified: BORA. Explicit power: 60W");
        assert_eq!(render(&[]), "");
    }

    #[test]
    fn test_visual_conflict_reads_as_ambiguous() {
        let fragment = ReasonFragment::VisualConflict {
            model: "VOLTANA".to_string(),
            visual_model: "MERAK".to_string(),
            similarity: 88,
        };
        assert_eq!(
            fragment.to_string(),
            "Ambiguous: read VOLTANA but visual memory suggests MERAK (88%)"
        );
    }

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_value(ReasonFragment::TablePower {
            model: "MERAK".to_string(),
            power: 54,
        })
        .unwrap();
        assert_eq!(json["kind"], "tablePower");
        assert_eq!(json["power"], 54);

        let unit = serde_json::to_string(&ReasonFragment::InsufficientData).unwrap();
        assert_eq!(unit, r#"{"kind":"insufficientData"}"#);
    }
}
