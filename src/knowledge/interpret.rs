//! OCR text interpretation
//!
//! Finds a model name in normalised text and then tries four power rules in
//! order, stopping at the first that produces a value:
//!
//! 1. a number right after the model name that the model is sold in
//! 2. an explicit `NNN W` / `NNN WATTS` marking (largest wins)
//! 3. any loose number the model is sold in
//! 4. a leading-zero code such as `06`, read as tens of watts

use serde::{Deserialize, Serialize};

use super::catalog::PowerCatalog;
use super::fuzzy::contains_model;
use super::thresholds::*;
use super::TrainingExample;
use crate::analysis::ReasonFragment;

/// Heuristic reading of one nameplate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub model: Option<String>,
    pub power: Option<u32>,
    pub confidence: f32,
    /// Normalised text, truncated
    pub raw_text: String,
    pub reasoning: Vec<ReasonFragment>,
}

/// Uppercase, map everything outside the label alphabet to spaces and
/// collapse whitespace
pub fn normalize_text(text: &str) -> String {
    let mapped: String = text
        .to_uppercase()
        .chars()
        .map(|c| match c {
            'A'..='Z' | '0'..='9' | '-' | '.' | ' ' | '/' | ':' => c,
            _ => ' ',
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Model candidates, longest first, ties alphabetical
pub fn candidate_models(examples: &[TrainingExample], catalog: &PowerCatalog) -> Vec<String> {
    let mut models: Vec<String> = examples
        .iter()
        .map(|e| e.model.trim().to_uppercase())
        .chain(catalog.models().map(str::to_string))
        .filter(|m| !m.is_empty())
        .collect();

    models.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    models.dedup();
    models
}

/// Interpret raw OCR output against the known models
pub fn interpret_text(text: &str, examples: &[TrainingExample], catalog: &PowerCatalog) -> Interpretation {
    let clean = normalize_text(text);
    let mut reasoning = Vec::new();

    let model = candidate_models(examples, catalog)
        .into_iter()
        .find(|candidate| contains_model(&clean, candidate));
    if let Some(model) = &model {
        reasoning.push(ReasonFragment::ModelIdentified { model: model.clone() });
    }

    let valid_powers = model.as_deref().and_then(|m| catalog.valid_powers(m));
    let numbers = bounded_numbers(&clean);

    let mut power = None;

    if let Some(model) = &model {
        if let Some(value) = value_after_model(&clean, model) {
            if is_plausible_power(value) && valid_powers.map_or(true, |set| set.contains(&value)) {
                power = Some(value);
                reasoning.push(ReasonFragment::ModelWithValue {
                    model: model.clone(),
                    power: value,
                });
            }
        }
    }

    if power.is_none() {
        let explicit = numbers
            .iter()
            .filter(|n| n.left_bounded && has_watt_suffix(&clean[n.end..]))
            .filter_map(|n| n.value())
            .filter(|p| is_plausible_power(*p))
            .max();
        if let Some(value) = explicit {
            power = Some(value);
            reasoning.push(ReasonFragment::ExplicitPower { power: value });
        }
    }

    if power.is_none() {
        if let (Some(model), Some(set)) = (&model, valid_powers) {
            let loose = numbers
                .iter()
                .filter(|n| n.is_bounded())
                .filter_map(|n| n.value())
                .filter(|p| is_plausible_power(*p))
                .find(|p| set.contains(p));
            if let Some(value) = loose {
                power = Some(value);
                reasoning.push(ReasonFragment::TablePower {
                    model: model.clone(),
                    power: value,
                });
            }
        }
    }

    if power.is_none() {
        let coded = numbers
            .iter()
            .filter(|n| n.is_bounded())
            .filter_map(|n| n.leading_zero_code(&clean))
            .filter(|(_, p)| is_plausible_power(*p))
            .find(|(_, p)| valid_powers.map_or(true, |set| set.contains(p)));
        if let Some((code, value)) = coded {
            power = Some(value);
            reasoning.push(ReasonFragment::LeadingZeroCode {
                code: code.to_string(),
                power: value,
            });
        }
    }

    let confidence = match (&model, power) {
        (Some(_), Some(_)) => CONFIDENCE_MODEL_AND_POWER,
        (Some(_), None) => CONFIDENCE_MODEL_ONLY,
        (None, Some(_)) => CONFIDENCE_POWER_ONLY,
        (None, None) => CONFIDENCE_NONE,
    };

    if reasoning.is_empty() {
        reasoning.push(ReasonFragment::InsufficientData);
    }

    Interpretation {
        model,
        power,
        confidence,
        raw_text: clean.chars().take(RAW_TEXT_LIMIT).collect(),
        reasoning,
    }
}

/// A maximal run of ASCII digits in normalised text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DigitRun {
    start: usize,
    end: usize,
    left_bounded: bool,
    right_bounded: bool,
    value: u32,
}

impl DigitRun {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn is_bounded(&self) -> bool {
        self.left_bounded && self.right_bounded
    }

    /// Value of a 2 or 3 digit run
    fn value(&self) -> Option<u32> {
        matches!(self.len(), 2 | 3).then_some(self.value)
    }

    /// `0D` with D in 1..=9, as (code, D * 10)
    fn leading_zero_code<'a>(&self, text: &'a str) -> Option<(&'a str, u32)> {
        let digits = &text[self.start..self.end];
        let bytes = digits.as_bytes();
        (bytes.len() == 2 && bytes[0] == b'0' && bytes[1] != b'0').then(|| (digits, self.value * 10))
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn bounded_numbers(text: &str) -> Vec<DigitRun> {
    let bytes = text.as_bytes();
    let mut runs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let start = i;
        let mut value = 0u32;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            value = value.saturating_mul(10).saturating_add((bytes[i] - b'0') as u32);
            i += 1;
        }

        runs.push(DigitRun {
            start,
            end: i,
            left_bounded: start == 0 || !is_word_byte(bytes[start - 1]),
            right_bounded: i == bytes.len() || !is_word_byte(bytes[i]),
            value,
        });
    }

    runs
}

/// `W` or `WATTS` after at most one space, ending on a word boundary
fn has_watt_suffix(rest: &str) -> bool {
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    ["WATTS", "W"].iter().any(|unit| {
        rest.strip_prefix(unit)
            .is_some_and(|after| after.bytes().next().map_or(true, |b| !is_word_byte(b)))
    })
}

/// First 2-3 digit number within the window of non-digits after `model`
fn value_after_model(text: &str, model: &str) -> Option<u32> {
    let bytes = text.as_bytes();

    text.match_indices(model).find_map(|(idx, _)| {
        let mut i = idx + model.len();
        let mut gap = 0;
        while i < bytes.len() && !bytes[i].is_ascii_digit() {
            if gap == MODEL_VALUE_WINDOW {
                return None;
            }
            gap += 1;
            i += 1;
        }

        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }

        match i - start {
            2 | 3 => text[start..i].parse().ok(),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpret(text: &str) -> Interpretation {
        interpret_text(text, &[], &PowerCatalog::builtin())
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Voltana\n150w; (ip66) "), "VOLTANA 150W IP66");
        assert_eq!(normalize_text("a*b"), "A B");
    }

    #[test]
    fn test_candidates_longest_first() {
        let examples = vec![TrainingExample::new("bora", 60), TrainingExample::new("ACME-XL", 40)];
        let models = candidate_models(&examples, &PowerCatalog::builtin());
        assert_eq!(models[0], "BRIGHTLUX");
        assert_eq!(models[1], "TECNOWATT");
        assert_eq!(models.iter().filter(|m| *m == "BORA").count(), 1);
        assert_eq!(models.last().map(String::as_str), Some("HBMI"));
        assert!(models.contains(&"ACME-XL".to_string()));
    }

    #[test]
    fn test_model_and_adjacent_value() {
        let result = interpret("VOLTANA - 60 LED");
        assert_eq!(result.model.as_deref(), Some("VOLTANA"));
        assert_eq!(result.power, Some(60));
        assert_eq!(result.confidence, CONFIDENCE_MODEL_AND_POWER);
        assert!(matches!(result.reasoning[1], ReasonFragment::ModelWithValue { power: 60, .. }));
    }

    #[test]
    fn test_explicit_watts_ignore_table() {
        let result = interpret("VOLTANA 150W");
        assert_eq!(result.model.as_deref(), Some("VOLTANA"));
        assert_eq!(result.power, Some(150));
        assert!(matches!(result.reasoning[1], ReasonFragment::ExplicitPower { power: 150 }));
    }

    #[test]
    fn test_explicit_watts_takes_largest() {
        let result = interpret("IN 40 W OUT 75 WATTS 220V");
        assert_eq!(result.model, None);
        assert_eq!(result.power, Some(75));
        assert_eq!(result.confidence, CONFIDENCE_POWER_ONLY);
    }

    #[test]
    fn test_table_power_from_loose_number() {
        let result = interpret("SCHREDER LOT 2024 REF 13 56");
        assert_eq!(result.power, Some(56));
        assert!(matches!(result.reasoning[1], ReasonFragment::TablePower { power: 56, .. }));
    }

    #[test]
    fn test_misread_model_name() {
        let result = interpret("V0LTANA");
        assert_eq!(result.model.as_deref(), Some("VOLTANA"));
        assert_eq!(result.power, None);
        assert_eq!(result.confidence, CONFIDENCE_MODEL_ONLY);
    }

    #[test]
    fn test_leading_zero_code() {
        let result = interpret("VOLTANA 06");
        assert_eq!(result.power, Some(60));
        assert!(matches!(result.reasoning[1], ReasonFragment::LeadingZeroCode { power: 60, .. }));

        let bare = interpret("06");
        assert_eq!(bare.power, Some(60));

        // MERAK is only sold at 54 W
        let rejected = interpret("MERAK 06");
        assert_eq!(rejected.power, None);
    }

    #[test]
    fn test_line_voltage_is_not_power() {
        let result = interpret("PHILIPS 127");
        assert_eq!(result.model.as_deref(), Some("PHILIPS"));
        assert_eq!(result.power, None);
    }

    #[test]
    fn test_nothing_found() {
        let result = interpret("X");
        assert_eq!(result.model, None);
        assert_eq!(result.power, None);
        assert_eq!(result.confidence, CONFIDENCE_NONE);
        assert_eq!(result.reasoning, vec![ReasonFragment::InsufficientData]);
    }

    #[test]
    fn test_raw_text_is_truncated() {
        let result = interpret(&"A".repeat(200));
        assert_eq!(result.raw_text.len(), RAW_TEXT_LIMIT);
    }

    #[test]
    fn test_example_models_are_candidates() {
        let examples = vec![TrainingExample::new("NOVALUX", 90)];
        let result = interpret_text("NOVALUX 90", &examples, &PowerCatalog::builtin());
        assert_eq!(result.model.as_deref(), Some("NOVALUX"));
        assert_eq!(result.power, Some(90));
    }

    #[test]
    fn test_watt_suffix() {
        assert!(has_watt_suffix("W"));
        assert!(has_watt_suffix(" WATTS X"));
        assert!(!has_watt_suffix("WX"));
        assert!(!has_watt_suffix("  W"));
    }
}
