//! Approximate model-name matching over noisy OCR text

use super::thresholds::FUZZY_DEFAULT_TOLERANCE;

/// Whether `target` appears in `text`, allowing OCR misreads.
///
/// An exact uppercase substring always matches. Otherwise each token of
/// `text` is compared by edit distance, with a tolerance that shrinks for
/// short names: 0 up to 3 characters, 1 up to 5, `default_tolerance` beyond.
/// Targets shorter than 2 characters never match.
pub fn fuzzy_contains(text: &str, target: &str, default_tolerance: usize) -> bool {
    let target = target.to_uppercase();
    let target_len = target.chars().count();
    if target_len < 2 {
        return false;
    }

    let text = text.to_uppercase();
    if text.contains(&target) {
        return true;
    }

    let tolerance = match target_len {
        0..=3 => 0,
        4..=5 => 1,
        _ => default_tolerance,
    };

    let found = tokens(&text).any(|token| {
        let token_len = token.chars().count();
        token_len.abs_diff(target_len) <= default_tolerance
            && strsim::levenshtein(token, &target) <= tolerance
    });
    found
}

/// `fuzzy_contains` with the standard tolerance
pub fn contains_model(text: &str, model: &str) -> bool {
    fuzzy_contains(text, model, FUZZY_DEFAULT_TOLERANCE)
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || matches!(c, '-' | '/' | '.' | ':' | ','))
        .filter(|t| !t.is_empty())
}
