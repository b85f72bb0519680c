//! Aid for investigating near-miss templates.

use crate::error::ScanError;
use crate::licenses::License;
use crate::normalizer::NormalizedText;

/// For each primary pattern of `license`, report where the pattern's
/// normalized text first diverges from the input's normalized text. Useful
/// when a template was expected to match and did not.
pub fn debug_license_match_failure(
    license: &License,
    normalized_text: &str,
) -> Result<Vec<String>, ScanError> {
    let mut reports = Vec::new();
    for pattern in &license.primary_patterns {
        let normalized_pattern = NormalizedText::new(&pattern.source, true)?;
        reports.push(divergence_report(
            &pattern.file,
            &normalized_pattern.normalized,
            normalized_text,
        ));
    }
    Ok(reports)
}

fn divergence_report(file: &str, pattern: &str, text: &str) -> String {
    let common = pattern
        .bytes()
        .zip(text.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    if common == pattern.len() && common == text.len() {
        format!("{file}: normalized texts are identical")
    } else {
        format!(
            "{file}: diverges at byte {common}: pattern {:?} vs text {:?}",
            excerpt(pattern, common),
            excerpt(text, common)
        )
    }
}

fn excerpt(text: &str, from: usize) -> &str {
    let mut start = from.min(text.len());
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (start + 40).min(text.len());
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}
