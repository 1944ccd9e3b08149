//! Token count heuristic for reporting how much a cleanup saved.
//!
//! Roughly 4 characters per token for Latin text and 2.5 per token for CJK,
//! ignoring whitespace. Good enough to compare two versions of one document.

const CJK_CHARS_PER_TOKEN: f64 = 2.5;
const OTHER_CHARS_PER_TOKEN: f64 = 4.0;

fn is_cjk(c: char) -> bool {
    matches!(
        c,
        '\u{4E00}'..='\u{9FFF}'
            | '\u{3040}'..='\u{309F}'
            | '\u{30A0}'..='\u{30FF}'
            | '\u{AC00}'..='\u{D7AF}'
    )
}

/// Estimated LLM token count of `text`
pub fn estimate_tokens(text: &str) -> usize {
    let (cjk, other) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(cjk, other), c| {
            if is_cjk(c) {
                (cjk + 1, other)
            } else {
                (cjk, other + 1)
            }
        });

    let tokens = cjk as f64 / CJK_CHARS_PER_TOKEN + other as f64 / OTHER_CHARS_PER_TOKEN;
    tokens.ceil() as usize
}

/// Percentage of estimated tokens saved going from `original` to `cleaned`
///
/// NaN when `original` has no tokens. Negative when `cleaned` is larger.
pub fn calculate_token_reduction(original: &str, cleaned: &str) -> f64 {
    let original_tokens = estimate_tokens(original);
    if original_tokens == 0 {
        return f64::NAN;
    }
    let cleaned_tokens = estimate_tokens(cleaned);
    (original_tokens as f64 - cleaned_tokens as f64) / original_tokens as f64 * 100.0
}

/// `Token reduction: 84.2%` summary line
pub fn format_token_reduction(reduction: f64) -> String {
    if reduction.is_nan() {
        "Token reduction: n/a".to_string()
    } else {
        format!("Token reduction: {reduction:.1}%")
    }
}
