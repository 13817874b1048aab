use std::sync::LazyLock;

use regex::Regex;

use super::error::VerificationError;
use super::{EQUATION_TOLERANCE, expr, extract_fragment};
use crate::sample::Sample;

static ANSWER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<answer>(.*?)</answer>").expect("answer pattern is valid"));

static ALLOWED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-*/().\s]+$").expect("allowed pattern is valid"));

static INTEGER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("integer pattern is valid"));

/// Checks the answer equation of `sample`.
///
/// Returns `Ok(true)` when the equation uses exactly `nums` (as a multiset) and
/// evaluates to `gt_answer` within [`EQUATION_TOLERANCE`]; `Ok(false)` when it
/// evaluates cleanly to something else.
pub fn check_equation(sample: &Sample) -> Result<bool, VerificationError> {
    let equation = extract_equation(&sample.sample_text)?;

    // Character filter runs first: nothing outside the alphabet reaches the parser.
    if !ALLOWED_PATTERN.is_match(equation) {
        return Err(VerificationError::DisallowedCharacters);
    }

    let required = sample
        .nums
        .as_deref()
        .ok_or(VerificationError::MissingNumbers)?;
    let mut used = used_numbers(equation)?;
    let mut required = required.to_vec();
    used.sort_unstable();
    required.sort_unstable();
    if used != required {
        return Err(VerificationError::NumbersMismatch { used, required });
    }

    let expected: f64 = sample.gt_answer.trim().parse().map_err(|_| {
        VerificationError::InvalidGroundTruth {
            value: sample.gt_answer.clone(),
        }
    })?;

    let value = expr::evaluate(equation)?;
    Ok((value - expected).abs() < EQUATION_TOLERANCE)
}

/// Returns the trimmed content of the first single-line answer section.
pub fn extract_equation(sample_text: &str) -> Result<&str, VerificationError> {
    let fragment = extract_fragment(sample_text).ok_or(VerificationError::MissingFragment)?;
    ANSWER_PATTERN
        .captures(fragment)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .ok_or(VerificationError::MissingAnswer)
}

fn used_numbers(equation: &str) -> Result<Vec<i64>, VerificationError> {
    INTEGER_PATTERN
        .find_iter(equation)
        .map(|m| {
            m.as_str()
                .parse::<i64>()
                .map_err(|_| VerificationError::NumberOverflow {
                    literal: m.as_str().to_string(),
                })
        })
        .collect()
}
