use std::sync::LazyLock;

use regex::Regex;

use super::error::VerificationError;
use super::extract_fragment;

// The think body is checked for stray tags separately; `regex` has no lookaround.
static FORMAT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<think>([\s\S]*?)</think>\n<answer>([\s\S]*?)</answer>\n?$")
        .expect("format pattern is a valid regex")
});

/// Checks the think-then-answer structure of a completion.
///
/// The fragment must open with `<think>`, close it exactly once before a newline
/// and an `<answer>` section, and end with `</answer>`. The think body may not
/// contain another `<think>` or `</think>`.
pub fn check_format(sample_text: &str) -> Result<(), VerificationError> {
    let fragment = extract_fragment(sample_text).ok_or(VerificationError::MissingFragment)?;
    let captures = FORMAT_PATTERN
        .captures(fragment)
        .ok_or(VerificationError::FormatMismatch)?;

    let think = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    if think.contains("<think>") || think.contains("</think>") {
        return Err(VerificationError::FormatMismatch);
    }
    Ok(())
}
