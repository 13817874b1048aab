//! Verification functions: the leaf checks executed by verifier workers.
//!
//! Both checks are pure and total. Every internal failure (missing tags,
//! malformed numbers, evaluation errors) is logged at `debug` and scores `0.0`;
//! nothing propagates to the worker.
//!
//! # Completion fragment
//!
//! Completions carry the prompt tail. The checked fragment is the text between
//! the first and second occurrence of [`COMPLETION_PREFIX`], cut at the first
//! [`COMPLETION_SUFFIX`]. A completion without the prefix has no fragment and
//! scores zero on both checks.

pub mod equation;
pub mod error;
pub mod expr;
pub mod format;


pub use equation::{check_equation, extract_equation};
pub use error::{ExprError, VerificationError};
pub use expr::evaluate;
pub use format::check_format;

use tracing::debug;

use crate::sample::{CheckKind, Sample};

/// Prompt tail that precedes the model's own output.
pub const COMPLETION_PREFIX: &str = "Let me solve this step by step.\n";
/// End-of-turn marker that terminates the model's output.
pub const COMPLETION_SUFFIX: &str = "<|im_end|>";
/// Absolute tolerance when comparing an equation result to the ground truth.
pub const EQUATION_TOLERANCE: f64 = 1e-5;

/// Returns the model-authored fragment of `sample_text`, if the prefix is present.
pub fn extract_fragment(sample_text: &str) -> Option<&str> {
    let fragment = sample_text.split(COMPLETION_PREFIX).nth(1)?;
    fragment.split(COMPLETION_SUFFIX).next()
}

/// Runs the check for `kind` and returns the sample with that reward set.
pub fn verify(sample: Sample, kind: CheckKind) -> Sample {
    match kind {
        CheckKind::Format => verify_format(sample),
        CheckKind::Equation => verify_equation(sample),
    }
}

/// Sets `reward_format` to `1.0` for a well-formed think/answer completion, else `0.0`.
pub fn verify_format(mut sample: Sample) -> Sample {
    let reward = match check_format(&sample.sample_text) {
        Ok(()) => 1.0,
        Err(e) => {
            debug!(error = %e, "format check scored zero");
            0.0
        }
    };
    sample.set_reward(CheckKind::Format, reward);
    sample
}

/// Sets `reward_equation` to `1.0` for a correct equation over `nums`, else `0.0`.
pub fn verify_equation(mut sample: Sample) -> Sample {
    let reward = match check_equation(&sample) {
        Ok(true) => 1.0,
        Ok(false) => 0.0,
        Err(e) => {
            debug!(error = %e, "equation check scored zero");
            0.0
        }
    };
    sample.set_reward(CheckKind::Equation, reward);
    sample
}
