//! Sample builders shared by integration tests.

use tally::sample::Sample;
use tally::verification::{COMPLETION_PREFIX, COMPLETION_SUFFIX};

pub fn completion(think: &str, answer: &str) -> String {
    format!(
        "<|im_start|>user\nUse 3, 4 and 2 to make 11.<|im_end|>\n<|im_start|>assistant\n{}<think>{}</think>\n<answer>{}</answer>{}",
        COMPLETION_PREFIX, think, answer, COMPLETION_SUFFIX
    )
}

/// Correct format and equation: `3+4*2 = 11`.
pub fn correct_sample() -> Sample {
    Sample::new(completion("\nmultiply first\n", "3+4*2"), "11").with_nums(vec![3, 4, 2])
}

/// Well-formed but the equation evaluates to 14.
pub fn wrong_result_sample() -> Sample {
    Sample::new(completion("\nleft to right\n", "(3+4)*2"), "11").with_nums(vec![3, 4, 2])
}

/// Answer present but no think section.
pub fn unformatted_sample() -> Sample {
    Sample::new(
        format!("{}<answer>3+4*2</answer>{}", COMPLETION_PREFIX, COMPLETION_SUFFIX),
        "11",
    )
    .with_nums(vec![3, 4, 2])
}

/// No completion marker at all.
pub fn garbage_sample() -> Sample {
    Sample::new("the model rambled", "11").with_nums(vec![3, 4, 2])
}
