use thiserror::Error;

/// Failures of the arithmetic evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("malformed number literal '{literal}'")]
    InvalidNumber { literal: String },

    #[error("unexpected token at position {position}")]
    UnexpectedToken { position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("nesting deeper than {max} levels")]
    TooDeep { max: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not finite")]
    NonFinite,
}

/// Reasons a check scored zero. Never surfaces past a verification function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerificationError {
    #[error("completion fragment not found")]
    MissingFragment,

    #[error("answer section not found")]
    MissingAnswer,

    #[error("think/answer structure does not match")]
    FormatMismatch,

    #[error("sample has no required numbers")]
    MissingNumbers,

    #[error("equation contains characters outside the arithmetic alphabet")]
    DisallowedCharacters,

    #[error("equation uses {used:?}, required {required:?}")]
    NumbersMismatch { used: Vec<i64>, required: Vec<i64> },

    #[error("number literal '{literal}' does not fit in an integer")]
    NumberOverflow { literal: String },

    #[error("ground truth '{value}' is not numeric")]
    InvalidGroundTruth { value: String },

    #[error("evaluation failed: {0}")]
    Expr(#[from] ExprError),
}
