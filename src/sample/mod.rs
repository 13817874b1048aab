//! Sample records exchanged with the training loop.
//!
//! A [`Sample`] carries the generated completion, the ground truth, the optional
//! operand list for equation checks and the reward fields this crate fills in.
//! Fields the caller adds (prompt ids, group indices, ...) ride along untouched in
//! [`Sample::extra`].


use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// The two verification checks a pool can route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    /// Think/answer structure check.
    Format,
    /// Arithmetic equation check against `nums` and `gt_answer`.
    Equation,
}

impl CheckKind {
    /// Both kinds, in the order the balanced path issues them.
    pub const ALL: [CheckKind; 2] = [CheckKind::Format, CheckKind::Equation];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Format => "format",
            CheckKind::Equation => "equation",
        }
    }

    /// Name of the reward field this kind writes (`reward_format`, `reward_equation`).
    #[inline]
    pub fn reward_field(&self) -> &'static str {
        match self {
            CheckKind::Format => "reward_format",
            CheckKind::Equation => "reward_equation",
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "format" => Ok(Self::Format),
            "equation" => Ok(Self::Equation),
            _ => Err(format!("Unknown check kind: {}", s)),
        }
    }
}

/// One record to be scored.
///
/// Samples are value objects: every dispatch works on its own clone, so the two
/// concurrent checks of the balanced path never write the same field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Generated completion (prompt tail included).
    #[serde(default)]
    pub sample_text: String,

    /// Ground truth answer. Numeric JSON values are accepted and kept as text.
    #[serde(default, deserialize_with = "string_or_number")]
    pub gt_answer: String,

    /// Operands an equation must use, as a multiset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nums: Option<Vec<i64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_format: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_equation: Option<f64>,

    /// Sum of the two check rewards (balanced path only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<f64>,

    /// Caller-defined fields, passed through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Sample {
    /// Creates a sample with no operands and no rewards.
    pub fn new(sample_text: impl Into<String>, gt_answer: impl Into<String>) -> Self {
        Self {
            sample_text: sample_text.into(),
            gt_answer: gt_answer.into(),
            ..Default::default()
        }
    }

    /// Sets the operand list (builder style).
    pub fn with_nums(mut self, nums: impl Into<Vec<i64>>) -> Self {
        self.nums = Some(nums.into());
        self
    }

    /// Returns the reward written by `kind`, or `0.0` if it was never set.
    #[inline]
    pub fn reward_for(&self, kind: CheckKind) -> f64 {
        match kind {
            CheckKind::Format => self.reward_format,
            CheckKind::Equation => self.reward_equation,
        }
        .unwrap_or(0.0)
    }

    /// Writes the reward field owned by `kind`.
    #[inline]
    pub fn set_reward(&mut self, kind: CheckKind, reward: f64) {
        match kind {
            CheckKind::Format => self.reward_format = Some(reward),
            CheckKind::Equation => self.reward_equation = Some(reward),
        }
    }

    /// Returns a copy whose reward for `kind` is `0.0`; the fail-soft result.
    pub fn zero_reward(&self, kind: CheckKind) -> Self {
        let mut result = self.clone();
        result.set_reward(kind, 0.0);
        result
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "gt_answer must be a string or number, got {}",
            other
        ))),
    }
}
