use futures_util::future::join_all;
use tracing::debug;

use super::manager::VerifierPool;
use crate::sample::{CheckKind, Sample};

impl VerifierPool {
    /// Runs the format and equation checks concurrently and combines them.
    ///
    /// Both checks start on separate workers before either is awaited; a retry
    /// backoff on one does not hold up the other. The returned sample is the
    /// input plus `reward_format`, `reward_equation` and `reward` (their sum).
    pub async fn verify_balanced(&self, sample: Sample) -> Sample {
        let (format, equation) = tokio::join!(
            self.dispatch(&sample, CheckKind::Format),
            self.dispatch(&sample, CheckKind::Equation),
        );

        let reward_format = format.reward_for(CheckKind::Format);
        let reward_equation = equation.reward_for(CheckKind::Equation);

        let mut combined = sample;
        combined.reward_format = Some(reward_format);
        combined.reward_equation = Some(reward_equation);
        combined.reward = Some(reward_format + reward_equation);

        debug!(reward_format, reward_equation, "Sample verified");
        combined
    }

    /// Verifies every sample concurrently; output order matches input order.
    pub async fn verify_batch(&self, samples: Vec<Sample>) -> Vec<Sample> {
        join_all(samples.into_iter().map(|s| self.verify_balanced(s))).await
    }
}
