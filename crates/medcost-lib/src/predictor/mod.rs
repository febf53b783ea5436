//! Request-time cost prediction

mod fallback;
mod inference;
mod output;

pub use fallback::{region_factor, FallbackEstimator};
pub use inference::{CostPredictor, PredictorConfig, PredictorStats};
pub use output::{round_to, OutputConfig, OutputFormatter, COST_DECIMALS, MIN_COST};

use crate::models::{Prediction, RawInput};

/// Anything that turns validated attributes into a cost estimate
pub trait CostEstimator: Send + Sync {
    /// Always yields a usable number
    fn estimate(&self, input: &RawInput) -> Prediction;

    /// Version of the model behind the estimates, if any
    fn model_version(&self) -> Option<String>;
}

impl CostEstimator for FallbackEstimator {
    fn estimate(&self, input: &RawInput) -> Prediction {
        FallbackEstimator::predict(input)
    }

    fn model_version(&self) -> Option<String> {
        None
    }
}
