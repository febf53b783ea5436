//! Closed-form cost estimate used when no trained model is available
//!
//! ```text
//! cost = (BASE + AGE_RATE·age + BMI_RATE·max(bmi − BMI_HEALTHY, 0)
//!         + CHILD_RATE·children + SMOKER_SURCHARGE·[smoker]) × region_factor
//! ```
//!
//! Every term is non-negative and every region factor is positive, so the
//! estimate is finite and non-negative for any in-range input. Sex does
//! not enter the formula.

use super::output::round_to;
use crate::models::{Prediction, PredictionSource, RawInput, Region};

pub const BASE_COST: f64 = 3000.0;
pub const AGE_RATE: f64 = 260.0;
pub const BMI_RATE: f64 = 320.0;
/// BMI above which the per-point surcharge applies
pub const BMI_HEALTHY: f64 = 18.5;
pub const CHILD_RATE: f64 = 475.0;
pub const SMOKER_SURCHARGE: f64 = 23000.0;

pub fn region_factor(region: Region) -> f64 {
    match region {
        Region::Northeast => 1.04,
        Region::Northwest => 1.02,
        Region::Southeast => 1.00,
        Region::Southwest => 0.98,
    }
}

/// Deterministic non-ML estimator
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEstimator;

impl FallbackEstimator {
    pub fn estimate(input: &RawInput) -> f64 {
        let bmi_excess = if input.bmi.is_finite() {
            (input.bmi - BMI_HEALTHY).max(0.0)
        } else {
            0.0
        };
        let smoker = if input.smoker.is_smoker() {
            SMOKER_SURCHARGE
        } else {
            0.0
        };

        let subtotal = BASE_COST
            + AGE_RATE * input.age as f64
            + BMI_RATE * bmi_excess
            + CHILD_RATE * input.children as f64
            + smoker;

        round_to(subtotal * region_factor(input.region), 2)
    }

    pub fn predict(input: &RawInput) -> Prediction {
        Prediction {
            cost: Self::estimate(input),
            source: PredictionSource::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sex, Smoker};

    fn input(age: u32, bmi: f64, children: u32, smoker: Smoker, region: Region) -> RawInput {
        RawInput {
            age,
            sex: Sex::Female,
            bmi,
            children,
            smoker,
            region,
        }
    }

    #[test]
    fn test_documented_example() {
        // (3000 + 4940 + 320 * 9.4 + 0 + 23000) * 0.98
        let cost = FallbackEstimator::estimate(&input(19, 27.9, 0, Smoker::Yes, Region::Southwest));
        assert!((cost - 33269.04).abs() < 0.005, "{cost}");
    }

    #[test]
    fn test_bmi_below_threshold_adds_nothing() {
        let low = FallbackEstimator::estimate(&input(30, 10.0, 0, Smoker::No, Region::Southeast));
        let healthy = FallbackEstimator::estimate(&input(30, 18.5, 0, Smoker::No, Region::Southeast));
        assert_eq!(low, healthy);
        assert_eq!(low, 3000.0 + 260.0 * 30.0);
    }

    #[test]
    fn test_monotone_in_risk_factors() {
        let base = input(40, 30.0, 1, Smoker::No, Region::Northwest);
        let older = RawInput { age: 50, ..base };
        let smoker = RawInput { smoker: Smoker::Yes, ..base };
        let heavier = RawInput { bmi: 35.0, ..base };
        let b = FallbackEstimator::estimate(&base);
        assert!(FallbackEstimator::estimate(&older) > b);
        assert!(FallbackEstimator::estimate(&smoker) > b);
        assert!(FallbackEstimator::estimate(&heavier) > b);
    }

    #[test]
    fn test_ignores_sex() {
        let female = input(40, 30.0, 1, Smoker::No, Region::Northwest);
        let male = RawInput { sex: Sex::Male, ..female };
        assert_eq!(FallbackEstimator::estimate(&female), FallbackEstimator::estimate(&male));
    }

    #[test]
    fn test_finite_and_non_negative_over_range() {
        for age in [0, 18, 64, 120] {
            for bmi in [10.0, 18.5, 33.3, 50.0] {
                for children in [0, 3, 10] {
                    for smoker in [Smoker::No, Smoker::Yes] {
                        for region in Region::ALL {
                            let cost = FallbackEstimator::estimate(&input(age, bmi, children, smoker, region));
                            assert!(cost.is_finite() && cost >= 0.0);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_prediction_source() {
        let p = FallbackEstimator::predict(&input(19, 27.9, 0, Smoker::Yes, Region::Southwest));
        assert!(p.source.is_fallback());
    }
}
