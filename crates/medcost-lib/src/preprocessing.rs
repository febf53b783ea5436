//! Standardization of continuous feature columns
//!
//! The scaler is fit on the training partition only and then travels
//! inside the artifact, so inference applies the exact same transform.

use crate::error::{CostError, Result};
use crate::features::{AGE_COLUMN, BMI_COLUMN, NUM_FEATURES};
use crate::models::FeatureVector;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column mean/std standardization for a subset of columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<usize>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl StandardScaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-9;

    /// Columns standardized by default: age and bmi
    pub fn default_columns() -> Vec<usize> {
        vec![AGE_COLUMN, BMI_COLUMN]
    }

    /// Fit on rows of `x` (samples x features) using population std.
    pub fn fit(x: &Array2<f64>, columns: &[usize]) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(CostError::TrainingFailed(
                "cannot fit scaler on an empty matrix".into(),
            ));
        }
        if let Some(&bad) = columns.iter().find(|&&c| c >= x.ncols()) {
            return Err(CostError::TrainingFailed(format!(
                "scaler column {bad} out of range for {} features",
                x.ncols()
            )));
        }

        let mut mean = Vec::with_capacity(columns.len());
        let mut std = Vec::with_capacity(columns.len());
        for &c in columns {
            let col = x.index_axis(Axis(1), c);
            let m = col.mean().unwrap_or(0.0);
            let var = col.mapv(|v| (v - m).powi(2)).mean().unwrap_or(0.0);
            mean.push(m);
            std.push(var.sqrt().max(Self::MIN_STD));
        }

        Ok(Self {
            columns: columns.to_vec(),
            mean,
            std,
        })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for (i, &c) in self.columns.iter().enumerate() {
            let (m, s) = (self.mean[i], self.std[i]);
            out.index_axis_mut(Axis(1), c).mapv_inplace(|v| (v - m) / s);
        }
        out
    }

    pub fn transform_vector(&self, features: &FeatureVector) -> FeatureVector {
        let mut values = features.0;
        for (i, &c) in self.columns.iter().enumerate() {
            values[c] = (values[c] - self.mean[i]) / self.std[i];
        }
        FeatureVector(values)
    }

    /// Checks that the fitted parameters are usable at inference time
    pub fn validate(&self) -> Result<()> {
        let consistent = self.columns.len() == self.mean.len()
            && self.columns.len() == self.std.len()
            && self.columns.iter().all(|&c| c < NUM_FEATURES);
        let finite = self.mean.iter().chain(&self.std).all(|v| v.is_finite())
            && self.std.iter().all(|&s| s > 0.0);
        if consistent && finite {
            Ok(())
        } else {
            Err(CostError::ArtifactMismatch(
                "scaler parameters are malformed".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn matrix() -> Array2<f64> {
        array![
            [20.0, 0.0, 20.0, 0.0, 0.0, 0.0],
            [40.0, 1.0, 30.0, 1.0, 1.0, 1.0],
            [60.0, 0.0, 40.0, 2.0, 0.0, 2.0],
        ]
    }

    #[test]
    fn test_fit_mean_and_std() {
        let sc = StandardScaler::fit(&matrix(), &StandardScaler::default_columns()).unwrap();
        assert_eq!(sc.columns, vec![0, 2]);
        assert!((sc.mean[0] - 40.0).abs() < 1e-12);
        assert!((sc.mean[1] - 30.0).abs() < 1e-12);
        // population std of [20, 40, 60]
        assert!((sc.std[0] - (800.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_transform_leaves_categorical_columns() {
        let x = matrix();
        let sc = StandardScaler::fit(&x, &[0, 2]).unwrap();
        let t = sc.transform(&x);
        assert_eq!(t.column(1), x.column(1));
        assert_eq!(t.column(5), x.column(5));
        assert!(t.column(0).sum().abs() < 1e-9);
        assert!((t[[1, 2]]).abs() < 1e-12);
    }

    #[test]
    fn test_vector_transform_matches_matrix() {
        let x = matrix();
        let sc = StandardScaler::fit(&x, &[0, 2]).unwrap();
        let t = sc.transform(&x);
        let row = FeatureVector([60.0, 0.0, 40.0, 2.0, 0.0, 2.0]);
        let v = sc.transform_vector(&row);
        for c in 0..NUM_FEATURES {
            assert!((v.0[c] - t[[2, c]]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_does_not_divide_by_zero() {
        let x = array![[30.0, 0.0, 25.0, 0.0, 0.0, 0.0], [30.0, 1.0, 25.0, 0.0, 1.0, 3.0]];
        let sc = StandardScaler::fit(&x, &[0, 2]).unwrap();
        assert!(sc.transform(&x).iter().all(|v| v.is_finite()));
        assert!(sc.validate().is_ok());
    }

    #[test]
    fn test_empty_and_bad_columns_rejected() {
        let empty = Array2::<f64>::zeros((0, NUM_FEATURES));
        assert!(StandardScaler::fit(&empty, &[0]).is_err());
        assert!(StandardScaler::fit(&matrix(), &[7]).is_err());
    }

    #[test]
    fn test_validate_detects_malformed() {
        let sc = StandardScaler {
            columns: vec![0, 2],
            mean: vec![39.2],
            std: vec![14.0, 6.1],
        };
        assert!(sc.validate().is_err());
    }
}
