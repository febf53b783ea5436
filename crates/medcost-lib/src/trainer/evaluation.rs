//! Scoring candidate models on held-out data

use super::cancel::CancelFlag;
use super::regressors::{build_regressor, ModelKind, Regressor, RegressorParams};
use super::split::k_fold_indices;
use crate::error::{CostError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Scores reported for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetrics {
    pub model: ModelKind,
    /// Root mean squared error on the test partition
    pub rmse: f64,
    pub r2_train: f64,
    pub r2_test: f64,
    /// Mean R² over k folds of the training partition
    pub cv_mean: f64,
}

pub fn rmse(predicted: &Array1<f64>, actual: &Array1<f64>) -> f64 {
    if actual.is_empty() {
        return f64::NAN;
    }
    let mse = (predicted - actual).mapv(|d| d * d).mean().unwrap_or(f64::NAN);
    mse.sqrt()
}

/// Coefficient of determination; NaN when `actual` has no variance
pub fn r2_score(predicted: &Array1<f64>, actual: &Array1<f64>) -> f64 {
    let Some(mean) = actual.mean() else {
        return f64::NAN;
    };
    let ss_res: f64 = (actual - predicted).mapv(|d| d * d).sum();
    let ss_tot: f64 = actual.mapv(|v| (v - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return f64::NAN;
    }
    1.0 - ss_res / ss_tot
}

/// Mean R² across `k` contiguous folds of (x, y)
pub fn cross_validate(
    kind: ModelKind,
    params: &RegressorParams,
    x: &Array2<f64>,
    y: &Array1<f64>,
    k: usize,
    cancel: &CancelFlag,
) -> Result<f64> {
    let folds = k_fold_indices(x.nrows(), k);
    if folds.is_empty() {
        return Err(CostError::TrainingFailed(
            "not enough rows for cross-validation".into(),
        ));
    }

    let mut scores = Vec::with_capacity(folds.len());
    for (fit_idx, val_idx) in &folds {
        cancel.check()?;
        let mut model = build_regressor(kind, params);
        model.fit(&x.select(Axis(0), fit_idx), &y.select(Axis(0), fit_idx))?;
        let predicted = model.predict(&x.select(Axis(0), val_idx))?;
        let score = r2_score(&predicted, &y.select(Axis(0), val_idx));
        if score.is_finite() {
            scores.push(score);
        }
    }

    if scores.is_empty() {
        return Ok(f64::NAN);
    }
    Ok(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Score an already-fitted model on both partitions plus k-fold CV
pub fn evaluate(
    model: &dyn Regressor,
    params: &RegressorParams,
    train: (&Array2<f64>, &Array1<f64>),
    test: (&Array2<f64>, &Array1<f64>),
    cv_folds: usize,
    cancel: &CancelFlag,
) -> Result<CandidateMetrics> {
    let train_pred = model.predict(train.0)?;
    let test_pred = model.predict(test.0)?;
    let cv_mean = cross_validate(model.kind(), params, train.0, train.1, cv_folds, cancel)?;

    Ok(CandidateMetrics {
        model: model.kind(),
        rmse: rmse(&test_pred, test.1),
        r2_train: r2_score(&train_pred, train.1),
        r2_test: r2_score(&test_pred, test.1),
        cv_mean,
    })
}
