//! Offline model training and comparison
//!
//! Encodes the labeled dataset, splits it with a fixed seed, optionally
//! standardizes age and bmi on the training partition, fits every
//! candidate regressor, reports their scores, and packages the designated
//! served model as a [`ModelArtifact`].

mod cancel;
mod dataset;
mod evaluation;
mod regressors;
mod split;

pub use cancel::CancelFlag;
pub use dataset::{Dataset, REQUIRED_COLUMNS};
pub use evaluation::{cross_validate, evaluate, r2_score, rmse, CandidateMetrics};
pub use regressors::{build_regressor, ModelKind, Regressor, RegressorParams};
pub use split::{k_fold_indices, train_test_split};

use crate::artifact::ModelArtifact;
use crate::error::{CostError, Result};
use crate::features::FeatureEncoder;
use crate::preprocessing::StandardScaler;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Fraction of rows held out for testing
    pub test_fraction: f64,
    /// Seed for the train/test shuffle
    pub seed: u64,
    /// Folds used for cross-validation on the training partition
    pub cv_folds: usize,
    /// Standardize age and bmi with a scaler fit on the training partition
    pub standardize: bool,
    /// Models fitted and reported
    pub candidates: Vec<ModelKind>,
    /// Model persisted for serving, regardless of score
    pub serve_model: ModelKind,
    pub params: RegressorParams,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            cv_folds: 10,
            standardize: true,
            candidates: ModelKind::ALL.to_vec(),
            serve_model: ModelKind::LinearRegression,
            params: RegressorParams::default(),
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(CostError::TrainingFailed(format!(
                "test fraction {} must be within (0, 1)",
                self.test_fraction
            )));
        }
        if !self.serve_model.is_persistable() {
            return Err(CostError::TrainingFailed(format!(
                "{} cannot be persisted as the served model",
                self.serve_model
            )));
        }
        if self.cv_folds < 2 {
            return Err(CostError::TrainingFailed(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.cv_folds
            )));
        }
        Ok(())
    }

    /// Candidates to fit, always including the served model exactly once
    fn effective_candidates(&self) -> Vec<ModelKind> {
        let mut kinds = vec![self.serve_model];
        for kind in &self.candidates {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }
}

/// Comparison of all candidates from one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Sorted by cross-validation score, best first
    pub candidates: Vec<CandidateMetrics>,
    /// Candidates that could not be fit, with the reason
    pub failures: Vec<(ModelKind, String)>,
    pub selected: ModelKind,
    pub train_rows: usize,
    pub test_rows: usize,
    pub standardized: bool,
}

impl TrainingReport {
    pub fn selected_metrics(&self) -> Option<&CandidateMetrics> {
        self.candidates.iter().find(|m| m.model == self.selected)
    }

    /// Highest cross-validation score, which need not be the served model
    pub fn best_by_cv(&self) -> Option<&CandidateMetrics> {
        self.candidates.first()
    }
}

/// Whether a trained artifact reached storage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaveStatus {
    /// Kept in memory only, nothing was written
    #[default]
    NotSaved,
    Saved(PathBuf),
    Failed { path: PathBuf, reason: String },
}

impl SaveStatus {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveStatus::Saved(_))
    }
}

/// Result of a successful training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub report: TrainingReport,
    /// Set by whoever persists the artifact; the trainer never writes
    pub save: SaveStatus,
}

/// Fits, compares and packages regression models
#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    config: TrainerConfig,
    encoder: FeatureEncoder,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            encoder: FeatureEncoder::new(),
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn train_from_path(&self, path: &Path) -> Result<TrainingOutcome> {
        let dataset = Dataset::from_csv_path(path)?;
        self.train(&dataset)
    }

    /// Fit all candidates and package the served model
    pub fn train(&self, dataset: &Dataset) -> Result<TrainingOutcome> {
        self.train_cancellable(dataset, &CancelFlag::new())
    }

    /// [`train`](Self::train) that stops with `TrainingFailed` once `cancel`
    /// is raised; checked before each candidate and each validation fold
    pub fn train_cancellable(&self, dataset: &Dataset, cancel: &CancelFlag) -> Result<TrainingOutcome> {
        self.config.validate()?;
        cancel.check()?;
        let start = Instant::now();

        let n = dataset.len();
        let x = dataset.features(&self.encoder);
        let y = dataset.targets();

        let (train_idx, test_idx) = train_test_split(n, self.config.test_fraction, self.config.seed);
        if train_idx.len() <= x.ncols() + 1 || test_idx.is_empty() {
            return Err(CostError::TrainingFailed(format!(
                "dataset of {n} rows is too small to train and evaluate"
            )));
        }

        let mut x_train = x.select(Axis(0), &train_idx);
        let mut x_test = x.select(Axis(0), &test_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let y_test = y.select(Axis(0), &test_idx);

        let scaler = if self.config.standardize {
            let scaler = StandardScaler::fit(&x_train, &StandardScaler::default_columns())?;
            x_train = scaler.transform(&x_train);
            x_test = scaler.transform(&x_test);
            Some(scaler)
        } else {
            None
        };

        let mut metrics = Vec::new();
        let mut failures = Vec::new();
        let mut served = None;

        for kind in self.config.effective_candidates() {
            cancel.check()?;
            let mut model = build_regressor(kind, &self.config.params);
            let scored = model.fit(&x_train, &y_train).and_then(|_| {
                evaluate(
                    model.as_ref(),
                    &self.config.params,
                    (&x_train, &y_train),
                    (&x_test, &y_test),
                    self.config.cv_folds,
                    cancel,
                )
            });

            match scored {
                Ok(m) => {
                    info!(
                        model = %kind,
                        rmse = m.rmse,
                        r2_train = m.r2_train,
                        r2_test = m.r2_test,
                        cv_mean = m.cv_mean,
                        "Candidate evaluated"
                    );
                    if kind == self.config.serve_model {
                        served = model.linear_model();
                    }
                    metrics.push(m);
                }
                Err(e) if cancel.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(model = %kind, error = %e, "Candidate failed to fit");
                    failures.push((kind, e.detail()));
                }
            }
        }

        let linear = served.ok_or_else(|| {
            let reason = failures
                .iter()
                .find(|(k, _)| *k == self.config.serve_model)
                .map(|(_, e)| e.clone())
                .unwrap_or_else(|| "no fitted parameters".to_string());
            CostError::TrainingFailed(format!("{}: {}", self.config.serve_model, reason))
        })?;

        // best cross-validation score first, unscored candidates last
        metrics.sort_by(|a, b| {
            b.cv_mean
                .partial_cmp(&a.cv_mean)
                .unwrap_or_else(|| a.cv_mean.is_nan().cmp(&b.cv_mean.is_nan()))
        });

        let report = TrainingReport {
            candidates: metrics,
            failures,
            selected: self.config.serve_model,
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
            standardized: scaler.is_some(),
        };

        let artifact = ModelArtifact::new(linear, scaler, report.selected_metrics().cloned(), n);

        info!(
            version = %artifact.version,
            selected = %report.selected,
            best_by_cv = ?report.best_by_cv().map(|m| m.model),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Training run complete"
        );

        Ok(TrainingOutcome {
            artifact,
            report,
            save: SaveStatus::NotSaved,
        })
    }

    /// Run [`train`](Self::train) on a worker thread, failing on overrun.
    ///
    /// On overrun the worker is cancelled and joined before returning, so
    /// the caller never has two runs in flight. A fit already in progress
    /// finishes first; only its result is dropped.
    pub fn train_with_timeout(&self, dataset: Dataset, timeout: Duration) -> Result<TrainingOutcome> {
        let trainer = self.clone();
        let cancel = CancelFlag::new();
        let worker_cancel = cancel.clone();
        let (tx, rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("medcost-train".into())
            .spawn(move || {
                let _ = tx.send(trainer.train_cancellable(&dataset, &worker_cancel));
            })
            .map_err(|e| CostError::TrainingFailed(format!("failed to spawn training worker: {e}")))?;

        let received = rx.recv_timeout(timeout);
        if received.is_err() {
            cancel.cancel();
            warn!(timeout = ?timeout, "Training overran its budget, stopping the worker");
        }
        let panicked = worker.join().is_err();

        match received {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CostError::TrainingFailed(format!(
                "training exceeded {:?}",
                timeout
            ))),
            Err(RecvTimeoutError::Disconnected) if panicked => Err(CostError::TrainingFailed(
                "training worker panicked".into(),
            )),
            Err(RecvTimeoutError::Disconnected) => Err(CostError::TrainingFailed(
                "training worker exited without a result".into(),
            )),
        }
    }
}
