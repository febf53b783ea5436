//! Cost prediction over a loaded model artifact
//!
//! [`CostPredictor`] separates the administrative lifecycle (load, cold-start
//! training, retraining) from request-time prediction. Requests never train:
//! when no model is resident they try a cheap artifact load and otherwise
//! answer with the fallback formula.

use super::fallback::FallbackEstimator;
use super::output::{OutputConfig, OutputFormatter};
use super::CostEstimator;
use crate::artifact::ModelArtifact;
use crate::error::{CostError, Result};
use crate::features::FeatureEncoder;
use crate::health::{components, ComponentHealth, HealthReport};
use crate::models::{Prediction, PredictionRecord, PredictionSource, RawInput};
use crate::observability::{EstimatorMetrics, StructuredLogger};
use crate::trainer::{Dataset, ModelTrainer, SaveStatus, TrainerConfig, TrainingOutcome};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default wall-clock budget for a cold-start or administrative training run
pub const DEFAULT_TRAINING_TIMEOUT: Duration = Duration::from_secs(300);

/// Minimum gap between request-triggered artifact load attempts
pub const DEFAULT_RELOAD_BACKOFF: Duration = Duration::from_secs(30);

/// Configuration for the predictor lifecycle
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    /// Where the serialized model lives
    pub artifact_path: PathBuf,
    /// Labeled CSV used for cold-start training
    pub dataset_path: PathBuf,
    pub training_timeout: Duration,
    pub reload_backoff: Duration,
    pub trainer: TrainerConfig,
    /// Floor and rounding applied to model outputs
    pub output: OutputConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("models/insurance_model.json"),
            dataset_path: PathBuf::from("data/insurance.csv"),
            training_timeout: DEFAULT_TRAINING_TIMEOUT,
            reload_backoff: DEFAULT_RELOAD_BACKOFF,
            trainer: TrainerConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Default)]
struct LifecycleState {
    last_load_attempt: Option<Instant>,
    /// (artifact needs operator attention, message)
    last_load_error: Option<(bool, String)>,
    last_training_error: Option<String>,
}

/// Prediction counters
#[derive(Debug, Clone, Serialize)]
pub struct PredictorStats {
    pub model_predictions: u64,
    pub fallback_predictions: u64,
    pub training_runs: u64,
    pub training_failures: u64,
    pub model_version: Option<String>,
}

/// Cost predictor owned by the application's composition root
pub struct CostPredictor {
    config: PredictorConfig,
    encoder: FeatureEncoder,
    formatter: OutputFormatter,
    model: RwLock<Option<Arc<ModelArtifact>>>,
    /// Held for every load or training run, so at most one executes
    lifecycle: Mutex<()>,
    state: Mutex<LifecycleState>,
    metrics: EstimatorMetrics,
    logger: StructuredLogger,
    model_predictions: AtomicU64,
    fallback_predictions: AtomicU64,
    training_runs: AtomicU64,
    training_failures: AtomicU64,
}

impl CostPredictor {
    /// Create a predictor with no model resident; performs no I/O
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            formatter: OutputFormatter::with_config(config.output.clone()),
            config,
            encoder: FeatureEncoder::new(),
            model: RwLock::new(None),
            lifecycle: Mutex::new(()),
            state: Mutex::new(LifecycleState::default()),
            metrics: EstimatorMetrics::new(),
            logger: StructuredLogger::new("predictor"),
            model_predictions: AtomicU64::new(0),
            fallback_predictions: AtomicU64::new(0),
            training_runs: AtomicU64::new(0),
            training_failures: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// The resident artifact, if any
    pub fn current(&self) -> Option<Arc<ModelArtifact>> {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn model_version(&self) -> Option<String> {
        self.current().map(|a| a.version.clone())
    }

    /// Load the artifact from storage unless one is already resident.
    ///
    /// Never trains.
    pub fn ensure_loaded(&self) -> Result<Arc<ModelArtifact>> {
        if let Some(artifact) = self.current() {
            return Ok(artifact);
        }
        let _guard = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        self.load_locked()
    }

    /// Administrative startup: load the artifact, or train one from the
    /// dataset when loading fails and the dataset exists.
    pub fn cold_start(&self) -> Result<Arc<ModelArtifact>> {
        let _guard = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);

        match self.load_locked() {
            Ok(artifact) => Ok(artifact),
            Err(load_err) if !self.config.dataset_path.exists() => {
                warn!(
                    error = %load_err,
                    dataset = %self.config.dataset_path.display(),
                    "No usable artifact and no dataset, serving fallback estimates"
                );
                Err(load_err)
            }
            Err(load_err) => {
                info!(
                    error = %load_err,
                    dataset = %self.config.dataset_path.display(),
                    "No usable artifact, training from dataset"
                );
                let outcome = self.train_locked()?;
                Ok(Arc::new(outcome.artifact))
            }
        }
    }

    /// Administrative retrain; the resident model is replaced only on success.
    ///
    /// A model that trained but could not be written is still installed;
    /// check [`TrainingOutcome::save`] before reporting it as persisted.
    pub fn retrain(&self) -> Result<TrainingOutcome> {
        let _guard = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        self.train_locked()
    }

    /// Verify and install an artifact obtained elsewhere
    pub fn install(&self, artifact: ModelArtifact) -> Result<()> {
        artifact.verify()?;
        let _guard = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        self.install_locked(artifact);
        Ok(())
    }

    /// Predicted cost, falling back to the closed-form estimate on any
    /// model-side failure
    pub fn predict(&self, input: &RawInput) -> f64 {
        self.predict_detailed(input).cost
    }

    /// Public call shape of the calling application. Unknown categorical
    /// values are a caller contract violation and surface as
    /// [`CostError::EncodingError`].
    pub fn predict_raw(
        &self,
        age: u32,
        sex: &str,
        bmi: f64,
        children: u32,
        smoker: &str,
        region: &str,
    ) -> Result<f64> {
        let input = RawInput::from_raw(age, sex, bmi, children, smoker, region)?;
        Ok(self.predict(&input))
    }

    pub fn predict_record(&self, input: &RawInput) -> PredictionRecord {
        PredictionRecord::new(*input, self.predict_detailed(input))
    }

    pub fn predict_detailed(&self, input: &RawInput) -> Prediction {
        let start = Instant::now();

        let prediction = match self.model_prediction(input) {
            Ok(prediction) => {
                self.model_predictions.fetch_add(1, Ordering::Relaxed);
                self.metrics.inc_model_predictions();
                prediction
            }
            Err(e) => {
                self.fallback_predictions.fetch_add(1, Ordering::Relaxed);
                self.metrics.inc_fallback_predictions();
                match e {
                    CostError::PredictionUnavailable(_) => self.logger.log_fallback(&e.to_string()),
                    _ => debug!(reason = %e, "No model resident, using fallback"),
                }
                FallbackEstimator::predict(input)
            }
        };

        let elapsed = start.elapsed();
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());
        let version = match &prediction.source {
            PredictionSource::Model { version } => version.as_str(),
            PredictionSource::Fallback => "fallback",
        };
        self.logger
            .log_prediction(prediction.cost, version, elapsed.as_micros());

        prediction
    }

    pub fn health(&self) -> HealthReport {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report = BTreeMap::new();

        match self.current() {
            Some(artifact) => {
                report.insert(
                    components::MODEL.to_string(),
                    ComponentHealth::healthy_with(artifact.version.clone()),
                );
                report.insert(components::ARTIFACT.to_string(), ComponentHealth::healthy());
            }
            None => {
                report.insert(
                    components::MODEL.to_string(),
                    ComponentHealth::degraded("no model resident, serving fallback estimates"),
                );
                let artifact = match &state.last_load_error {
                    Some((true, msg)) => ComponentHealth::unhealthy(msg.clone()),
                    Some((false, msg)) => ComponentHealth::degraded(msg.clone()),
                    None => ComponentHealth::degraded("artifact not loaded yet"),
                };
                report.insert(components::ARTIFACT.to_string(), artifact);
            }
        }

        let training = match &state.last_training_error {
            Some(msg) => ComponentHealth::degraded(msg.clone()),
            None => ComponentHealth::healthy(),
        };
        report.insert(components::TRAINING.to_string(), training);

        HealthReport::new(report)
    }

    pub fn stats(&self) -> PredictorStats {
        PredictorStats {
            model_predictions: self.model_predictions.load(Ordering::Relaxed),
            fallback_predictions: self.fallback_predictions.load(Ordering::Relaxed),
            training_runs: self.training_runs.load(Ordering::Relaxed),
            training_failures: self.training_failures.load(Ordering::Relaxed),
            model_version: self.model_version(),
        }
    }

    fn model_prediction(&self, input: &RawInput) -> Result<Prediction> {
        let artifact = self.resident_or_try_load()?;
        let features = self.encoder.encode(input);
        let raw = artifact.predict(&features)?;
        Ok(Prediction {
            cost: self.formatter.format(raw),
            source: PredictionSource::Model {
                version: artifact.version.clone(),
            },
        })
    }

    /// Request-path load: rate limited, and skipped while a load or
    /// training run holds the lifecycle lock
    fn resident_or_try_load(&self) -> Result<Arc<ModelArtifact>> {
        if let Some(artifact) = self.current() {
            return Ok(artifact);
        }

        let backing_off = {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state
                .last_load_attempt
                .is_some_and(|t| t.elapsed() < self.config.reload_backoff)
        };
        if backing_off {
            return Err(CostError::data_unavailable(
                &self.config.artifact_path,
                "no model resident, waiting out reload backoff",
            ));
        }

        let _guard = match self.lifecycle.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Err(CostError::data_unavailable(
                    &self.config.artifact_path,
                    "model load or training in progress",
                ))
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        self.load_locked()
    }

    /// Caller must hold `lifecycle`
    fn load_locked(&self) -> Result<Arc<ModelArtifact>> {
        if let Some(artifact) = self.current() {
            return Ok(artifact);
        }

        let path = &self.config.artifact_path;
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_load_attempt = Some(Instant::now());

        match ModelArtifact::load(path) {
            Ok(artifact) => Ok(self.install_locked(artifact)),
            Err(e) => {
                let needs_attention = matches!(e, CostError::ArtifactMismatch(_));
                if needs_attention {
                    warn!(path = %path.display(), error = %e, "Artifact rejected");
                } else {
                    debug!(path = %path.display(), error = %e, "Artifact unavailable");
                }
                self.state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .last_load_error = Some((needs_attention, e.to_string()));
                Err(e)
            }
        }
    }

    /// Caller must hold `lifecycle`
    fn train_locked(&self) -> Result<TrainingOutcome> {
        self.training_runs.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_training_runs();
        let start = Instant::now();

        let trainer = ModelTrainer::new(self.config.trainer.clone());
        let result = Dataset::from_csv_path(&self.config.dataset_path)
            .and_then(|dataset| trainer.train_with_timeout(dataset, self.config.training_timeout));

        let mut outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.training_failures.fetch_add(1, Ordering::Relaxed);
                self.metrics.inc_training_failures();
                self.logger.log_training_failed(&e.to_string());
                self.state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .last_training_error = Some(e.to_string());
                return Err(e);
            }
        };

        let elapsed = start.elapsed().as_secs_f64();
        self.metrics.observe_training_duration(elapsed);

        let path = self.config.artifact_path.clone();
        outcome.save = match outcome.artifact.save(&path) {
            Ok(()) => SaveStatus::Saved(path),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to persist trained artifact, serving it from memory only"
                );
                SaveStatus::Failed {
                    path,
                    reason: e.to_string(),
                }
            }
        };

        let metrics = outcome.report.selected_metrics();
        self.logger.log_training_complete(
            &outcome.artifact.version,
            outcome.artifact.dataset_rows,
            metrics.map(|m| m.rmse),
            metrics.map(|m| m.r2_test),
            elapsed,
        );

        self.install_locked(outcome.artifact.clone());
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_training_error = match &outcome.save {
            SaveStatus::Failed { reason, .. } => Some(format!("trained model not persisted: {reason}")),
            _ => None,
        };
        Ok(outcome)
    }

    /// Caller must hold `lifecycle`
    fn install_locked(&self, artifact: ModelArtifact) -> Arc<ModelArtifact> {
        let artifact = Arc::new(artifact);
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = Some(artifact.clone());

        self.metrics
            .set_model_version(&artifact.version, artifact.model.kind.as_str());
        self.logger.log_model_loaded(
            &artifact.version,
            &self.config.artifact_path.display().to_string(),
        );
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_load_error = None;
        artifact
    }
}

impl CostEstimator for CostPredictor {
    fn estimate(&self, input: &RawInput) -> Prediction {
        self.predict_detailed(input)
    }

    fn model_version(&self) -> Option<String> {
        CostPredictor::model_version(self)
    }
}
