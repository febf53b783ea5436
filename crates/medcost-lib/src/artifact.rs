//! Versioned model artifact storage
//!
//! This module provides:
//! - The persisted artifact format (linear model + scaler + encoding tables)
//! - Schema and encoding compatibility checks on load
//! - Checksum validation of the fitted parameters
//! - Atomic writes so a failed save never clobbers the previous artifact

use crate::error::{CostError, Result};
use crate::features::{EncodingScheme, FEATURE_NAMES, NUM_FEATURES};
use crate::models::FeatureVector;
use crate::preprocessing::StandardScaler;
use crate::trainer::{CandidateMetrics, ModelKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Artifact layout version understood by this build
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Fitted linear model: `intercept + coefficients · features`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub kind: ModelKind,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        if self.coefficients.len() != NUM_FEATURES {
            return Err(CostError::PredictionUnavailable(format!(
                "model has {} coefficients, expected {}",
                self.coefficients.len(),
                NUM_FEATURES
            )));
        }
        let value = self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.as_slice())
                .map(|(w, x)| w * x)
                .sum::<f64>();
        if !value.is_finite() {
            return Err(CostError::PredictionUnavailable(format!(
                "model produced non-finite output {value}"
            )));
        }
        Ok(value)
    }

    fn is_finite(&self) -> bool {
        self.intercept.is_finite() && self.coefficients.iter().all(|c| c.is_finite())
    }
}

/// A trained model together with everything inference needs to reproduce
/// the training-time feature pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: u32,
    pub version: String,
    pub encoding: EncodingScheme,
    pub feature_names: Vec<String>,
    pub scaler: Option<StandardScaler>,
    pub model: LinearModel,
    pub metrics: Option<CandidateMetrics>,
    pub dataset_rows: usize,
    pub trained_at: DateTime<Utc>,
    pub checksum: String,
}

impl ModelArtifact {
    pub fn new(
        model: LinearModel,
        scaler: Option<StandardScaler>,
        metrics: Option<CandidateMetrics>,
        dataset_rows: usize,
    ) -> Self {
        let checksum = compute_checksum(&model, scaler.as_ref());
        Self {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            version: format!("{}-{}", model.kind.as_str(), &checksum[..12]),
            encoding: EncodingScheme::canonical(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            scaler,
            model,
            metrics,
            dataset_rows,
            trained_at: Utc::now(),
            checksum,
        }
    }

    /// Apply the stored scaler and the model to an encoded vector
    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let features = match &self.scaler {
            Some(scaler) => scaler.transform_vector(features),
            None => *features,
        };
        self.model.predict(&features)
    }

    /// Reject artifacts this build cannot serve faithfully
    pub fn verify(&self) -> Result<()> {
        if self.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(CostError::ArtifactMismatch(format!(
                "schema version {} (expected {})",
                self.schema_version, ARTIFACT_SCHEMA_VERSION
            )));
        }
        if !self.encoding.is_canonical() {
            return Err(CostError::ArtifactMismatch(format!(
                "category encoding {:?} differs from {:?}",
                self.encoding,
                EncodingScheme::canonical()
            )));
        }
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(CostError::ArtifactMismatch(format!(
                "feature order {:?} differs from {:?}",
                self.feature_names, FEATURE_NAMES
            )));
        }
        if self.model.coefficients.len() != NUM_FEATURES || !self.model.is_finite() {
            return Err(CostError::ArtifactMismatch(
                "model parameters are malformed".into(),
            ));
        }
        if let Some(scaler) = &self.scaler {
            scaler.validate()?;
        }

        let computed = compute_checksum(&self.model, self.scaler.as_ref());
        if computed != self.checksum {
            return Err(CostError::ArtifactMismatch(format!(
                "checksum mismatch: expected {}, got {}",
                self.checksum, computed
            )));
        }
        Ok(())
    }

    /// Load and verify an artifact from disk
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| CostError::data_unavailable(path, e))?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| CostError::data_unavailable(path, format!("malformed artifact: {e}")))?;
        artifact.verify()?;

        info!(
            version = %artifact.version,
            path = %path.display(),
            checksum = %artifact.checksum,
            "Loaded model artifact"
        );
        Ok(artifact)
    }

    /// Persist via temp file + rename
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CostError::data_unavailable(parent, e))?;
        }

        let content = serde_json::to_vec_pretty(self)
            .map_err(|e| CostError::data_unavailable(path, format!("serialize: {e}")))?;

        let temp_path = path.with_extension("tmp");
        let mut file =
            File::create(&temp_path).map_err(|e| CostError::data_unavailable(&temp_path, e))?;
        file.write_all(&content)
            .and_then(|_| file.sync_all())
            .map_err(|e| CostError::data_unavailable(&temp_path, e))?;

        fs::rename(&temp_path, path).map_err(|e| CostError::data_unavailable(path, e))?;

        debug!(
            version = %self.version,
            path = %path.display(),
            size = content.len(),
            "Model artifact written"
        );
        Ok(())
    }
}

/// SHA256 over the little-endian bytes of the fitted parameters
pub fn compute_checksum(model: &LinearModel, scaler: Option<&StandardScaler>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.kind.as_str().as_bytes());
    hasher.update(model.intercept.to_le_bytes());
    for c in &model.coefficients {
        hasher.update(c.to_le_bytes());
    }
    if let Some(scaler) = scaler {
        for ((col, mean), std) in scaler.columns.iter().zip(&scaler.mean).zip(&scaler.std) {
            hasher.update((*col as u64).to_le_bytes());
            hasher.update(mean.to_le_bytes());
            hasher.update(std.to_le_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn model() -> LinearModel {
        LinearModel {
            kind: ModelKind::LinearRegression,
            intercept: -12000.0,
            coefficients: vec![260.0, -130.0, 340.0, 475.0, 23850.0, -350.0],
        }
    }

    #[test]
    fn test_checksum_consistency() {
        let a = compute_checksum(&model(), None);
        let b = compute_checksum(&model(), None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_checksum_covers_scaler() {
        let scaler = StandardScaler {
            columns: vec![0, 2],
            mean: vec![39.0, 30.6],
            std: vec![14.0, 6.1],
        };
        assert_ne!(compute_checksum(&model(), None), compute_checksum(&model(), Some(&scaler)));
    }

    #[test]
    fn test_linear_predict() {
        let features = FeatureVector([19.0, 1.0, 27.9, 0.0, 1.0, 3.0]);
        let value = model().predict(&features).unwrap();
        assert!((value - 25096.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_output_is_prediction_unavailable() {
        let mut m = model();
        m.intercept = f64::INFINITY;
        let err = m.predict(&FeatureVector([0.0; 6])).unwrap_err();
        assert!(matches!(err, CostError::PredictionUnavailable(_)));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("models").join("insurance_model.json");
        let artifact = ModelArtifact::new(model(), None, None, 40);
        artifact.save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.version, artifact.version);
        assert_eq!(loaded.model, artifact.model);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_missing_file_is_data_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let err = ModelArtifact::load(&temp_dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, CostError::DataUnavailable { .. }));
    }

    #[test]
    fn test_garbage_file_is_data_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.json");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            ModelArtifact::load(&path).unwrap_err(),
            CostError::DataUnavailable { .. }
        ));
    }

    #[test]
    fn test_tampered_coefficients_rejected() {
        let mut artifact = ModelArtifact::new(model(), None, None, 40);
        artifact.model.coefficients[4] = 0.0;
        assert!(matches!(artifact.verify(), Err(CostError::ArtifactMismatch(_))));
    }

    #[test]
    fn test_foreign_encoding_rejected() {
        let mut artifact = ModelArtifact::new(model(), None, None, 40);
        artifact.encoding.region = vec![
            "northeast".into(),
            "northwest".into(),
            "southeast".into(),
            "southwest".into(),
        ];
        let err = artifact.verify().unwrap_err();
        assert!(err.to_string().contains("category encoding"));
    }

    #[test]
    fn test_unknown_schema_rejected() {
        let mut artifact = ModelArtifact::new(model(), None, None, 40);
        artifact.schema_version = 2;
        assert!(matches!(artifact.verify(), Err(CostError::ArtifactMismatch(_))));
    }

    #[test]
    fn test_predict_applies_scaler() {
        let scaler = StandardScaler {
            columns: vec![0],
            mean: vec![19.0],
            std: vec![1.0],
        };
        let artifact = ModelArtifact::new(model(), Some(scaler), None, 40);
        let features = FeatureVector([19.0, 1.0, 27.9, 0.0, 1.0, 3.0]);
        // age standardizes to zero, removing its 260 * 19 contribution
        let value = artifact.predict(&features).unwrap();
        assert!((value - (25096.0 - 4940.0)).abs() < 1e-6);
    }
}
