//! Error taxonomy for the estimation pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, CostError>;

/// Errors produced by the encoder, trainer, artifact store and predictor
#[derive(Debug, Error)]
pub enum CostError {
    /// Dataset or artifact file missing, unreadable or malformed
    #[error("data unavailable at {path}: {reason}")]
    DataUnavailable { path: PathBuf, reason: String },

    /// A fit raised or produced no usable model
    #[error("training failed: {0}")]
    TrainingFailed(String),

    /// Unrecognized categorical value
    #[error("unrecognized {field} value {value:?}")]
    EncodingError { field: &'static str, value: String },

    /// The model call itself failed after a successful load
    #[error("prediction unavailable: {0}")]
    PredictionUnavailable(String),

    /// The artifact was produced under a different schema or encoding
    #[error("artifact incompatible with this build: {0}")]
    ArtifactMismatch(String),
}

impl CostError {
    pub fn data_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DataUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn encoding(field: &'static str, value: impl Into<String>) -> Self {
        Self::EncodingError {
            field,
            value: value.into(),
        }
    }

    /// Message without the variant prefix, for nesting under another context
    pub fn detail(&self) -> String {
        match self {
            CostError::TrainingFailed(reason) | CostError::PredictionUnavailable(reason) => {
                reason.clone()
            }
            other => other.to_string(),
        }
    }

    /// Errors that degrade to the fallback formula instead of reaching the caller
    pub fn is_degradable(&self) -> bool {
        !matches!(self, CostError::EncodingError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_error_is_not_degradable() {
        let err = CostError::encoding("region", "atlantis");
        assert!(!err.is_degradable());
        assert!(err.to_string().contains("atlantis"));
    }

    #[test]
    fn test_detail_drops_prefix() {
        let err = CostError::TrainingFailed("singular".into());
        assert_eq!(err.to_string(), "training failed: singular");
        assert_eq!(err.detail(), "singular");
        let err = CostError::data_unavailable("/tmp/x.csv", "missing");
        assert_eq!(err.detail(), err.to_string());
    }

    #[test]
    fn test_cold_start_errors_degrade() {
        assert!(CostError::data_unavailable("/tmp/x.json", "missing").is_degradable());
        assert!(CostError::TrainingFailed("singular".into()).is_degradable());
        assert!(CostError::PredictionUnavailable("nan".into()).is_degradable());
        assert!(CostError::ArtifactMismatch("schema 9".into()).is_degradable());
    }
}
