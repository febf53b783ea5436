//! Medical insurance cost estimation library
//!
//! This crate provides the core functionality for:
//! - Encoding personal health attributes into model features
//! - Training and comparing regression models offline
//! - Persisting versioned model artifacts
//! - Request-time cost prediction with a closed-form fallback
//! - Health checks and observability

pub mod artifact;
pub mod error;
pub mod features;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod preprocessing;
pub mod trainer;

pub use artifact::{LinearModel, ModelArtifact, ARTIFACT_SCHEMA_VERSION};
pub use error::{CostError, Result};
pub use features::{EncodingScheme, FeatureEncoder, FEATURE_NAMES, NUM_FEATURES};
pub use health::{ComponentHealth, ComponentStatus, HealthReport};
pub use models::*;
pub use observability::{EstimatorMetrics, StructuredLogger};
pub use predictor::{
    CostEstimator, CostPredictor, FallbackEstimator, OutputConfig, PredictorConfig, PredictorStats,
};
pub use trainer::{
    CancelFlag, Dataset, ModelKind, ModelTrainer, SaveStatus, TrainerConfig, TrainingOutcome,
    TrainingReport,
};
