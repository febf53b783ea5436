//! Configuration management for the CLI
//!
//! Sources in increasing precedence: built-in defaults, the config file,
//! `MEDCOST_*` environment variables, then command-line flags.

use crate::TrainArgs;
use anyhow::{Context, Result};
use medcost_lib::{ModelKind, OutputConfig, PredictorConfig, TrainerConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Serialized model location
    pub artifact_path: PathBuf,
    /// Labeled training CSV
    pub dataset_path: PathBuf,
    pub training_timeout_secs: u64,
    pub reload_backoff_secs: u64,
    pub seed: u64,
    pub test_fraction: f64,
    pub cv_folds: usize,
    pub standardize: bool,
    pub serve_model: ModelKind,
    /// Lowest cost a model prediction may return
    pub min_cost: f64,
    pub cost_decimals: i32,
}

impl Default for CliConfig {
    fn default() -> Self {
        let predictor = PredictorConfig::default();
        let trainer = predictor.trainer;
        let output = predictor.output;
        Self {
            artifact_path: predictor.artifact_path,
            dataset_path: predictor.dataset_path,
            training_timeout_secs: predictor.training_timeout.as_secs(),
            reload_backoff_secs: predictor.reload_backoff.as_secs(),
            seed: trainer.seed,
            test_fraction: trainer.test_fraction,
            cv_folds: trainer.cv_folds,
            standardize: trainer.standardize,
            serve_model: trainer.serve_model,
            min_cost: output.min_cost,
            cost_decimals: output.decimals,
        }
    }
}

impl CliConfig {
    /// Load configuration from the given file (or the default location)
    /// and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };
        Self::load_from(
            &path,
            config::Environment::with_prefix("MEDCOST").try_parsing(true),
        )
    }

    fn load_from(path: &Path, env: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("medcost").join("config.toml"))
    }

    pub fn apply_train_overrides(&mut self, args: &TrainArgs) {
        if let Some(dataset) = &args.dataset {
            self.dataset_path = dataset.clone();
        }
        if let Some(artifact) = &args.artifact {
            self.artifact_path = artifact.clone();
        }
        if args.no_standardize {
            self.standardize = false;
        }
        if let Some(seed) = args.seed {
            self.seed = seed;
        }
        if let Some(fraction) = args.test_fraction {
            self.test_fraction = fraction;
        }
        if let Some(folds) = args.folds {
            self.cv_folds = folds;
        }
        if let Some(kind) = args.serve_model {
            self.serve_model = kind;
        }
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            test_fraction: self.test_fraction,
            seed: self.seed,
            cv_folds: self.cv_folds,
            standardize: self.standardize,
            serve_model: self.serve_model,
            ..Default::default()
        }
    }

    pub fn predictor_config(&self) -> PredictorConfig {
        PredictorConfig {
            artifact_path: self.artifact_path.clone(),
            dataset_path: self.dataset_path.clone(),
            training_timeout: Duration::from_secs(self.training_timeout_secs),
            reload_backoff: Duration::from_secs(self.reload_backoff_secs),
            trainer: self.trainer_config(),
            output: OutputConfig {
                min_cost: self.min_cost,
                decimals: self.cost_decimals,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env() -> config::Environment {
        config::Environment::with_prefix("MEDCOST").source(Some(HashMap::new()))
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig::load_from(&dir.path().join("absent.toml"), no_env()).unwrap();
        assert_eq!(config.artifact_path, PathBuf::from("models/insurance_model.json"));
        assert_eq!(config.seed, 42);
        assert_eq!(config.cv_folds, 10);
        assert!(config.standardize);
        assert_eq!(config.serve_model, ModelKind::LinearRegression);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "artifact_path = \"/tmp/model.json\"\nseed = 7\nserve_model = \"ridge\"\n",
        )
        .unwrap();

        let config = CliConfig::load_from(&path, no_env()).unwrap();
        assert_eq!(config.artifact_path, PathBuf::from("/tmp/model.json"));
        assert_eq!(config.seed, 7);
        assert_eq!(config.serve_model, ModelKind::Ridge);
        assert_eq!(config.test_fraction, 0.2);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "cv_folds = 5\n").unwrap();

        let env = config::Environment::with_prefix("MEDCOST")
            .try_parsing(true)
            .source(Some(HashMap::from([(
                "MEDCOST_CV_FOLDS".to_string(),
                "3".to_string(),
            )])));
        let config = CliConfig::load_from(&path, env).unwrap();
        assert_eq!(config.cv_folds, 3);
    }

    #[test]
    fn test_predictor_config_mapping() {
        let config = CliConfig {
            training_timeout_secs: 12,
            standardize: false,
            ..Default::default()
        };
        let predictor = config.predictor_config();
        assert_eq!(predictor.training_timeout, Duration::from_secs(12));
        assert!(!predictor.trainer.standardize);
        assert_eq!(predictor.trainer.candidates, ModelKind::ALL.to_vec());
        assert_eq!(predictor.output.min_cost, 0.0);
        assert_eq!(predictor.output.decimals, 2);
    }

    #[test]
    fn test_output_settings_reach_predictor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "min_cost = 250.0\ncost_decimals = 0\n").unwrap();

        let predictor = CliConfig::load_from(&path, no_env()).unwrap().predictor_config();
        assert_eq!(predictor.output.min_cost, 250.0);
        assert_eq!(predictor.output.decimals, 0);
    }
}
