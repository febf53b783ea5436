//! Candidate regression models compared during training

use crate::artifact::LinearModel;
use crate::error::{CostError, Result};
use crate::features::FEATURE_NAMES;
use gbdt::config::{Config, Loss};
use gbdt::decision_tree::{Data, DataVec, DecisionTree, TrainingCache};
use gbdt::gradient_boost::GBDT;
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_elasticnet::ElasticNet;
use linfa_linear::LinearRegression;
use linfa_svm::Svm;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regression model families the trainer knows how to fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LinearRegression,
    Ridge,
    GradientBoosting,
    Svr,
    RandomForest,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::LinearRegression,
        ModelKind::Ridge,
        ModelKind::GradientBoosting,
        ModelKind::Svr,
        ModelKind::RandomForest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "linear_regression",
            ModelKind::Ridge => "ridge",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::Svr => "svr",
            ModelKind::RandomForest => "random_forest",
        }
    }

    /// Whether a fitted model of this kind can be written to an artifact
    pub fn is_persistable(&self) -> bool {
        matches!(self, ModelKind::LinearRegression | ModelKind::Ridge)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "linear_regression" | "linear" | "ols" => Ok(ModelKind::LinearRegression),
            "ridge" => Ok(ModelKind::Ridge),
            "gradient_boosting" | "gbdt" => Ok(ModelKind::GradientBoosting),
            "svr" | "svm" => Ok(ModelKind::Svr),
            "random_forest" | "forest" | "rf" => Ok(ModelKind::RandomForest),
            _ => Err(format!("Unknown model type: {}", s)),
        }
    }
}

/// Hyper-parameters for the candidate models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressorParams {
    /// L2 penalty in linfa-elasticnet scaling (objective divided by `2n`)
    pub ridge_penalty: f64,
    pub gbdt_max_depth: u32,
    pub gbdt_iterations: usize,
    pub gbdt_shrinkage: f32,
    /// Box constraint of the epsilon-SVR
    pub svr_c: f64,
    /// RBF width, as in `exp(-gamma * |x - x'|²)`
    pub svr_gamma: f64,
    /// Half-width of the insensitive tube around the targets
    pub svr_epsilon: f64,
    pub forest_trees: usize,
    pub forest_max_depth: u32,
    pub forest_min_leaf: usize,
    /// Fraction of rows drawn for each tree
    pub forest_sample_ratio: f64,
    /// Below 1.0 the per-split feature draw is not seeded
    pub forest_feature_ratio: f64,
    pub forest_seed: u64,
}

impl Default for RegressorParams {
    fn default() -> Self {
        Self {
            ridge_penalty: 0.02,
            gbdt_max_depth: 4,
            gbdt_iterations: 100,
            gbdt_shrinkage: 0.1,
            svr_c: 10.0,
            svr_gamma: 0.1,
            svr_epsilon: 0.1,
            forest_trees: 100,
            forest_max_depth: 50,
            forest_min_leaf: 12,
            forest_sample_ratio: 0.8,
            forest_feature_ratio: 1.0,
            forest_seed: 42,
        }
    }
}

/// A regression model that can be fit and queried on encoded features
pub trait Regressor {
    fn kind(&self) -> ModelKind;

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Fitted parameters in persistable form, for linear families
    fn linear_model(&self) -> Option<LinearModel> {
        None
    }
}

/// Build a boxed regressor for `kind`.
pub fn build_regressor(kind: ModelKind, params: &RegressorParams) -> Box<dyn Regressor> {
    match kind {
        ModelKind::LinearRegression => Box::new(LinearFamily::ordinary()),
        ModelKind::Ridge => Box::new(LinearFamily::ridge(params.ridge_penalty)),
        ModelKind::GradientBoosting => Box::new(GradientBoostingRegressor::new(params)),
        ModelKind::Svr => Box::new(SupportVectorRegressor::new(params)),
        ModelKind::RandomForest => Box::new(RandomForestRegressor::new(params)),
    }
}

/// Ordinary least squares has no unique solution when a column never varies
fn check_varying_columns(x: &Array2<f64>) -> Result<()> {
    for (j, column) in x.columns().into_iter().enumerate() {
        let first = column[0];
        if column.iter().all(|v| *v == first) {
            let name = FEATURE_NAMES
                .get(j)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("column {j}"));
            return Err(CostError::TrainingFailed(format!(
                "feature {name} is constant ({first}) in the training rows, so the least-squares system is singular"
            )));
        }
    }
    Ok(())
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(CostError::TrainingFailed(format!(
            "{} feature rows but {} targets",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() <= x.ncols() + 1 {
        return Err(CostError::TrainingFailed(format!(
            "{} rows are too few to fit {} features",
            x.nrows(),
            x.ncols()
        )));
    }
    Ok(())
}

/// Ordinary least squares or ridge; both reduce to `intercept + w·x`
struct LinearFamily {
    kind: ModelKind,
    ridge_penalty: f64,
    fitted: Option<LinearModel>,
}

impl LinearFamily {
    fn ordinary() -> Self {
        Self {
            kind: ModelKind::LinearRegression,
            ridge_penalty: 0.0,
            fitted: None,
        }
    }

    fn ridge(penalty: f64) -> Self {
        Self {
            kind: ModelKind::Ridge,
            ridge_penalty: penalty,
            fitted: None,
        }
    }
}

impl Regressor for LinearFamily {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let dataset = Dataset::new(x.to_owned(), y.to_owned());

        let (intercept, coefficients) = match self.kind {
            ModelKind::Ridge => {
                let fitted = ElasticNet::<f64>::params()
                    .penalty(self.ridge_penalty)
                    .l1_ratio(0.0)
                    .fit(&dataset)
                    .map_err(|e| CostError::TrainingFailed(e.to_string()))?;
                (fitted.intercept(), fitted.hyperplane().to_vec())
            }
            _ => {
                check_varying_columns(x)?;
                let fitted = LinearRegression::new().fit(&dataset).map_err(|e| {
                    CostError::TrainingFailed(format!("{e}; features may be collinear in this sample"))
                })?;
                (fitted.intercept(), fitted.params().to_vec())
            }
        };

        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(CostError::TrainingFailed(format!(
                "{} produced non-finite coefficients",
                self.kind
            )));
        }

        self.fitted = Some(LinearModel {
            kind: self.kind,
            intercept,
            coefficients,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let model = self.fitted.as_ref().ok_or_else(|| {
            CostError::PredictionUnavailable(format!("{} is not fitted", self.kind))
        })?;
        let w = Array1::from(model.coefficients.clone());
        Ok(x.dot(&w) + model.intercept)
    }

    fn linear_model(&self) -> Option<LinearModel> {
        self.fitted.clone()
    }
}

/// Gradient-boosted regression trees (squared error loss)
struct GradientBoostingRegressor {
    params: RegressorParams,
    model: Option<GBDT>,
}

impl GradientBoostingRegressor {
    fn new(params: &RegressorParams) -> Self {
        Self {
            params: params.clone(),
            model: None,
        }
    }

    fn config(&self, feature_size: usize) -> Config {
        let mut config = Config::new();
        config.set_feature_size(feature_size);
        config.set_max_depth(self.params.gbdt_max_depth);
        config.set_iterations(self.params.gbdt_iterations);
        config.set_shrinkage(self.params.gbdt_shrinkage);
        config.set_loss("SquaredError");
        config.set_debug(false);
        config
    }

}

/// Rows as gbdt samples; unlabeled rows get a zero label
fn to_data(x: &Array2<f64>, y: Option<&Array1<f64>>) -> DataVec {
    x.rows()
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
            let label = y.map(|y| y[i] as f32).unwrap_or(0.0);
            Data::new_training_data(features, 1.0, label, None)
        })
        .collect()
}

impl Regressor for GradientBoostingRegressor {
    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoosting
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let config = self.config(x.ncols());

        let mut train = to_data(x, Some(y));
        let mut gbdt = GBDT::new(&config);
        gbdt.fit(&mut train);
        self.model = Some(gbdt);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let model = self.model.as_ref().ok_or_else(|| {
            CostError::PredictionUnavailable("gradient_boosting is not fitted".into())
        })?;
        let test = to_data(x, None);
        Ok(model.predict(&test).into_iter().map(f64::from).collect())
    }
}

/// Epsilon-SVR with an RBF kernel
struct SupportVectorRegressor {
    params: RegressorParams,
    model: Option<Svm<f64, f64>>,
}

impl SupportVectorRegressor {
    fn new(params: &RegressorParams) -> Self {
        Self {
            params: params.clone(),
            model: None,
        }
    }
}

impl Regressor for SupportVectorRegressor {
    fn kind(&self) -> ModelKind {
        ModelKind::Svr
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        if self.params.svr_gamma <= 0.0 {
            return Err(CostError::TrainingFailed(format!(
                "svr gamma must be positive, got {}",
                self.params.svr_gamma
            )));
        }
        let dataset = Dataset::new(x.to_owned(), y.to_owned());

        // linfa's gaussian kernel is exp(-|x - x'|² / eps)
        let fitted = Svm::<f64, f64>::params()
            .c_svr(self.params.svr_c, Some(self.params.svr_epsilon))
            .gaussian_kernel(1.0 / self.params.svr_gamma)
            .fit(&dataset)
            .map_err(|e| CostError::TrainingFailed(e.to_string()))?;
        self.model = Some(fitted);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| CostError::PredictionUnavailable("svr is not fitted".into()))?;
        Ok(model.predict(x))
    }
}

/// Averaged regression trees, each fit on a seeded row subsample
struct RandomForestRegressor {
    params: RegressorParams,
    trees: Vec<DecisionTree>,
}

impl RandomForestRegressor {
    fn new(params: &RegressorParams) -> Self {
        Self {
            params: params.clone(),
            trees: Vec::new(),
        }
    }

    fn tree(&self, feature_size: usize) -> DecisionTree {
        let mut tree = DecisionTree::new();
        tree.set_feature_size(feature_size);
        tree.set_max_depth(self.params.forest_max_depth);
        tree.set_min_leaf_size(self.params.forest_min_leaf);
        tree.set_loss(Loss::SquaredError);
        tree.set_feature_sample_ratio(self.params.forest_feature_ratio);
        tree
    }
}

impl Regressor for RandomForestRegressor {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        if self.params.forest_trees == 0 {
            return Err(CostError::TrainingFailed("random forest needs at least one tree".into()));
        }
        let ratio = self.params.forest_sample_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(CostError::TrainingFailed(format!(
                "forest sample ratio {ratio} must be within (0, 1]"
            )));
        }

        let n = x.nrows();
        let per_tree = ((n as f64 * ratio).round() as usize).clamp(1, n);
        let train = to_data(x, Some(y));
        let mut cache = TrainingCache::get_cache(x.ncols(), &train, 2);
        let mut rng = StdRng::seed_from_u64(self.params.forest_seed);

        let mut trees = Vec::with_capacity(self.params.forest_trees);
        for _ in 0..self.params.forest_trees {
            let mut subset = sample(&mut rng, n, per_tree).into_vec();
            subset.sort_unstable();
            let mut tree = self.tree(x.ncols());
            tree.fit_n(&train, &subset, &mut cache);
            trees.push(tree);
        }
        self.trees = trees;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(CostError::PredictionUnavailable("random_forest is not fitted".into()));
        }
        let test = to_data(x, None);
        let mut sum = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            let pred: Array1<f64> = tree.predict(&test).into_iter().map(f64::from).collect();
            sum += &pred;
        }
        Ok(sum / self.trees.len() as f64)
    }
}
