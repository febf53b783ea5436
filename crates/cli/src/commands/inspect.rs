//! Artifact inspection and predictor status

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::config::CliConfig;
use crate::output::{color_r2, color_status, format_cost, print_json, print_table, OutputFormat};
use medcost_lib::{CostPredictor, HealthReport, ModelArtifact, PredictorStats, FEATURE_NAMES};

/// Row for the coefficient table
#[derive(Tabled)]
struct CoefficientRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Coefficient")]
    coefficient: String,
    #[tabled(rename = "Scaling")]
    scaling: String,
}

/// Row for the component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct StatusSummary {
    health: HealthReport,
    stats: PredictorStats,
}

/// Show metadata of the configured artifact
pub fn inspect(config: &CliConfig, format: OutputFormat) -> Result<()> {
    let artifact = ModelArtifact::load(&config.artifact_path)
        .with_context(|| format!("Cannot inspect {}", config.artifact_path.display()))?;

    if format == OutputFormat::Json {
        return print_json(&artifact);
    }

    println!("{}", "Model Artifact".bold());
    println!("{}", "=".repeat(60));
    println!("Path:          {}", config.artifact_path.display());
    println!("Version:       {}", artifact.version.cyan());
    println!("Model:         {}", artifact.model.kind);
    println!("Schema:        v{}", artifact.schema_version);
    println!(
        "Trained at:    {}",
        artifact.trained_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Dataset rows:  {}", artifact.dataset_rows);
    println!("Checksum:      {}", artifact.checksum);
    println!("Intercept:     {:.4}", artifact.model.intercept);
    println!();

    let rows: Vec<CoefficientRow> = FEATURE_NAMES
        .iter()
        .enumerate()
        .zip(&artifact.model.coefficients)
        .map(|((column, name), coefficient)| {
            let scaling = artifact
                .scaler
                .as_ref()
                .and_then(|s| {
                    s.columns
                        .iter()
                        .position(|c| *c == column)
                        .map(|i| format!("mean {:.3}, std {:.3}", s.mean[i], s.std[i]))
                })
                .unwrap_or_else(|| "-".to_string());
            CoefficientRow {
                feature: name.to_string(),
                coefficient: format!("{:.4}", coefficient),
                scaling,
            }
        })
        .collect();
    print_table(&rows);

    if let Some(metrics) = &artifact.metrics {
        println!();
        println!("{}", "Evaluation".bold());
        println!("{}", "-".repeat(60));
        println!("RMSE:          {}", format_cost(metrics.rmse));
        println!("R² train:      {}", color_r2(metrics.r2_train));
        println!("R² test:       {}", color_r2(metrics.r2_test));
        println!("CV mean R²:    {}", color_r2(metrics.cv_mean));
    }

    Ok(())
}

/// Show predictor health after attempting a load
pub fn status(config: &CliConfig, format: OutputFormat) -> Result<()> {
    let predictor = CostPredictor::new(config.predictor_config());
    // failures are reflected in the health report
    let _ = predictor.ensure_loaded();

    let summary = StatusSummary {
        health: predictor.health(),
        stats: predictor.stats(),
    };

    if format == OutputFormat::Json {
        print_json(&summary)?;
        return ensure_operational(&summary.health);
    }

    println!("{}", "Predictor Status".bold());
    println!("{}", "=".repeat(60));
    println!("Overall:       {}", color_status(summary.health.status.as_str()));
    println!(
        "Model:         {}",
        summary
            .stats
            .model_version
            .as_deref()
            .unwrap_or("none (fallback)")
    );
    println!();

    let rows: Vec<ComponentRow> = summary
        .health
        .components
        .iter()
        .map(|(name, health)| ComponentRow {
            component: name.clone(),
            status: color_status(health.status.as_str()),
            message: health.message.clone().unwrap_or_default(),
        })
        .collect();
    print_table(&rows);

    ensure_operational(&summary.health)
}

/// Non-zero exit when a component needs operator attention
fn ensure_operational(health: &HealthReport) -> Result<()> {
    if !health.status.is_operational() {
        bail!("Predictor is {}; see the component messages above", health.status.as_str());
    }
    Ok(())
}
