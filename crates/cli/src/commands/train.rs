//! Training and evaluation commands

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::config::CliConfig;
use crate::output::{
    color_r2, format_cost, print_info, print_json, print_success, print_table, print_warning,
    OutputFormat,
};
use medcost_lib::{CostPredictor, ModelTrainer, SaveStatus, TrainingReport};

/// Row for the candidate comparison table
#[derive(Tabled)]
struct CandidateRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "RMSE")]
    rmse: String,
    #[tabled(rename = "R² train")]
    r2_train: String,
    #[tabled(rename = "R² test")]
    r2_test: String,
    #[tabled(rename = "CV mean")]
    cv_mean: String,
}

#[derive(Serialize)]
struct TrainSummary<'a> {
    version: &'a str,
    artifact_path: String,
    saved: bool,
    report: &'a TrainingReport,
}

/// Train all candidates and persist the served model.
///
/// Fails when the artifact could not be written, even though the model
/// itself trained.
pub fn train(config: &CliConfig, format: OutputFormat) -> Result<()> {
    let predictor = CostPredictor::new(config.predictor_config());
    let outcome = predictor
        .retrain()
        .with_context(|| format!("Training from {} failed", config.dataset_path.display()))?;

    match format {
        OutputFormat::Json => print_json(&TrainSummary {
            version: &outcome.artifact.version,
            artifact_path: config.artifact_path.display().to_string(),
            saved: outcome.save.is_saved(),
            report: &outcome.report,
        })?,
        OutputFormat::Table => print_report(&outcome.report),
    }

    match &outcome.save {
        SaveStatus::Saved(path) => {
            if format == OutputFormat::Table {
                print_success(&format!(
                    "Saved {} to {}",
                    outcome.artifact.version.cyan(),
                    path.display()
                ));
            }
            Ok(())
        }
        SaveStatus::Failed { path, reason } => bail!(
            "Model {} trained but could not be written to {}: {}",
            outcome.artifact.version,
            path.display(),
            reason
        ),
        SaveStatus::NotSaved => bail!("Model {} trained but was not persisted", outcome.artifact.version),
    }
}

/// Compare candidates on the dataset without writing anything
pub fn evaluate(config: &CliConfig, format: OutputFormat) -> Result<()> {
    let outcome = ModelTrainer::new(config.trainer_config())
        .train_from_path(&config.dataset_path)
        .with_context(|| format!("Evaluation of {} failed", config.dataset_path.display()))?;

    match format {
        OutputFormat::Json => print_json(&outcome.report)?,
        OutputFormat::Table => {
            print_report(&outcome.report);
            print_info("Nothing was written; run `medcost train` to persist a model");
        }
    }
    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!("{}", "Model Comparison".bold());
    println!("{}", "=".repeat(60));
    println!(
        "Rows:          {} train / {} test",
        report.train_rows, report.test_rows
    );
    println!(
        "Standardized:  {}",
        if report.standardized { "age, bmi" } else { "no" }
    );
    println!();

    let rows: Vec<CandidateRow> = report
        .candidates
        .iter()
        .map(|m| CandidateRow {
            model: if m.model == report.selected {
                format!("{} *", m.model)
            } else {
                m.model.to_string()
            },
            rmse: format_cost(m.rmse),
            r2_train: color_r2(m.r2_train),
            r2_test: color_r2(m.r2_test),
            cv_mean: color_r2(m.cv_mean),
        })
        .collect();
    print_table(&rows);

    for (kind, reason) in &report.failures {
        print_warning(&format!("{} failed: {}", kind, reason));
    }

    if let Some(best) = report.best_by_cv() {
        if best.model != report.selected {
            print_info(&format!(
                "{} scored best in cross-validation; {} is served (*)",
                best.model, report.selected
            ));
        }
    }
}
