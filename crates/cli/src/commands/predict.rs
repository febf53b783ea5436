//! Single cost estimate

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::CliConfig;
use crate::output::{color_status, format_cost, print_json, print_warning, OutputFormat};
use crate::PredictArgs;
use medcost_lib::{CostPredictor, PredictionSource, RawInput};

/// Estimate the cost for the attributes given on the command line
pub fn predict(config: &CliConfig, args: &PredictArgs, format: OutputFormat) -> Result<()> {
    let input = RawInput::from_raw(
        args.age,
        &args.sex,
        args.bmi,
        args.children,
        &args.smoker,
        &args.region,
    )?;
    input.validate().context("Invalid input")?;

    let predictor = CostPredictor::new(config.predictor_config());
    if let Err(e) = predictor.ensure_loaded() {
        if format == OutputFormat::Table {
            print_warning(&format!("No model available ({e}); using the fallback estimate"));
        }
    }

    let record = predictor.predict_record(&input);

    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Table => {
            println!(
                "{} {}",
                "Estimated cost:".bold(),
                format_cost(record.predicted_cost).green().bold()
            );
            match &record.source {
                PredictionSource::Model { version } => {
                    println!("Source:         {} ({})", color_status("model"), version.cyan())
                }
                PredictionSource::Fallback => {
                    println!("Source:         {}", color_status("fallback"))
                }
            }
        }
    }
    Ok(())
}
