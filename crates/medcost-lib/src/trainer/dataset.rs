//! Labeled dataset loading
//!
//! Reads the insurance CSV (`age,sex,bmi,children,smoker,region,charges`).
//! Columns are matched by header name, so order does not matter and extra
//! columns are ignored.

use crate::error::{CostError, Result};
use crate::features::FeatureEncoder;
use crate::models::{LabeledRecord, RawInput};
use ndarray::{Array1, Array2};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

/// Columns the dataset header must provide
pub const REQUIRED_COLUMNS: [&str; 7] =
    ["age", "sex", "bmi", "children", "smoker", "region", "charges"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    age: u32,
    sex: String,
    bmi: f64,
    children: u32,
    smoker: String,
    region: String,
    charges: f64,
}

impl CsvRow {
    fn into_record(self) -> Result<LabeledRecord> {
        let input = RawInput::from_raw(
            self.age,
            &self.sex,
            self.bmi,
            self.children,
            &self.smoker,
            &self.region,
        )?;
        Ok(LabeledRecord {
            input,
            charges: self.charges,
        })
    }
}

/// In-memory labeled rows
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<LabeledRecord>,
    source: PathBuf,
}

impl Dataset {
    pub fn new(records: Vec<LabeledRecord>) -> Self {
        Self {
            records,
            source: PathBuf::from("<memory>"),
        }
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| CostError::data_unavailable(path, e))?;
        let dataset = Self::from_reader(file, path)?;
        info!(
            path = %path.display(),
            rows = dataset.len(),
            "Loaded training dataset"
        );
        Ok(dataset)
    }

    /// Parse CSV from any reader; `source` labels errors
    pub fn from_reader<R: Read>(reader: R, source: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| CostError::data_unavailable(source, e))?
            .clone();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|col| !headers.iter().any(|h| h.eq_ignore_ascii_case(col)))
            .collect();
        if !missing.is_empty() {
            return Err(CostError::data_unavailable(
                source,
                format!("missing columns: {}", missing.join(", ")),
            ));
        }
        let lowered: csv::StringRecord = headers.iter().map(|h| h.to_ascii_lowercase()).collect();
        rdr.set_headers(lowered);

        let mut records = Vec::new();
        for result in rdr.deserialize::<CsvRow>() {
            let record = result
                .map_err(|e| {
                    let line = e.position().map(|p| p.line()).unwrap_or_default();
                    CostError::data_unavailable(source, format!("line {line}: {e}"))
                })
                .and_then(|row| {
                    let line = records.len() + 2;
                    row.into_record().map_err(|e| {
                        CostError::data_unavailable(source, format!("line {line}: {e}"))
                    })
                })?;
            if !record.charges.is_finite() || !record.input.bmi.is_finite() {
                return Err(CostError::data_unavailable(
                    source,
                    format!("line {}: non-finite value", records.len() + 2),
                ));
            }
            records.push(record);
        }

        if records.is_empty() {
            return Err(CostError::data_unavailable(source, "dataset has no rows"));
        }

        Ok(Self {
            records,
            source: source.to_path_buf(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[LabeledRecord] {
        &self.records
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Encoded `(n, 6)` feature matrix
    pub fn features(&self, encoder: &FeatureEncoder) -> Array2<f64> {
        encoder.encode_batch(self.records.iter().map(|r| &r.input))
    }

    pub fn targets(&self) -> Array1<f64> {
        self.records.iter().map(|r| r.charges).collect()
    }
}
