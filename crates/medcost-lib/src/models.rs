//! Core data models for the cost estimator

use crate::error::CostError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Youngest accepted age
pub const MIN_AGE: u32 = 0;
/// Oldest accepted age
pub const MAX_AGE: u32 = 120;
/// Lowest accepted body-mass index
pub const MIN_BMI: f64 = 10.0;
/// Highest accepted body-mass index
pub const MAX_BMI: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

impl FromStr for Sex {
    type Err = CostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Sex::Male),
            "female" => Ok(Sex::Female),
            _ => Err(CostError::encoding("sex", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Smoker {
    No,
    Yes,
}

impl Smoker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Smoker::No => "no",
            Smoker::Yes => "yes",
        }
    }

    pub fn is_smoker(&self) -> bool {
        matches!(self, Smoker::Yes)
    }
}

impl FromStr for Smoker {
    type Err = CostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no" => Ok(Smoker::No),
            "yes" => Ok(Smoker::Yes),
            _ => Err(CostError::encoding("smoker", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

impl Region {
    pub const ALL: [Region; 4] = [
        Region::Northeast,
        Region::Northwest,
        Region::Southeast,
        Region::Southwest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Northeast => "northeast",
            Region::Northwest => "northwest",
            Region::Southeast => "southeast",
            Region::Southwest => "southwest",
        }
    }
}

impl FromStr for Region {
    type Err = CostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "northeast" => Ok(Region::Northeast),
            "northwest" => Ok(Region::Northwest),
            "southeast" => Ok(Region::Southeast),
            "southwest" => Ok(Region::Southwest),
            _ => Err(CostError::encoding("region", s)),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Sex, Smoker, Region);

/// Range violations caught before input reaches the estimator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("age {0} outside 0..=120")]
    AgeOutOfRange(u32),
    #[error("bmi {0} outside 10..=50")]
    BmiOutOfRange(f64),
}

/// The six attributes describing a person for cost estimation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    pub age: u32,
    pub sex: Sex,
    pub bmi: f64,
    pub children: u32,
    pub smoker: Smoker,
    pub region: Region,
}

impl RawInput {
    /// Build from the scalar shape used by the calling application
    pub fn from_raw(
        age: u32,
        sex: &str,
        bmi: f64,
        children: u32,
        smoker: &str,
        region: &str,
    ) -> Result<Self, CostError> {
        Ok(Self {
            age,
            sex: sex.parse()?,
            bmi,
            children,
            smoker: smoker.parse()?,
            region: region.parse()?,
        })
    }

    /// Range checks the calling application applies before prediction
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(ValidationError::AgeOutOfRange(self.age));
        }
        if !self.bmi.is_finite() || !(MIN_BMI..=MAX_BMI).contains(&self.bmi) {
            return Err(ValidationError::BmiOutOfRange(self.bmi));
        }
        Ok(())
    }
}

/// Encoded model input in fixed order:
/// `[age, sex, bmi, children, smoker, region]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; 6]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn age(&self) -> f64 {
        self.0[0]
    }

    pub fn sex(&self) -> f64 {
        self.0[1]
    }

    pub fn bmi(&self) -> f64 {
        self.0[2]
    }

    pub fn children(&self) -> f64 {
        self.0[3]
    }

    pub fn smoker(&self) -> f64 {
        self.0[4]
    }

    pub fn region(&self) -> f64 {
        self.0[5]
    }
}

/// One training row: attributes plus the observed charges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub input: RawInput,
    pub charges: f64,
}

/// Where a predicted cost came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PredictionSource {
    Model { version: String },
    Fallback,
}

impl PredictionSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, PredictionSource::Fallback)
    }
}

/// A predicted cost plus its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub cost: f64,
    #[serde(flatten)]
    pub source: PredictionSource,
}

/// What the calling application stores per prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub inputs: RawInput,
    pub predicted_cost: f64,
    #[serde(flatten)]
    pub source: PredictionSource,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl PredictionRecord {
    pub fn new(inputs: RawInput, prediction: Prediction) -> Self {
        Self {
            inputs,
            predicted_cost: prediction.cost,
            source: prediction.source,
            timestamp: chrono::Utc::now(),
        }
    }
}
