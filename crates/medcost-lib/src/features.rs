//! Feature encoding shared by training and inference
//!
//! Maps the six raw attributes to a fixed-order numeric vector. The
//! category codes below are baked into every trained artifact, so the
//! trainer and the predictor must both go through [`FeatureEncoder`].

use crate::models::{FeatureVector, RawInput, Region, Sex, Smoker};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Number of model input features
pub const NUM_FEATURES: usize = 6;

/// Column order of the encoded feature vector
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = ["age", "sex", "bmi", "children", "smoker", "region"];

/// Column index of age in the feature vector
pub const AGE_COLUMN: usize = 0;
/// Column index of bmi in the feature vector
pub const BMI_COLUMN: usize = 2;

pub fn sex_code(sex: Sex) -> u8 {
    match sex {
        Sex::Male => 0,
        Sex::Female => 1,
    }
}

pub fn smoker_code(smoker: Smoker) -> u8 {
    match smoker {
        Smoker::No => 0,
        Smoker::Yes => 1,
    }
}

pub fn region_code(region: Region) -> u8 {
    match region {
        Region::Northwest => 0,
        Region::Northeast => 1,
        Region::Southeast => 2,
        Region::Southwest => 3,
    }
}

/// Category tables recorded in an artifact, indexed by code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingScheme {
    pub sex: Vec<String>,
    pub smoker: Vec<String>,
    pub region: Vec<String>,
}

impl EncodingScheme {
    /// The scheme this build encodes with
    pub fn canonical() -> Self {
        let mut sex = [Sex::Male, Sex::Female];
        sex.sort_by_key(|s| sex_code(*s));
        let mut smoker = [Smoker::No, Smoker::Yes];
        smoker.sort_by_key(|s| smoker_code(*s));
        let mut region = Region::ALL;
        region.sort_by_key(|r| region_code(*r));

        Self {
            sex: sex.iter().map(|s| s.as_str().to_string()).collect(),
            smoker: smoker.iter().map(|s| s.as_str().to_string()).collect(),
            region: region.iter().map(|r| r.as_str().to_string()).collect(),
        }
    }

    pub fn is_canonical(&self) -> bool {
        *self == Self::canonical()
    }
}

impl Default for EncodingScheme {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Encodes raw attributes into model features
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, raw: &RawInput) -> FeatureVector {
        FeatureVector([
            raw.age as f64,
            sex_code(raw.sex) as f64,
            raw.bmi,
            raw.children as f64,
            smoker_code(raw.smoker) as f64,
            region_code(raw.region) as f64,
        ])
    }

    /// Encode many rows into an `(n, NUM_FEATURES)` matrix
    pub fn encode_batch<'a, I>(&self, rows: I) -> Array2<f64>
    where
        I: IntoIterator<Item = &'a RawInput>,
    {
        let data: Vec<f64> = rows
            .into_iter()
            .flat_map(|raw| self.encode(raw).0)
            .collect();
        let nrows = data.len() / NUM_FEATURES;
        Array2::from_shape_vec((nrows, NUM_FEATURES), data)
            .unwrap_or_else(|_| Array2::zeros((0, NUM_FEATURES)))
    }

    pub fn scheme(&self) -> EncodingScheme {
        EncodingScheme::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(age: u32, sex: Sex, bmi: f64, children: u32, smoker: Smoker, region: Region) -> RawInput {
        RawInput {
            age,
            sex,
            bmi,
            children,
            smoker,
            region,
        }
    }

    #[test]
    fn test_encode_order_and_codes() {
        let encoder = FeatureEncoder::new();
        let f = encoder.encode(&input(19, Sex::Female, 27.9, 0, Smoker::Yes, Region::Southwest));
        assert_eq!(f.as_slice().len(), NUM_FEATURES);
        assert_eq!(f.0, [19.0, 1.0, 27.9, 0.0, 1.0, 3.0]);
        assert_eq!(f.smoker(), 1.0);
        assert_eq!(f.region(), 3.0);
    }

    #[test]
    fn test_region_table() {
        assert_eq!(region_code(Region::Northwest), 0);
        assert_eq!(region_code(Region::Northeast), 1);
        assert_eq!(region_code(Region::Southeast), 2);
        assert_eq!(region_code(Region::Southwest), 3);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let encoder = FeatureEncoder::new();
        for region in Region::ALL {
            let raw = input(44, Sex::Male, 31.2, 2, Smoker::No, region);
            assert_eq!(encoder.encode(&raw), encoder.encode(&raw));
        }
    }

    #[test]
    fn test_boundaries_encode() {
        let encoder = FeatureEncoder::new();
        for (age, bmi) in [(0, 10.0), (120, 50.0), (0, 50.0), (120, 10.0)] {
            let f = encoder.encode(&input(age, Sex::Male, bmi, 0, Smoker::No, Region::Northeast));
            assert_eq!(f.age(), age as f64);
            assert_eq!(f.bmi(), bmi);
            assert_eq!(f.children(), 0.0);
            assert!(f.as_slice().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_canonical_scheme_matches_codes() {
        let scheme = EncodingScheme::canonical();
        assert_eq!(scheme.sex, vec!["male", "female"]);
        assert_eq!(scheme.smoker, vec!["no", "yes"]);
        assert_eq!(scheme.region, vec!["northwest", "northeast", "southeast", "southwest"]);
        for region in Region::ALL {
            assert_eq!(scheme.region[region_code(region) as usize], region.as_str());
        }
    }

    #[test]
    fn test_encode_batch_shape() {
        let encoder = FeatureEncoder::new();
        let rows = vec![
            input(18, Sex::Male, 33.77, 1, Smoker::No, Region::Southeast),
            input(28, Sex::Male, 33.0, 3, Smoker::No, Region::Southeast),
            input(33, Sex::Male, 22.705, 0, Smoker::No, Region::Northwest),
        ];
        let x = encoder.encode_batch(&rows);
        assert_eq!(x.dim(), (3, NUM_FEATURES));
        assert_eq!(x[[1, 3]], 3.0);
        assert_eq!(x[[2, 5]], 0.0);
    }
}
