//! Post-processing of raw model outputs
//!
//! Converts the model's raw value into the figure handed to callers:
//! rounded to cents and never below the configured floor.

/// Lowest cost ever returned
pub const MIN_COST: f64 = 0.0;

/// Decimal places kept in returned costs
pub const COST_DECIMALS: i32 = 2;

/// Configuration for output formatting
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub min_cost: f64,
    pub decimals: i32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            min_cost: MIN_COST,
            decimals: COST_DECIMALS,
        }
    }
}

/// Formats raw model outputs into returned costs
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    config: OutputConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn format(&self, raw: f64) -> f64 {
        round_to(raw.max(self.config.min_cost), self.config.decimals)
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_to_cents() {
        let formatter = OutputFormatter::new();
        assert_eq!(formatter.format(25096.004), 25096.0);
        assert_eq!(formatter.format(1234.5678), 1234.57);
        assert_eq!(formatter.format(99.125), 99.13);
    }

    #[test]
    fn test_negative_floored() {
        let formatter = OutputFormatter::new();
        assert_eq!(formatter.format(-412.7), 0.0);
    }

    #[test]
    fn test_custom_config() {
        let formatter = OutputFormatter::with_config(OutputConfig {
            min_cost: 100.0,
            decimals: 0,
        });
        assert_eq!(formatter.format(50.0), 100.0);
        assert_eq!(formatter.format(1234.56), 1235.0);
    }
}
