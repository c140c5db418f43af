//! Priors map a unit-interval value onto a physical parameter value.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Prior {
    /// Linear mapping of [0, 1] onto [lower, upper]
    Uniform { lower: f64, upper: f64 },
    /// Logarithmic mapping of [0, 1] onto [lower, upper], both bounds positive
    LogUniform { lower: f64, upper: f64 },
}

impl Prior {
    pub fn uniform(lower: f64, upper: f64) -> Self {
        Prior::Uniform { lower, upper }
    }

    pub fn log_uniform(lower: f64, upper: f64) -> Self {
        Prior::LogUniform { lower, upper }
    }

    /// Physical value for a unit-interval value
    #[must_use]
    pub fn value_for(&self, unit: f64) -> f64 {
        match *self {
            Prior::Uniform { lower, upper } => lower + unit * (upper - lower),
            Prior::LogUniform { lower, upper } => {
                let (log_lower, log_upper) = (lower.log10(), upper.log10());
                10f64.powf(log_lower + unit * (log_upper - log_lower))
            }
        }
    }

    pub fn lower(&self) -> f64 {
        match *self {
            Prior::Uniform { lower, .. } | Prior::LogUniform { lower, .. } => lower,
        }
    }

    pub fn upper(&self) -> f64 {
        match *self {
            Prior::Uniform { upper, .. } | Prior::LogUniform { upper, .. } => upper,
        }
    }

    /// Check the bounds are usable; `path` is only used in the error
    pub fn validate(&self, path: &str) -> Result<(), ModelError> {
        let (lower, upper) = (self.lower(), self.upper());
        let invalid = |reason| ModelError::InvalidPrior {
            path: path.to_string(),
            reason,
        };

        if !lower.is_finite() || !upper.is_finite() {
            return Err(invalid("bounds must be finite"));
        }
        if lower >= upper {
            return Err(invalid("lower bound must be below upper bound"));
        }
        if matches!(self, Prior::LogUniform { .. }) && lower <= 0.0 {
            return Err(invalid("log-uniform bounds must be positive"));
        }
        Ok(())
    }
}
