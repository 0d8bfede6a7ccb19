//! Probability densities over selection coefficients.

pub mod families;

pub use families::{DensityFamily, NEUTRAL_THRESHOLD, gamma_pdf, lognormal_pdf};

use crate::domain::DfeError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DensityError {
    #[error("unknown density family '{name}'")]
    UnknownFamily { name: String },
    #[error("density '{family}' expects {expected} parameters, got {actual}")]
    ParameterCount {
        family: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("density '{family}' parameter '{name}' is out of range: {value}")]
    InvalidParameter {
        family: &'static str,
        name: &'static str,
        value: f64,
    },
}

impl From<DensityError> for DfeError {
    fn from(error: DensityError) -> Self {
        DfeError::input_validation("INPUT.DENSITY", error.to_string())
    }
}

/// Weight assigned to a selection coefficient by a DFE with the given
/// parameters. Implementations must be pure.
pub trait Density {
    fn evaluate(&self, x: f64, params: &[f64]) -> f64;

    fn evaluate_many(&self, xs: &[f64], params: &[f64]) -> Vec<f64> {
        xs.iter().map(|x| self.evaluate(*x, params)).collect()
    }

    /// Checks `params` before any evaluation. Plain closures accept anything.
    fn validate(&self, _params: &[f64]) -> Result<(), DensityError> {
        Ok(())
    }
}

impl<F> Density for F
where
    F: Fn(f64, &[f64]) -> f64,
{
    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        self(x, params)
    }
}

#[cfg(test)]
mod tests {
    use super::Density;

    #[test]
    fn closures_are_densities() {
        let uniform = |x: f64, params: &[f64]| {
            if (0.0..params[0]).contains(&x) {
                1.0 / params[0]
            } else {
                0.0
            }
        };
        assert_eq!(uniform.evaluate(0.5, &[2.0]), 0.5);
        assert_eq!(uniform.evaluate_many(&[-1.0, 1.0, 3.0], &[2.0]), vec![0.0, 0.5, 0.0]);
        assert_eq!(uniform.validate(&[]), Ok(()));
    }
}
