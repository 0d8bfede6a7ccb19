//! Density mass outside the cached gamma range, attributed to the neutral
//! spectrum or to the most deleterious cached spectrum.

use super::IntegrationError;
use crate::density::Density;
use crate::numerics::{QuadratureOptions, integrate_adaptive};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExteriorTail {
    /// Between zero and the least deleterious cached gamma (both sides of
    /// zero for the continuous-positive variant).
    Neutral,
    /// Beyond the most deleterious cached gamma.
    Deleterious,
}

impl ExteriorTail {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Deleterious => "deleterious",
        }
    }
}

impl std::fmt::Display for ExteriorTail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExteriorMass {
    pub neutral: f64,
    pub deleterious: f64,
}

/// Quadrature that stopped before meeting its tolerance. The integration
/// result still uses the best available estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadratureWarning {
    pub tail: ExteriorTail,
    pub value: f64,
    pub abs_error: f64,
    pub subdivisions: usize,
}

pub(super) struct TailQuadrature<'a, D: ?Sized> {
    pub density: &'a D,
    pub params: &'a [f64],
    pub options: QuadratureOptions,
}

impl<D> TailQuadrature<'_, D>
where
    D: Density + ?Sized,
{
    pub fn mass(
        &self,
        tail: ExteriorTail,
        lower: f64,
        upper: f64,
        breakpoints: &[f64],
        warnings: &mut Vec<QuadratureWarning>,
    ) -> Result<f64, IntegrationError> {
        let estimate = integrate_adaptive(
            |x| self.density.evaluate(x, self.params),
            lower,
            upper,
            breakpoints,
            self.options,
        )
        .map_err(|source| IntegrationError::Quadrature { tail, source })?;

        if !estimate.converged {
            warn!(
                tail = tail.as_str(),
                lower,
                upper,
                value = estimate.value,
                abs_error = estimate.abs_error,
                "exterior mass quadrature did not converge"
            );
            warnings.push(QuadratureWarning {
                tail,
                value: estimate.value,
                abs_error: estimate.abs_error,
                subdivisions: estimate.subdivisions,
            });
        }
        Ok(estimate.value)
    }
}
