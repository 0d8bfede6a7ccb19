//! Reference DFE families. Parameter order follows the usual dadi
//! conventions, e.g. `[shape, scale]` for the gamma.

use super::{Density, DensityError};
use crate::numerics::ln_gamma;
use std::f64::consts::PI;

/// Magnitudes below this are treated as effectively neutral by the
/// `neugamma` families.
pub const NEUTRAL_THRESHOLD: f64 = 1.0e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DensityFamily {
    Gamma,
    Lognormal,
    Neugamma,
    Gammalet,
    Neugammalet,
    ShiftedGamma,
}

impl DensityFamily {
    pub const ALL: [Self; 6] = [
        Self::Gamma,
        Self::Lognormal,
        Self::Neugamma,
        Self::Gammalet,
        Self::Neugammalet,
        Self::ShiftedGamma,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Gamma => "gamma",
            Self::Lognormal => "lognormal",
            Self::Neugamma => "neugamma",
            Self::Gammalet => "gammalet",
            Self::Neugammalet => "neugammalet",
            Self::ShiftedGamma => "shifted_gamma",
        }
    }

    pub const fn param_names(self) -> &'static [&'static str] {
        match self {
            Self::Gamma => &["shape", "scale"],
            Self::Lognormal => &["mu", "sigma"],
            Self::Neugamma => &["pneu", "shape", "scale"],
            Self::Gammalet => &["plet", "shape", "scale"],
            Self::Neugammalet => &["plet", "pneu", "shape", "scale"],
            Self::ShiftedGamma => &["shift", "shape", "scale"],
        }
    }

    pub const fn param_count(self) -> usize {
        self.param_names().len()
    }

    pub fn from_name(name: &str) -> Result<Self, DensityError> {
        Self::ALL
            .into_iter()
            .find(|family| family.name() == name)
            .ok_or_else(|| DensityError::UnknownFamily {
                name: name.to_string(),
            })
    }

    fn check(self, name: &'static str, value: f64, valid: bool) -> Result<(), DensityError> {
        if value.is_finite() && valid {
            Ok(())
        } else {
            Err(DensityError::InvalidParameter {
                family: self.name(),
                name,
                value,
            })
        }
    }
}

impl Density for DensityFamily {
    /// Returns NaN when `params` has the wrong length.
    fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        if params.len() != self.param_count() {
            return f64::NAN;
        }
        match self {
            Self::Gamma => gamma_pdf(x, params[0], params[1]),
            Self::Lognormal => lognormal_pdf(x, params[0], params[1]),
            Self::Neugamma => {
                let pneu = params[0];
                (1.0 - pneu) * gamma_pdf(x, params[1], params[2]) + neutral_spike(x, pneu)
            }
            Self::Gammalet => (1.0 - params[0]) * gamma_pdf(x, params[1], params[2]),
            Self::Neugammalet => {
                let (plet, pneu) = (params[0], params[1]);
                (1.0 - pneu - plet) * gamma_pdf(x, params[2], params[3]) + neutral_spike(x, pneu)
            }
            Self::ShiftedGamma => gamma_pdf(params[0] - x, params[1], params[2]),
        }
    }

    fn validate(&self, params: &[f64]) -> Result<(), DensityError> {
        if params.len() != self.param_count() {
            return Err(DensityError::ParameterCount {
                family: self.name(),
                expected: self.param_count(),
                actual: params.len(),
            });
        }

        for (name, value) in self.param_names().iter().zip(params) {
            let valid = match *name {
                "shape" | "scale" | "sigma" => *value > 0.0,
                "pneu" | "plet" => (0.0..=1.0).contains(value),
                _ => true,
            };
            self.check(*name, *value, valid)?;
        }
        Ok(())
    }
}

fn neutral_spike(x: f64, proportion: f64) -> f64 {
    if (0.0..NEUTRAL_THRESHOLD).contains(&x) {
        proportion / NEUTRAL_THRESHOLD
    } else {
        0.0
    }
}

/// Gamma density with the given shape and scale; zero for negative `x`.
pub fn gamma_pdf(x: f64, shape: f64, scale: f64) -> f64 {
    if !(shape > 0.0 && scale > 0.0) {
        return f64::NAN;
    }
    if x < 0.0 {
        return 0.0;
    }
    if x == 0.0 {
        return match shape.partial_cmp(&1.0) {
            Some(std::cmp::Ordering::Less) => f64::INFINITY,
            Some(std::cmp::Ordering::Equal) => 1.0 / scale,
            _ => 0.0,
        };
    }
    ((shape - 1.0) * x.ln() - x / scale - ln_gamma(shape) - shape * scale.ln()).exp()
}

/// Log-normal density of `x` where `ln x ~ N(mu, sigma^2)`; zero for
/// non-positive `x`.
pub fn lognormal_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    if !(sigma > 0.0) {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    let z = (x.ln() - mu) / sigma;
    (-0.5 * z * z).exp() / (x * sigma * (2.0 * PI).sqrt())
}
