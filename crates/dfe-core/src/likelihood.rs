//! Poisson composite likelihood of observed spectra under a model spectrum.

use crate::domain::{Spectrum, SpectrumError};
use crate::numerics::{ln_gamma, stable_sum};

/// `sum(-m + d ln m - ln Γ(d + 1))` over entries that are not monomorphic
/// corners.
///
/// An entry with a non-positive model value contributes nothing when the data
/// is zero and makes the likelihood `-inf` otherwise.
pub fn poisson_log_likelihood(model: &Spectrum, data: &Spectrum) -> Result<f64, SpectrumError> {
    model.ensure_same_shape(data)?;

    let terms: Vec<f64> = model
        .data()
        .iter()
        .zip(data.data())
        .enumerate()
        .filter(|(index, _)| !model.is_corner(*index))
        .map(|(_, (m, d))| {
            if *m <= 0.0 {
                if *d == 0.0 { 0.0 } else { f64::NEG_INFINITY }
            } else {
                -m + d * m.ln() - ln_gamma(d + 1.0)
            }
        })
        .collect();
    if terms.contains(&f64::NEG_INFINITY) {
        return Ok(f64::NEG_INFINITY);
    }
    Ok(stable_sum(&terms))
}

/// Multiplicative scale maximising the Poisson likelihood of `data` under
/// `model`: the ratio of non-corner totals.
pub fn optimal_sfs_scaling(model: &Spectrum, data: &Spectrum) -> Result<f64, SpectrumError> {
    model.ensure_same_shape(data)?;

    let mut model_total = Vec::new();
    let mut data_total = Vec::new();
    for (index, (m, d)) in model.data().iter().zip(data.data()).enumerate() {
        if !model.is_corner(index) {
            model_total.push(*m);
            data_total.push(*d);
        }
    }
    Ok(stable_sum(&data_total) / stable_sum(&model_total))
}
