//! Averaging cached spectra over a DFE.
//!
//! Three variants share the trapezoid-over-gamma core:
//! - [`Integrator::integrate`] uses the negative block only and evaluates the
//!   density at gamma magnitudes.
//! - [`Integrator::integrate_with_point_masses`] mixes that result with
//!   discrete positive point masses resolved through the library.
//! - [`Integrator::integrate_continuous_positive`] integrates the negative and
//!   positive blocks separately and evaluates the density at signed gammas.
//!   No exterior mass is added beyond the most beneficial cached gamma.

pub mod exterior;

pub use exterior::{ExteriorMass, ExteriorTail, QuadratureWarning};

use crate::cache::{LibraryError, SpectrumLibrary};
use crate::density::{Density, DensityError};
use crate::domain::{DfeError, Spectrum, SpectrumError};
use crate::numerics::{QuadratureError, QuadratureOptions, trapezoid_weights};
use crate::solver::SpectrumSolver;
use exterior::TailQuadrature;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridIntegrityError {
    #[error("positive block holds {block} gammas but the grid has {positive} gammas above zero")]
    PositiveCountMismatch { block: usize, positive: usize },
    #[error("{block} block is not strictly ascending at index {index}")]
    Unordered { block: &'static str, index: usize },
    #[error("negative block holds non-negative gamma {gamma} at index {index}")]
    NonNegative { index: usize, gamma: f64 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntegrationError {
    #[error("library has no negative gammas to integrate over")]
    EmptyNegativeBlock,
    #[error("library has no positive gammas to bound the neutral exterior mass")]
    EmptyPositiveBlock,
    #[error("gamma grid integrity violated: {0}")]
    GridIntegrity(#[from] GridIntegrityError),
    #[error("theta must be finite, got {theta}")]
    NonFiniteTheta { theta: f64 },
    #[error("density weight at gamma {gamma} is not finite: {weight}")]
    NonFiniteWeight { gamma: f64, weight: f64 },
    #[error("{count} point masses need {expected} trailing parameters, got {actual} parameters")]
    PointMassParameters {
        count: usize,
        expected: usize,
        actual: usize,
    },
    #[error("point mass proportion {proportion} for gamma {gamma} is not finite")]
    NonFiniteProportion { proportion: f64, gamma: f64 },
    #[error("{tail} exterior mass quadrature failed: {source}")]
    Quadrature {
        tail: ExteriorTail,
        #[source]
        source: QuadratureError,
    },
    #[error(transparent)]
    Density(#[from] DensityError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
}

impl From<IntegrationError> for DfeError {
    fn from(error: IntegrationError) -> Self {
        match error {
            IntegrationError::Library(inner) => inner.into(),
            IntegrationError::Density(inner) => inner.into(),
            IntegrationError::GridIntegrity(_) => {
                DfeError::input_validation("INPUT.GRID_INTEGRITY", error.to_string())
            }
            IntegrationError::NonFiniteWeight { .. } | IntegrationError::Quadrature { .. } => {
                DfeError::computation("RUN.INTEGRATE", error.to_string())
            }
            _ => DfeError::input_validation("INPUT.INTEGRATION", error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationOptions {
    pub include_exterior_mass: bool,
    pub quadrature: QuadratureOptions,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            include_exterior_mass: true,
            quadrature: QuadratureOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationOutcome {
    /// Expected spectrum, already scaled by theta.
    pub spectrum: Spectrum,
    pub exterior: Option<ExteriorMass>,
    pub warnings: Vec<QuadratureWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMass {
    pub proportion: f64,
    pub gamma: f64,
}

/// Splits `[continuous..., p1, g1, p2, g2, ...]` into the continuous density
/// parameters and `count` point masses.
pub fn split_point_masses(
    params: &[f64],
    count: usize,
) -> Result<(&[f64], Vec<PointMass>), IntegrationError> {
    let expected = 2 * count;
    if params.len() < expected {
        return Err(IntegrationError::PointMassParameters {
            count,
            expected,
            actual: params.len(),
        });
    }

    let (continuous, trailing) = params.split_at(params.len() - expected);
    let masses = trailing
        .chunks_exact(2)
        .map(|pair| PointMass {
            proportion: pair[0],
            gamma: pair[1],
        })
        .collect();
    Ok((continuous, masses))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Integrator {
    options: IntegrationOptions,
}

impl Integrator {
    pub fn new(options: IntegrationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> IntegrationOptions {
        self.options
    }

    /// DFE over deleterious gammas only. The density is a function of
    /// selection strength, so it is evaluated at `-gamma`.
    pub fn integrate<D>(
        &self,
        library: &SpectrumLibrary,
        density: &D,
        params: &[f64],
        theta: f64,
    ) -> Result<IntegrationOutcome, IntegrationError>
    where
        D: Density + ?Sized,
    {
        check_theta(theta)?;
        density.validate(params)?;

        let negative = library.negative_gammas();
        check_negative_block(negative)?;
        let (most_deleterious, least_deleterious) = block_ends(negative)?;
        debug!(gammas = negative.len(), "integrating negative block");

        let magnitudes: Vec<f64> = negative.iter().map(|gamma| -gamma).collect();
        let mut spectrum = weighted_trapezoid(
            density.evaluate_many(&magnitudes, params),
            negative,
            library.negative_spectra(),
            library.neutral().shape(),
        )?;

        let mut warnings = Vec::new();
        let exterior = if self.options.include_exterior_mass {
            let quadrature = self.tail_quadrature(density, params);
            let neutral = quadrature.mass(
                ExteriorTail::Neutral,
                0.0,
                -least_deleterious,
                &[],
                &mut warnings,
            )?;
            let deleterious = quadrature.mass(
                ExteriorTail::Deleterious,
                -most_deleterious,
                f64::INFINITY,
                &[],
                &mut warnings,
            )?;
            spectrum.add_scaled(library.neutral(), neutral)?;
            spectrum.add_scaled(&library.negative_spectra()[0], deleterious)?;
            Some(ExteriorMass {
                neutral,
                deleterious,
            })
        } else {
            None
        };

        Ok(IntegrationOutcome {
            spectrum: spectrum.scaled(theta),
            exterior,
            warnings,
        })
    }

    /// Continuous deleterious DFE mixed with `point_masses` discrete gammas.
    ///
    /// `params` ends with `point_masses` `(proportion, gamma)` pairs. Uncached
    /// point-mass gammas are solved with `solver` and appended to the library;
    /// without a solver they are an error. Point-mass spectra are scaled by
    /// theta like the continuous part.
    pub fn integrate_with_point_masses<D>(
        &self,
        library: &mut SpectrumLibrary,
        density: &D,
        params: &[f64],
        point_masses: usize,
        theta: f64,
        solver: Option<&dyn SpectrumSolver>,
    ) -> Result<IntegrationOutcome, IntegrationError>
    where
        D: Density + ?Sized,
    {
        let (continuous, masses) = split_point_masses(params, point_masses)?;
        if let Some(mass) = masses.iter().find(|mass| !mass.proportion.is_finite()) {
            return Err(IntegrationError::NonFiniteProportion {
                proportion: mass.proportion,
                gamma: mass.gamma,
            });
        }

        let base = self.integrate(library, density, continuous, theta)?;
        let total_proportion: f64 = masses.iter().map(|mass| mass.proportion).sum();
        let mut spectrum = base.spectrum.scaled(1.0 - total_proportion);

        for mass in &masses {
            if mass.gamma == 0.0 {
                spectrum.add_scaled(library.neutral(), mass.proportion * theta)?;
                continue;
            }
            let index = library.ensure(mass.gamma, solver)?;
            spectrum.add_scaled(&library.spectra()[index], mass.proportion * theta)?;
        }

        Ok(IntegrationOutcome {
            spectrum,
            exterior: base.exterior,
            warnings: base.warnings,
        })
    }

    /// DFE spanning deleterious and beneficial gammas. The density is
    /// evaluated at signed gammas and each block is integrated on its own
    /// axis.
    pub fn integrate_continuous_positive<D>(
        &self,
        library: &SpectrumLibrary,
        density: &D,
        params: &[f64],
        theta: f64,
    ) -> Result<IntegrationOutcome, IntegrationError>
    where
        D: Density + ?Sized,
    {
        check_theta(theta)?;
        density.validate(params)?;

        let negative = library.negative_gammas();
        let (positive, positive_spectra) = library.positive_block();
        let positive_count = library.grid().positive_count();
        if positive.len() != positive_count {
            return Err(GridIntegrityError::PositiveCountMismatch {
                block: positive.len(),
                positive: positive_count,
            }
            .into());
        }
        check_negative_block(negative)?;
        if let Some(index) = first_unordered(positive) {
            return Err(GridIntegrityError::Unordered {
                block: "positive",
                index,
            }
            .into());
        }
        let (most_deleterious, least_deleterious) = block_ends(negative)?;
        debug!(
            negative = negative.len(),
            positive = positive.len(),
            "integrating negative and positive blocks"
        );

        let shape = library.neutral().shape();
        let mut spectrum = weighted_trapezoid(
            density.evaluate_many(negative, params),
            negative,
            library.negative_spectra(),
            shape,
        )?;
        let positive_part = weighted_trapezoid(
            density.evaluate_many(positive, params),
            positive,
            positive_spectra,
            shape,
        )?;
        spectrum.add_scaled(&positive_part, 1.0)?;

        let mut warnings = Vec::new();
        let exterior = if self.options.include_exterior_mass {
            let least_beneficial = *positive
                .first()
                .ok_or(IntegrationError::EmptyPositiveBlock)?;
            let quadrature = self.tail_quadrature(density, params);
            let neutral = quadrature.mass(
                ExteriorTail::Neutral,
                least_deleterious,
                least_beneficial,
                &[0.0],
                &mut warnings,
            )?;
            let deleterious = quadrature.mass(
                ExteriorTail::Deleterious,
                f64::NEG_INFINITY,
                most_deleterious,
                &[],
                &mut warnings,
            )?;
            spectrum.add_scaled(library.neutral(), neutral)?;
            spectrum.add_scaled(&library.negative_spectra()[0], deleterious)?;
            Some(ExteriorMass {
                neutral,
                deleterious,
            })
        } else {
            None
        };

        Ok(IntegrationOutcome {
            spectrum: spectrum.scaled(theta),
            exterior,
            warnings,
        })
    }

    fn tail_quadrature<'a, D>(&self, density: &'a D, params: &'a [f64]) -> TailQuadrature<'a, D>
    where
        D: Density + ?Sized,
    {
        TailQuadrature {
            density,
            params,
            options: self.options.quadrature,
        }
    }
}

fn check_theta(theta: f64) -> Result<(), IntegrationError> {
    if theta.is_finite() {
        Ok(())
    } else {
        Err(IntegrationError::NonFiniteTheta { theta })
    }
}

fn check_negative_block(negative: &[f64]) -> Result<(), IntegrationError> {
    if negative.is_empty() {
        return Err(IntegrationError::EmptyNegativeBlock);
    }
    if let Some(index) = negative.iter().position(|gamma| *gamma >= 0.0) {
        return Err(GridIntegrityError::NonNegative {
            index,
            gamma: negative[index],
        }
        .into());
    }
    if let Some(index) = first_unordered(negative) {
        return Err(GridIntegrityError::Unordered {
            block: "negative",
            index,
        }
        .into());
    }
    Ok(())
}

/// `(most deleterious, least deleterious)` of a validated negative block.
fn block_ends(negative: &[f64]) -> Result<(f64, f64), IntegrationError> {
    match (negative.first(), negative.last()) {
        (Some(first), Some(last)) => Ok((*first, *last)),
        _ => Err(IntegrationError::EmptyNegativeBlock),
    }
}

fn first_unordered(values: &[f64]) -> Option<usize> {
    values
        .windows(2)
        .position(|window| !(window[0] < window[1]))
        .map(|position| position + 1)
}

/// Trapezoid integral over `gammas` of `weights[i] * spectra[i]`.
fn weighted_trapezoid(
    weights: Vec<f64>,
    gammas: &[f64],
    spectra: &[Spectrum],
    shape: &[usize],
) -> Result<Spectrum, IntegrationError> {
    let mut integral = Spectrum::zeros(shape)?;
    let steps = trapezoid_weights(gammas);
    let terms = gammas.iter().zip(weights).zip(steps.iter().zip(spectra));
    for ((gamma, weight), (step, spectrum)) in terms {
        if !weight.is_finite() {
            return Err(IntegrationError::NonFiniteWeight {
                gamma: *gamma,
                weight,
            });
        }
        integral.add_scaled(spectrum, weight * step)?;
    }
    Ok(integral)
}

#[cfg(test)]
mod tests {
    use super::{
        GridIntegrityError, IntegrationError, IntegrationOptions, Integrator, PointMass,
        split_point_masses,
    };
    use crate::cache::{GammaGrid, SpectrumLibrary};
    use crate::density::DensityFamily;
    use crate::domain::{DemographySetup, DfeError, Spectrum};
    use crate::numerics::regularized_gamma_lower;

    /// Spectrum for gamma `g` is `[1, g, g^2]`; the neutral one is `[1, 0, 0]`.
    fn polynomial_library(grid: GammaGrid) -> SpectrumLibrary {
        let setup = DemographySetup::new(vec![], vec![2], vec![10]);
        let spectra = grid
            .values()
            .iter()
            .map(|g| Spectrum::new(vec![3], vec![1.0, *g, g * g]).expect("spectrum"))
            .collect();
        let neutral = Spectrum::new(vec![3], vec![1.0, 0.0, 0.0]).expect("neutral");
        SpectrumLibrary::from_parts(setup, grid, spectra, neutral).expect("library")
    }

    fn no_exterior() -> Integrator {
        Integrator::new(IntegrationOptions {
            include_exterior_mass: false,
            ..IntegrationOptions::default()
        })
    }

    fn assert_close(expected: f64, actual: f64, tol: f64) {
        assert!(
            (expected - actual).abs() <= tol,
            "expected={expected:.12e} actual={actual:.12e}"
        );
    }

    #[test]
    fn split_takes_trailing_pairs() {
        let (continuous, masses) =
            split_point_masses(&[0.2, 300.0, 0.1, 5.0, 0.05, 10.0], 2).expect("split");
        assert_eq!(continuous, &[0.2, 300.0]);
        assert_eq!(
            masses,
            vec![
                PointMass {
                    proportion: 0.1,
                    gamma: 5.0
                },
                PointMass {
                    proportion: 0.05,
                    gamma: 10.0
                }
            ]
        );
        assert_eq!(
            split_point_masses(&[0.1, 5.0], 2),
            Err(IntegrationError::PointMassParameters {
                count: 2,
                expected: 4,
                actual: 2
            })
        );
    }

    #[test]
    fn uniform_density_over_magnitudes_is_exact_for_linear_entries() {
        let grid = GammaGrid::from_values(vec![-4.0, -3.0, -2.0, -1.0], 4).expect("grid");
        let library = polynomial_library(grid);
        let uniform = |x: f64, _params: &[f64]| {
            if (1.0..=4.0).contains(&x) { 1.0 / 3.0 } else { 0.0 }
        };

        let outcome = no_exterior()
            .integrate(&library, &uniform, &[], 2.0)
            .expect("integrate");
        let data = outcome.spectrum.data();
        assert_close(2.0, data[0], 1.0e-12);
        assert_close(2.0 * -2.5, data[1], 1.0e-12);
        assert!(outcome.exterior.is_none());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn exterior_mass_attributes_tails_to_neutral_and_first_spectrum() {
        let grid = GammaGrid::from_values(vec![-10.0, -1.0], 2).expect("grid");
        let library = polynomial_library(grid);
        let exponential = |x: f64, params: &[f64]| {
            if x < 0.0 { 0.0 } else { (-x / params[0]).exp() / params[0] }
        };

        let outcome = Integrator::default()
            .integrate(&library, &exponential, &[5.0], 1.0)
            .expect("integrate");
        let exterior = outcome.exterior.expect("exterior requested");
        assert_close(1.0 - (-0.2_f64).exp(), exterior.neutral, 1.0e-9);
        assert_close((-2.0_f64).exp(), exterior.deleterious, 1.0e-9);

        let interior = no_exterior()
            .integrate(&library, &exponential, &[5.0], 1.0)
            .expect("integrate");
        let expected_first = interior.spectrum.data()[0] + exterior.neutral + exterior.deleterious;
        assert_close(expected_first, outcome.spectrum.data()[0], 1.0e-12);
        let expected_g2 = interior.spectrum.data()[2] + 100.0 * exterior.deleterious;
        assert_close(expected_g2, outcome.spectrum.data()[2], 1.0e-9);
    }

    #[test]
    fn small_shape_gamma_tails_match_incomplete_gamma() {
        let grid = GammaGrid::from_values(vec![-2000.0, -1.0e-4], 2).expect("grid");
        let library = polynomial_library(grid);
        let (shape, scale) = (0.01, 4000.0);

        let outcome = Integrator::default()
            .integrate(&library, &DensityFamily::Gamma, &[shape, scale], 1.0)
            .expect("integrate");
        let exterior = outcome.exterior.expect("exterior requested");
        let neutral = regularized_gamma_lower(shape, 1.0e-4 / scale);
        let deleterious = 1.0 - regularized_gamma_lower(shape, 2000.0 / scale);
        assert_close(neutral, exterior.neutral, 1.0e-8 * neutral);
        assert_close(deleterious, exterior.deleterious, 1.0e-8 * deleterious);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn point_masses_mix_with_the_continuous_part() {
        let grid = GammaGrid::new((1.0, 10.0), 2, &[3.0]).expect("grid");
        let mut library = polynomial_library(grid);
        let uniform = |x: f64, _params: &[f64]| {
            if (1.0..=10.0).contains(&x) { 1.0 / 9.0 } else { 0.0 }
        };
        let integrator = no_exterior();

        let continuous = integrator
            .integrate(&library, &uniform, &[], 4.0)
            .expect("integrate");
        let mixed = integrator
            .integrate_with_point_masses(
                &mut library,
                &uniform,
                &[0.25, 3.0, 0.25, 0.0],
                2,
                4.0,
                None,
            )
            .expect("mixed");
        let expected = [
            0.5 * continuous.spectrum.data()[0] + 0.25 * 4.0 + 0.25 * 4.0,
            0.5 * continuous.spectrum.data()[1] + 0.25 * 4.0 * 3.0,
            0.5 * continuous.spectrum.data()[2] + 0.25 * 4.0 * 9.0,
        ];
        for (expected, actual) in expected.iter().zip(mixed.spectrum.data()) {
            assert_close(*expected, *actual, 1.0e-12);
        }

        let zero = integrator
            .integrate_with_point_masses(&mut library, &uniform, &[0.0, 3.0], 1, 4.0, None)
            .expect("zero proportions");
        assert_eq!(zero.spectrum, continuous.spectrum);
    }

    #[test]
    fn uncached_point_mass_without_solver_names_the_gamma() {
        let grid = GammaGrid::new((1.0, 10.0), 2, &[]).expect("grid");
        let mut library = polynomial_library(grid);
        let error = no_exterior()
            .integrate_with_point_masses(
                &mut library,
                &|_x: f64, _params: &[f64]| 0.0,
                &[0.1, 42.0],
                1,
                1.0,
                None,
            )
            .expect_err("missing gamma");
        assert_eq!(
            error,
            IntegrationError::Library(crate::cache::LibraryError::MissingGamma { gamma: 42.0 })
        );
        let mapped: DfeError = error.into();
        assert_eq!(mapped.placeholder(), "INPUT.MISSING_GAMMA");
    }

    #[test]
    fn continuous_positive_uses_signed_gammas_on_both_blocks() {
        let grid = GammaGrid::from_values(vec![-3.0, -2.0, -1.0, 1.0, 2.0], 3).expect("grid");
        let library = polynomial_library(grid);
        let signed = |x: f64, _params: &[f64]| match x {
            x if x < -3.0 => 0.0,
            x if x < 0.0 => 1.0,
            _ => 2.0,
        };

        let outcome = no_exterior()
            .integrate_continuous_positive(&library, &signed, &[], 1.0)
            .expect("integrate");
        // negative block: 2 units at weight 1; positive block: 1 unit at weight 2
        assert_close(4.0, outcome.spectrum.data()[0], 1.0e-12);
        assert_close(-4.0 + 3.0, outcome.spectrum.data()[1], 1.0e-12);

        let with_exterior = Integrator::default()
            .integrate_continuous_positive(&library, &signed, &[], 1.0)
            .expect("integrate");
        let exterior = with_exterior.exterior.expect("exterior");
        assert_close(1.0 + 2.0, exterior.neutral, 1.0e-9);
        assert_eq!(exterior.deleterious, 0.0);
        assert!(with_exterior.warnings.is_empty());
    }

    #[test]
    fn reordered_grid_fails_integrity_checks() {
        let flat = |_x: f64, _params: &[f64]| 1.0;

        let negative_moved_to_end =
            GammaGrid::from_values(vec![-3.0, -1.0, 2.0, -2.0], 2).expect("grid");
        let library = polynomial_library(negative_moved_to_end);
        assert_eq!(
            Integrator::default().integrate_continuous_positive(&library, &flat, &[], 1.0),
            Err(IntegrationError::GridIntegrity(
                GridIntegrityError::PositiveCountMismatch {
                    block: 2,
                    positive: 1
                }
            ))
        );

        let swapped = GammaGrid::from_values(vec![-1.0, 1.0, -3.0, 2.0], 2).expect("grid");
        let library = polynomial_library(swapped);
        assert_eq!(
            no_exterior().integrate_continuous_positive(&library, &flat, &[], 1.0),
            Err(IntegrationError::GridIntegrity(
                GridIntegrityError::NonNegative {
                    index: 1,
                    gamma: 1.0
                }
            ))
        );

        let descending = GammaGrid::from_values(vec![-1.0, -3.0, 2.0], 2).expect("grid");
        let library = polynomial_library(descending);
        assert_eq!(
            no_exterior().integrate(&library, &flat, &[], 1.0),
            Err(IntegrationError::GridIntegrity(
                GridIntegrityError::Unordered {
                    block: "negative",
                    index: 1
                }
            ))
        );
    }

    #[test]
    fn bad_weights_and_theta_are_rejected() {
        let grid = GammaGrid::new((1.0, 10.0), 3, &[]).expect("grid");
        let library = polynomial_library(grid);
        let nan = |_x: f64, _params: &[f64]| f64::NAN;
        assert!(matches!(
            no_exterior().integrate(&library, &nan, &[], 1.0),
            Err(IntegrationError::NonFiniteWeight { .. })
        ));
        let flat = |_x: f64, _params: &[f64]| 1.0;
        assert_eq!(
            no_exterior().integrate(&library, &flat, &[], f64::INFINITY),
            Err(IntegrationError::NonFiniteTheta {
                theta: f64::INFINITY
            })
        );
    }
}
