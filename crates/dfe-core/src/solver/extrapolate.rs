//! Solve at several grid resolutions and extrapolate each spectrum entry to
//! zero grid spacing.

use super::{SolveError, SolveRequest, SpectrumSolver};
use crate::domain::Spectrum;

pub const DEFAULT_FAIL_MAGNITUDE: f64 = 10.0;

/// Solver that produces a spectrum at one fixed number of grid points.
pub trait GridSolver: Sync {
    fn solve_at(
        &self,
        request: &SolveRequest<'_>,
        grid_points: usize,
    ) -> Result<Spectrum, SolveError>;

    /// Abscissa used for extrapolation. Must shrink towards zero as
    /// `grid_points` grows.
    fn grid_spacing(&self, grid_points: usize) -> f64 {
        1.0 / grid_points as f64
    }
}

#[derive(Debug, Clone)]
pub struct ExtrapolatingSolver<G> {
    inner: G,
    fail_magnitude: f64,
}

impl<G: GridSolver> ExtrapolatingSolver<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            fail_magnitude: DEFAULT_FAIL_MAGNITUDE,
        }
    }

    pub fn with_fail_magnitude(mut self, fail_magnitude: f64) -> Self {
        self.fail_magnitude = fail_magnitude;
        self
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: GridSolver> SpectrumSolver for ExtrapolatingSolver<G> {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<Spectrum, SolveError> {
        let resolutions = request.grid_resolutions;
        if resolutions.is_empty() {
            return Err(SolveError::NoResolutions);
        }

        let spacings: Vec<f64> = resolutions
            .iter()
            .map(|points| self.inner.grid_spacing(*points))
            .collect();
        let degenerate = resolutions.contains(&0)
            || spacings
                .iter()
                .any(|spacing| !spacing.is_finite() || *spacing <= 0.0)
            || spacings
                .iter()
                .enumerate()
                .any(|(index, spacing)| spacings[..index].contains(spacing));
        if degenerate {
            return Err(SolveError::DegenerateResolutions {
                resolutions: resolutions.to_vec(),
            });
        }

        let expected = request.expected_shape();
        let mut solves = Vec::with_capacity(resolutions.len());
        for points in resolutions {
            let spectrum = self.inner.solve_at(request, *points)?;
            if spectrum.shape() != expected.as_slice() {
                return Err(SolveError::ShapeMismatch {
                    expected,
                    actual: spectrum.shape().to_vec(),
                });
            }
            solves.push(spectrum);
        }

        if solves.len() == 1 {
            return Ok(solves.remove(0));
        }

        let weights = lagrange_weights_at_zero(&spacings);
        let mut data = vec![0.0; solves[0].len()];
        for (spectrum, weight) in solves.iter().zip(&weights) {
            for (target, value) in data.iter_mut().zip(spectrum.data()) {
                *target += weight * value;
            }
        }

        let limit = self.fail_magnitude
            * solves
                .iter()
                .map(Spectrum::max_abs)
                .fold(0.0_f64, f64::max);
        let magnitude = data.iter().fold(0.0_f64, |max, value| {
            if value.is_finite() {
                max.max(value.abs())
            } else {
                f64::INFINITY
            }
        });
        if magnitude > limit {
            return Err(SolveError::ExtrapolationDiverged { magnitude, limit });
        }

        Ok(Spectrum::new(expected, data)?)
    }
}

/// Weights `w_i` such that `sum(w_i * y_i)` is the interpolating polynomial
/// through `(x_i, y_i)` evaluated at `x = 0`.
fn lagrange_weights_at_zero(abscissae: &[f64]) -> Vec<f64> {
    abscissae
        .iter()
        .enumerate()
        .map(|(i, x_i)| {
            abscissae
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, x_j)| x_j / (x_j - x_i))
                .product()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ExtrapolatingSolver, GridSolver, lagrange_weights_at_zero};
    use crate::domain::Spectrum;
    use crate::solver::{SolveError, SolveRequest, SpectrumSolver};

    /// Entry `k` is `(k + 1) * (1 + a*h + b*h^2)` with `h = 1/points`.
    struct PolynomialGrid {
        a: f64,
        b: f64,
    }

    impl GridSolver for PolynomialGrid {
        fn solve_at(
            &self,
            request: &SolveRequest<'_>,
            grid_points: usize,
        ) -> Result<Spectrum, SolveError> {
            let h = self.grid_spacing(grid_points);
            let factor = 1.0 + self.a * h + self.b * h * h;
            let shape = request.expected_shape();
            let count: usize = shape.iter().product();
            let data = (0..count).map(|k| (k + 1) as f64 * factor).collect();
            Ok(Spectrum::new(shape, data)?)
        }
    }

    fn assert_close(expected: f64, actual: f64) {
        assert!(
            (expected - actual).abs() <= 1.0e-9 * expected.abs().max(1.0),
            "expected={expected} actual={actual}"
        );
    }

    #[test]
    fn lagrange_weights_sum_to_one() {
        let weights = lagrange_weights_at_zero(&[0.1, 0.05, 0.025]);
        assert_close(1.0, weights.iter().sum());

        let linear = lagrange_weights_at_zero(&[0.5, 0.25]);
        assert_close(-1.0, linear[0]);
        assert_close(2.0, linear[1]);
    }

    #[test]
    fn two_resolutions_remove_linear_error() {
        let solver = ExtrapolatingSolver::new(PolynomialGrid { a: 3.0, b: 0.0 });
        let spectrum = solver
            .solve(&SolveRequest::new(&[1.0], -1.0, &[2], &[20, 40]))
            .expect("solve");
        for (k, value) in spectrum.data().iter().enumerate() {
            assert_close((k + 1) as f64, *value);
        }
    }

    #[test]
    fn three_resolutions_remove_quadratic_error() {
        let solver = ExtrapolatingSolver::new(PolynomialGrid { a: -2.0, b: 5.0 });
        let spectrum = solver
            .solve(&SolveRequest::new(&[], -1.0, &[1, 1], &[10, 12, 14]))
            .expect("solve");
        assert_eq!(spectrum.shape(), &[2, 2]);
        for (k, value) in spectrum.data().iter().enumerate() {
            assert_close((k + 1) as f64, *value);
        }
    }

    #[test]
    fn single_resolution_passes_solve_through() {
        let solver = ExtrapolatingSolver::new(PolynomialGrid { a: 1.0, b: 0.0 });
        let spectrum = solver
            .solve(&SolveRequest::new(&[], -1.0, &[1], &[10]))
            .expect("solve");
        assert_close(1.1, spectrum.data()[0]);
        assert_close(2.2, spectrum.data()[1]);
    }

    #[test]
    fn resolution_settings_are_validated() {
        let solver = ExtrapolatingSolver::new(PolynomialGrid { a: 0.0, b: 0.0 });
        assert_eq!(
            solver.solve(&SolveRequest::new(&[], -1.0, &[1], &[])),
            Err(SolveError::NoResolutions)
        );
        assert_eq!(
            solver.solve(&SolveRequest::new(&[], -1.0, &[1], &[20, 20])),
            Err(SolveError::DegenerateResolutions {
                resolutions: vec![20, 20]
            })
        );
        assert!(matches!(
            solver.solve(&SolveRequest::new(&[], -1.0, &[1], &[0, 20])),
            Err(SolveError::DegenerateResolutions { .. })
        ));
    }

    #[test]
    fn runaway_extrapolation_is_reported() {
        struct Oscillating;

        impl GridSolver for Oscillating {
            fn solve_at(
                &self,
                _request: &SolveRequest<'_>,
                grid_points: usize,
            ) -> Result<Spectrum, SolveError> {
                let value = if grid_points == 10 { 1.0 } else { -1.0 };
                Ok(Spectrum::new(vec![2], vec![value, value])?)
            }
        }

        let error = ExtrapolatingSolver::new(Oscillating)
            .solve(&SolveRequest::new(&[], -1.0, &[1], &[10, 11]))
            .expect_err("diverges");
        match error {
            SolveError::ExtrapolationDiverged { magnitude, limit } => {
                assert_close(21.0, magnitude);
                assert_close(10.0, limit);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
