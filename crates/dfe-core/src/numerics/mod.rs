pub mod quadrature;
pub mod special;

pub use quadrature::{
    QuadratureError, QuadratureEstimate, QuadratureOptions, integrate_adaptive,
};
pub use special::{ln_gamma, regularized_gamma_lower};

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

/// `count` values spaced evenly in log10 between `start` and `end`
/// (inclusive, either direction). Endpoints are pinned to the exact inputs.
pub fn log_spaced(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    if count == 0 || !start.is_finite() || !end.is_finite() || start <= 0.0 || end <= 0.0 {
        return None;
    }
    if count == 1 {
        return Some(vec![start]);
    }

    let log_start = start.log10();
    let log_end = end.log10();
    let step = (log_end - log_start) / ((count - 1) as f64);
    let mut grid: Vec<f64> = (0..count)
        .map(|index| 10f64.powf(log_start + step * index as f64))
        .collect();

    grid[0] = start;
    if let Some(last) = grid.last_mut() {
        *last = end;
    }

    Some(grid)
}

/// Per-point weights of the composite trapezoidal rule on `x`, so that
/// `sum(w[i] * y[i])` equals the trapezoid integral of `y` over `x`.
///
/// Fewer than two points integrate to zero.
pub fn trapezoid_weights(x: &[f64]) -> Vec<f64> {
    let mut weights = vec![0.0; x.len()];
    for (index, window) in x.windows(2).enumerate() {
        let half_width = 0.5 * (window[1] - window[0]);
        weights[index] += half_width;
        weights[index + 1] += half_width;
    }
    weights
}

pub fn integrate_trapezoid(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }

    let weights = trapezoid_weights(x);
    let terms: Vec<f64> = weights.iter().zip(y).map(|(w, value)| w * value).collect();
    Some(stable_sum(&terms))
}

pub fn is_strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|window| window[0] < window[1])
}

pub fn relative_difference(lhs: f64, rhs: f64, relative_floor: f64) -> f64 {
    let scale = lhs.abs().max(rhs.abs()).max(relative_floor);
    (lhs - rhs).abs() / scale
}

pub fn within_tolerance(
    lhs: f64,
    rhs: f64,
    abs_tol: f64,
    rel_tol: f64,
    relative_floor: f64,
) -> bool {
    let abs_diff = (lhs - rhs).abs();
    abs_diff <= abs_tol || relative_difference(lhs, rhs, relative_floor) <= rel_tol
}
