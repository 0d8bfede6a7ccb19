//! Special functions needed by the density families and the Poisson
//! likelihood.

const LANCZOS_G: f64 = 5.0;
const GAMMA_SERIES_MAX_TERMS: usize = 1000;
const LANCZOS_COEFFS: [f64; 6] = [
    76.180_091_729_471_46,
    -86.505_320_329_416_77,
    24.014_098_240_830_91,
    -1.231_739_572_450_155,
    0.001_208_650_973_866_179,
    -5.395_239_384_953e-6,
];

/// Lanczos approximation for ln(Γ(x)), g = 5, n = 6 coefficients.
///
/// Returns `f64::INFINITY` for non-positive `x` (poles of the gamma function).
pub fn ln_gamma(x: f64) -> f64 {
    if x <= 0.0 {
        return f64::INFINITY;
    }

    let z = x - 1.0;
    let mut sum = 0.999_999_999_999_997_1_f64;
    for (index, coefficient) in LANCZOS_COEFFS.iter().enumerate() {
        sum += coefficient / (z + 1.0 + index as f64);
    }

    let t = z + LANCZOS_G + 0.5;
    0.5f64.mul_add((2.0 * std::f64::consts::PI).ln(), (z + 0.5) * t.ln()) - t + sum.ln()
}

/// Regularized lower incomplete gamma P(a, x) = γ(a, x) / Γ(a), by its power
/// series. Zero for non-positive `x`.
pub fn regularized_gamma_lower(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x > a + 200.0 {
        return 1.0;
    }

    let mut term = 1.0 / a;
    let mut sum = term;
    for n in 1..GAMMA_SERIES_MAX_TERMS {
        term *= x / (a + n as f64);
        sum += term;
        if term.abs() < 1.0e-16 * sum.abs() {
            break;
        }
    }

    let log_result = a.mul_add(x.ln(), -x) - ln_gamma(a) + sum.ln();
    log_result.exp().clamp(0.0, 1.0)
}
