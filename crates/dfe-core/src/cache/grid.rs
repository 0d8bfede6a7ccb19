use crate::domain::DfeError;
use crate::numerics::log_spaced;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("gamma bounds must be finite with 0 < low < high, got ({low}, {high})")]
    InvalidBounds { low: f64, high: f64 },
    #[error("gamma grid requires at least one point")]
    NoPoints,
    #[error("gamma values must be finite, got {value}")]
    NonFiniteGamma { value: f64 },
    #[error("gamma 0 is the neutral spectrum and cannot be stored in the grid")]
    ZeroGamma,
    #[error("gamma {value} appears more than once in the grid")]
    DuplicateGamma { value: f64 },
    #[error("negative block length {negative_len} exceeds grid length {len}")]
    NegativeLengthOutOfRange { negative_len: usize, len: usize },
}

impl From<GridError> for DfeError {
    fn from(error: GridError) -> Self {
        DfeError::input_validation("INPUT.GAMMA_GRID", error.to_string())
    }
}

/// Ordered selection coefficients for a cache: a negative block, ascending
/// towards zero with the largest magnitude first, followed by any additional
/// gammas in caller order.
///
/// The negative block length is recorded at construction. Consumers split the
/// grid with it and never by sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GammaGrid {
    values: Vec<f64>,
    negative_len: usize,
}

impl GammaGrid {
    /// `points` magnitudes log-spaced from `high` down to `low`, negated, then
    /// `additional` appended verbatim.
    pub fn new(bounds: (f64, f64), points: usize, additional: &[f64]) -> Result<Self, GridError> {
        let negative: Vec<f64> = magnitudes(bounds, points)?
            .into_iter()
            .rev()
            .map(|magnitude| -magnitude)
            .collect();
        let negative_len = negative.len();

        let mut grid = Self {
            values: negative,
            negative_len,
        };
        for gamma in additional {
            grid.check_insertable(*gamma)?;
            grid.values.push(*gamma);
        }
        Ok(grid)
    }

    /// Negative grid over `bounds` plus a positive block from
    /// [`positive_gammas`].
    pub fn two_sided(
        bounds: (f64, f64),
        points: usize,
        positive_bounds: (f64, f64),
        positive_points: usize,
    ) -> Result<Self, GridError> {
        let positive = positive_gammas(positive_bounds, positive_points)?;
        Self::new(bounds, points, &positive)
    }

    /// Rebuilds a grid from stored parts. Ordering is deliberately not
    /// checked so integrity failures surface at integration time.
    pub fn from_values(values: Vec<f64>, negative_len: usize) -> Result<Self, GridError> {
        if negative_len > values.len() {
            return Err(GridError::NegativeLengthOutOfRange {
                negative_len,
                len: values.len(),
            });
        }
        let mut grid = Self {
            values: Vec::with_capacity(values.len()),
            negative_len,
        };
        for gamma in values {
            grid.check_insertable(gamma)?;
            grid.values.push(gamma);
        }
        Ok(grid)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn negative_len(&self) -> usize {
        self.negative_len
    }

    pub fn negative(&self) -> &[f64] {
        &self.values[..self.negative_len]
    }

    /// Everything after the negative block: additional gammas and any
    /// point masses appended later.
    pub fn additional(&self) -> &[f64] {
        &self.values[self.negative_len..]
    }

    pub fn positive_count(&self) -> usize {
        self.values.iter().filter(|gamma| **gamma > 0.0).count()
    }

    pub fn position(&self, gamma: f64) -> Option<usize> {
        self.values.iter().position(|value| *value == gamma)
    }

    pub(crate) fn push(&mut self, gamma: f64) -> Result<usize, GridError> {
        self.check_insertable(gamma)?;
        self.values.push(gamma);
        Ok(self.values.len() - 1)
    }

    fn check_insertable(&self, gamma: f64) -> Result<(), GridError> {
        if !gamma.is_finite() {
            return Err(GridError::NonFiniteGamma { value: gamma });
        }
        if gamma == 0.0 {
            return Err(GridError::ZeroGamma);
        }
        if self.values.contains(&gamma) {
            return Err(GridError::DuplicateGamma { value: gamma });
        }
        Ok(())
    }
}

/// Ascending beneficial gammas, log-spaced over `bounds`.
pub fn positive_gammas(bounds: (f64, f64), points: usize) -> Result<Vec<f64>, GridError> {
    magnitudes(bounds, points)
}

fn magnitudes((low, high): (f64, f64), points: usize) -> Result<Vec<f64>, GridError> {
    if points == 0 {
        return Err(GridError::NoPoints);
    }
    let ordered = if points == 1 { low <= high } else { low < high };
    if !low.is_finite() || !high.is_finite() || low <= 0.0 || !ordered {
        return Err(GridError::InvalidBounds { low, high });
    }
    if points == 1 {
        return Ok(vec![high]);
    }
    log_spaced(low, high, points).ok_or(GridError::InvalidBounds { low, high })
}
