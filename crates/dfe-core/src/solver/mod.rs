//! Seam between the cache and the external spectrum solver.

pub mod extrapolate;

pub use extrapolate::{ExtrapolatingSolver, GridSolver};

use crate::domain::{DfeError, Spectrum, SpectrumError, WorkerKind};

/// One solve: fixed demographic parameters, the selection coefficient that is
/// appended as the trailing model parameter, and the solver grid settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveRequest<'a> {
    pub demographic_params: &'a [f64],
    pub gamma: f64,
    pub sample_sizes: &'a [usize],
    pub grid_resolutions: &'a [usize],
    pub worker: WorkerKind,
}

impl<'a> SolveRequest<'a> {
    pub fn new(
        demographic_params: &'a [f64],
        gamma: f64,
        sample_sizes: &'a [usize],
        grid_resolutions: &'a [usize],
    ) -> Self {
        Self {
            demographic_params,
            gamma,
            sample_sizes,
            grid_resolutions,
            worker: WorkerKind::Cpu,
        }
    }

    pub fn on_worker(mut self, worker: WorkerKind) -> Self {
        self.worker = worker;
        self
    }

    /// Demographic parameters with `gamma` appended, as the model function
    /// expects them.
    pub fn params_with_gamma(&self) -> Vec<f64> {
        let mut params = Vec::with_capacity(self.demographic_params.len() + 1);
        params.extend_from_slice(self.demographic_params);
        params.push(self.gamma);
        params
    }

    pub fn expected_shape(&self) -> Vec<usize> {
        crate::domain::shape_for_sample_sizes(self.sample_sizes)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    #[error("solver failed: {message}")]
    Failed { message: String },
    #[error("solver panicked: {message}")]
    Panicked { message: String },
    #[error("solver returned shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("no solver grid resolutions were supplied")]
    NoResolutions,
    #[error("solver grid resolutions {resolutions:?} do not give distinct positive spacings")]
    DegenerateResolutions { resolutions: Vec<usize> },
    #[error("extrapolated spectrum magnitude {magnitude} exceeds limit {limit}")]
    ExtrapolationDiverged { magnitude: f64, limit: f64 },
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
}

impl SolveError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

impl From<SolveError> for DfeError {
    fn from(error: SolveError) -> Self {
        DfeError::computation("RUN.SOLVE", error.to_string())
    }
}

/// Deterministic spectrum solver. Implementations are shared by reference
/// across build workers, so they must be `Sync`.
pub trait SpectrumSolver: Sync {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<Spectrum, SolveError>;
}

impl<T> SpectrumSolver for &T
where
    T: SpectrumSolver + ?Sized,
{
    fn solve(&self, request: &SolveRequest<'_>) -> Result<Spectrum, SolveError> {
        (**self).solve(request)
    }
}

/// Adapts a closure into a [`SpectrumSolver`].
#[derive(Debug, Clone, Copy)]
pub struct FnSolver<F>(F);

impl<F> FnSolver<F>
where
    F: Fn(&SolveRequest<'_>) -> Result<Spectrum, SolveError> + Sync,
{
    pub fn new(solve: F) -> Self {
        Self(solve)
    }
}

impl<F> SpectrumSolver for FnSolver<F>
where
    F: Fn(&SolveRequest<'_>) -> Result<Spectrum, SolveError> + Sync,
{
    fn solve(&self, request: &SolveRequest<'_>) -> Result<Spectrum, SolveError> {
        (self.0)(request)
    }
}
