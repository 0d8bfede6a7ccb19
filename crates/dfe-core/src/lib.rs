//! Spectrum cache and DFE integration engine.
//!
//! A [`cache::GammaGrid`] fixes the selection coefficients to precompute,
//! [`cache::ParallelBuilder`] fills a [`cache::SpectrumLibrary`] through an
//! external [`solver::SpectrumSolver`], and [`integrate::Integrator`] averages
//! the cached spectra over a [`density::Density`].

pub mod cache;
pub mod config;
pub mod density;
pub mod domain;
pub mod integrate;
pub mod likelihood;
pub mod numerics;
pub mod solver;

pub use cache::{
    CacheBuildError, GammaGrid, GridError, LibraryError, ParallelBuilder, SpectrumLibrary,
    WorkerPool,
};
pub use config::{CacheConfig, ConfigError, load_cache_config};
pub use density::{Density, DensityError, DensityFamily};
pub use domain::{DemographySetup, DfeError, DfeErrorCategory, DfeResult, Spectrum, WorkerKind};
pub use integrate::{
    GridIntegrityError, IntegrationError, IntegrationOptions, IntegrationOutcome, Integrator,
};
pub use solver::{FnSolver, SolveError, SolveRequest, SpectrumSolver};
