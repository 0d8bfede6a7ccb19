//! Parallel construction of a [`SpectrumLibrary`]: a fixed pool of worker
//! threads drains one job queue and reports tagged results on a second
//! channel.

use super::grid::GammaGrid;
use super::library::{LibraryError, SpectrumLibrary};
use crate::domain::{DemographySetup, DfeError, Spectrum, WorkerKind};
use crate::solver::{SolveError, SolveRequest, SpectrumSolver};
use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPool {
    pub cpu_workers: usize,
    pub accelerator_workers: usize,
}

impl WorkerPool {
    pub const fn cpu(workers: usize) -> Self {
        Self {
            cpu_workers: workers,
            accelerator_workers: 0,
        }
    }

    pub const fn total(&self) -> usize {
        self.cpu_workers + self.accelerator_workers
    }

    fn kinds(&self) -> impl Iterator<Item = WorkerKind> {
        std::iter::repeat_n(WorkerKind::Accelerator, self.accelerator_workers)
            .chain(std::iter::repeat_n(WorkerKind::Cpu, self.cpu_workers))
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        let available = thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self::cpu(available.saturating_sub(1).max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveSlot {
    Grid(usize),
    Neutral,
}

/// A solve that returned an error or panicked.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveFailure {
    pub slot: SolveSlot,
    pub gamma: f64,
    pub cause: SolveError,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheBuildError {
    #[error("cache build requires at least one worker")]
    NoWorkers,
    #[error("failed to spawn cache worker '{name}': {message}")]
    Spawn { name: String, message: String },
    #[error(
        "{count} of {total} gammas failed to solve: {gammas}",
        count = .failures.len(),
        gammas = failed_gamma_list(.failures)
    )]
    SolveFailures {
        failures: Vec<SolveFailure>,
        total: usize,
    },
    #[error("no result was received for grid index {index}")]
    MissingResult { index: usize },
    #[error(transparent)]
    Library(#[from] LibraryError),
}

impl CacheBuildError {
    pub fn failed_gammas(&self) -> Vec<f64> {
        match self {
            Self::SolveFailures { failures, .. } => {
                failures.iter().map(|failure| failure.gamma).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl From<CacheBuildError> for DfeError {
    fn from(error: CacheBuildError) -> Self {
        match error {
            CacheBuildError::NoWorkers => {
                DfeError::input_validation("INPUT.WORKERS", error.to_string())
            }
            CacheBuildError::Spawn { .. } => {
                DfeError::io_system("IO.WORKER_SPAWN", error.to_string())
            }
            CacheBuildError::Library(inner) => inner.into(),
            CacheBuildError::SolveFailures { .. } | CacheBuildError::MissingResult { .. } => {
                DfeError::computation("RUN.CACHE_BUILD", error.to_string())
            }
        }
    }
}

fn failed_gamma_list(failures: &[SolveFailure]) -> String {
    let mut rendered = String::new();
    for (position, failure) in failures.iter().enumerate() {
        if position > 0 {
            rendered.push_str(", ");
        }
        let _ = write!(rendered, "{}", failure.gamma);
    }
    rendered
}

enum Job {
    Solve { slot: SolveSlot, gamma: f64 },
    Stop,
}

type JobResult = Result<(SolveSlot, Spectrum), SolveFailure>;

#[derive(Debug, Clone, Default)]
pub struct ParallelBuilder {
    pool: WorkerPool,
}

impl ParallelBuilder {
    pub fn new(pool: WorkerPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> WorkerPool {
        self.pool
    }

    /// Solve one spectrum per grid gamma plus the neutral spectrum, all as
    /// jobs on the same worker pool.
    ///
    /// Every job is attempted; failures are collected and reported together
    /// once all workers have finished. The library content does not depend on
    /// the worker count or completion order.
    pub fn build<S>(
        &self,
        setup: DemographySetup,
        grid: GammaGrid,
        solver: &S,
    ) -> Result<SpectrumLibrary, CacheBuildError>
    where
        S: SpectrumSolver + ?Sized,
    {
        let workers = self.pool.total();
        if workers == 0 {
            return Err(CacheBuildError::NoWorkers);
        }

        let started = Instant::now();
        info!(
            gammas = grid.len(),
            cpu_workers = self.pool.cpu_workers,
            accelerator_workers = self.pool.accelerator_workers,
            "building spectrum cache"
        );

        let (job_tx, job_rx) = unbounded::<Job>();
        let (result_tx, result_rx) = unbounded::<JobResult>();
        for (index, gamma) in grid.values().iter().enumerate() {
            let _ = job_tx.send(Job::Solve {
                slot: SolveSlot::Grid(index),
                gamma: *gamma,
            });
        }
        let _ = job_tx.send(Job::Solve {
            slot: SolveSlot::Neutral,
            gamma: 0.0,
        });
        for _ in 0..workers {
            let _ = job_tx.send(Job::Stop);
        }
        drop(job_tx);

        let setup_ref = &setup;
        thread::scope(|scope| -> Result<(), CacheBuildError> {
            for (ordinal, kind) in self.pool.kinds().enumerate() {
                let name = format!("dfe-cache-{}-{ordinal}", kind.as_str());
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(scope, move || {
                        worker_loop(kind, jobs, results, solver, setup_ref)
                    })
                    .map_err(|error| CacheBuildError::Spawn {
                        name,
                        message: error.to_string(),
                    })?;
            }
            Ok(())
        })?;
        drop(result_tx);

        let total = grid.len();
        let mut slots: Vec<Option<Spectrum>> = vec![None; total];
        let mut neutral = None;
        let mut failures = Vec::new();
        for result in result_rx.try_iter() {
            match result {
                Ok((SolveSlot::Grid(index), spectrum)) => slots[index] = Some(spectrum),
                Ok((SolveSlot::Neutral, spectrum)) => neutral = Some(spectrum),
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|failure| match failure.slot {
                SolveSlot::Grid(index) => index,
                SolveSlot::Neutral => usize::MAX,
            });
            return Err(CacheBuildError::SolveFailures {
                failures,
                total: total + 1,
            });
        }

        let mut spectra = Vec::with_capacity(total);
        for (index, slot) in slots.into_iter().enumerate() {
            spectra.push(slot.ok_or(CacheBuildError::MissingResult { index })?);
        }
        let neutral = neutral.ok_or(CacheBuildError::MissingResult { index: total })?;

        let library = SpectrumLibrary::from_parts(setup, grid, spectra, neutral)?;
        info!(
            gammas = library.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "spectrum cache built"
        );
        Ok(library)
    }
}

fn worker_loop<S>(
    kind: WorkerKind,
    jobs: Receiver<Job>,
    results: Sender<JobResult>,
    solver: &S,
    setup: &DemographySetup,
) where
    S: SpectrumSolver + ?Sized,
{
    while let Ok(job) = jobs.recv() {
        let (slot, gamma) = match job {
            Job::Stop => break,
            Job::Solve { slot, gamma } => (slot, gamma),
        };

        let result = match solve_guarded(solver, setup, gamma, kind) {
            Ok(spectrum) => {
                debug!(?slot, gamma, worker = kind.as_str(), "solved gamma");
                Ok((slot, spectrum))
            }
            Err(cause) => {
                warn!(?slot, gamma, worker = kind.as_str(), error = %cause, "gamma solve failed");
                Err(SolveFailure { slot, gamma, cause })
            }
        };
        if results.send(result).is_err() {
            break;
        }
    }
}

fn solve_guarded<S>(
    solver: &S,
    setup: &DemographySetup,
    gamma: f64,
    kind: WorkerKind,
) -> Result<Spectrum, SolveError>
where
    S: SpectrumSolver + ?Sized,
{
    let request = SolveRequest::new(
        &setup.params,
        gamma,
        &setup.sample_sizes,
        &setup.grid_resolutions,
    )
    .on_worker(kind);

    let spectrum = panic::catch_unwind(AssertUnwindSafe(|| solver.solve(&request))).map_err(
        |payload| SolveError::Panicked {
            message: panic_message(payload.as_ref()),
        },
    )??;

    let expected = request.expected_shape();
    if spectrum.shape() != expected.as_slice() {
        return Err(SolveError::ShapeMismatch {
            expected,
            actual: spectrum.shape().to_vec(),
        });
    }
    Ok(spectrum)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
