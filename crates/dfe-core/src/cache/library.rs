use super::grid::{GammaGrid, GridError};
use crate::domain::{DemographySetup, DfeError, Spectrum};
use crate::solver::{SolveError, SolveRequest, SpectrumSolver};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LibraryError {
    #[error("library holds {spectra} spectra for {grid} gammas")]
    LengthMismatch { grid: usize, spectra: usize },
    #[error("spectrum for gamma {gamma} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        gamma: f64,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("gamma {gamma} cannot be looked up in the library")]
    InvalidGamma { gamma: f64 },
    #[error("gamma {gamma} is not cached and no solver was supplied")]
    MissingGamma { gamma: f64 },
    #[error("solving gamma {gamma} failed: {source}")]
    Solve {
        gamma: f64,
        #[source]
        source: SolveError,
    },
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl From<LibraryError> for DfeError {
    fn from(error: LibraryError) -> Self {
        match error {
            LibraryError::MissingGamma { .. } => {
                DfeError::input_validation("INPUT.MISSING_GAMMA", error.to_string())
            }
            LibraryError::Solve { .. } => DfeError::computation("RUN.SOLVE", error.to_string()),
            _ => DfeError::input_validation("INPUT.LIBRARY", error.to_string()),
        }
    }
}

/// Spectra for every grid gamma (same index) plus the neutral spectrum and
/// the solve settings needed to extend the library later.
///
/// Entries are append-only: [`SpectrumLibrary::ensure`] may add one gamma at a
/// time, nothing is removed and stored spectra are never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumLibrary {
    setup: DemographySetup,
    grid: GammaGrid,
    spectra: Vec<Spectrum>,
    neutral: Spectrum,
    index: HashMap<u64, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySummary {
    pub gamma_count: usize,
    pub negative_count: usize,
    pub additional_count: usize,
    pub positive_count: usize,
    pub most_deleterious: Option<f64>,
    pub least_deleterious: Option<f64>,
    pub sample_sizes: Vec<usize>,
    pub grid_resolutions: Vec<usize>,
    pub spectrum_shape: Vec<usize>,
    pub neutral_total: f64,
}

impl SpectrumLibrary {
    pub fn from_parts(
        setup: DemographySetup,
        grid: GammaGrid,
        spectra: Vec<Spectrum>,
        neutral: Spectrum,
    ) -> Result<Self, LibraryError> {
        if grid.len() != spectra.len() {
            return Err(LibraryError::LengthMismatch {
                grid: grid.len(),
                spectra: spectra.len(),
            });
        }

        let expected = setup.spectrum_shape();
        check_shape(0.0, &expected, &neutral)?;
        for (gamma, spectrum) in grid.values().iter().zip(&spectra) {
            check_shape(*gamma, &expected, spectrum)?;
        }

        let index = grid
            .values()
            .iter()
            .enumerate()
            .map(|(position, gamma)| (gamma.to_bits(), position))
            .collect();

        Ok(Self {
            setup,
            grid,
            spectra,
            neutral,
            index,
        })
    }

    pub fn setup(&self) -> &DemographySetup {
        &self.setup
    }

    pub fn grid(&self) -> &GammaGrid {
        &self.grid
    }

    pub fn spectra(&self) -> &[Spectrum] {
        &self.spectra
    }

    pub fn neutral(&self) -> &Spectrum {
        &self.neutral
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn spectrum(&self, index: usize) -> Option<&Spectrum> {
        self.spectra.get(index)
    }

    pub fn index_of(&self, gamma: f64) -> Option<usize> {
        self.index.get(&gamma.to_bits()).copied()
    }

    /// Exact-match lookup; gamma 0 resolves to the neutral spectrum.
    pub fn spectrum_for(&self, gamma: f64) -> Option<&Spectrum> {
        if gamma == 0.0 {
            return Some(&self.neutral);
        }
        self.index_of(gamma).map(|index| &self.spectra[index])
    }

    pub fn negative_gammas(&self) -> &[f64] {
        self.grid.negative()
    }

    pub fn negative_spectra(&self) -> &[Spectrum] {
        &self.spectra[..self.grid.negative_len()]
    }

    /// Gammas and spectra after the negative block.
    pub fn positive_block(&self) -> (&[f64], &[Spectrum]) {
        let split = self.grid.negative_len();
        (self.grid.additional(), &self.spectra[split..])
    }

    /// Every stored gamma in grid order followed by `(0, neutral)`.
    pub fn gamma_spectrum_pairs(&self) -> Vec<(f64, &Spectrum)> {
        self.grid
            .values()
            .iter()
            .copied()
            .zip(&self.spectra)
            .chain(std::iter::once((0.0, &self.neutral)))
            .collect()
    }

    pub fn summary(&self) -> LibrarySummary {
        let negative = self.grid.negative();
        LibrarySummary {
            gamma_count: self.grid.len(),
            negative_count: negative.len(),
            additional_count: self.grid.additional().len(),
            positive_count: self.grid.positive_count(),
            most_deleterious: negative.first().copied(),
            least_deleterious: negative.last().copied(),
            sample_sizes: self.setup.sample_sizes.clone(),
            grid_resolutions: self.setup.grid_resolutions.clone(),
            spectrum_shape: self.setup.spectrum_shape(),
            neutral_total: self.neutral.total(),
        }
    }

    /// Index of `gamma`, solving and appending it first when it is absent and
    /// a solver is supplied.
    ///
    /// Lookup is by exact value. Without a solver an uncached gamma is an
    /// error rather than an approximation.
    pub fn ensure(
        &mut self,
        gamma: f64,
        solver: Option<&dyn SpectrumSolver>,
    ) -> Result<usize, LibraryError> {
        if !gamma.is_finite() || gamma == 0.0 {
            return Err(LibraryError::InvalidGamma { gamma });
        }
        if let Some(index) = self.index_of(gamma) {
            return Ok(index);
        }
        let Some(solver) = solver else {
            return Err(LibraryError::MissingGamma { gamma });
        };

        debug!(gamma, "solving uncached gamma");
        let request = SolveRequest::new(
            &self.setup.params,
            gamma,
            &self.setup.sample_sizes,
            &self.setup.grid_resolutions,
        );
        let spectrum = solver
            .solve(&request)
            .map_err(|source| LibraryError::Solve { gamma, source })?;
        let expected = self.setup.spectrum_shape();
        if spectrum.shape() != expected.as_slice() {
            return Err(LibraryError::Solve {
                gamma,
                source: SolveError::ShapeMismatch {
                    expected,
                    actual: spectrum.shape().to_vec(),
                },
            });
        }

        match self.index.entry(gamma.to_bits()) {
            Entry::Occupied(existing) => Ok(*existing.get()),
            Entry::Vacant(slot) => {
                let index = self.grid.push(gamma)?;
                self.spectra.push(spectrum);
                slot.insert(index);
                info!(gamma, index, "appended gamma to spectrum library");
                Ok(index)
            }
        }
    }
}

fn check_shape(gamma: f64, expected: &[usize], spectrum: &Spectrum) -> Result<(), LibraryError> {
    if spectrum.shape() != expected {
        return Err(LibraryError::ShapeMismatch {
            gamma,
            expected: expected.to_vec(),
            actual: spectrum.shape().to_vec(),
        });
    }
    Ok(())
}
