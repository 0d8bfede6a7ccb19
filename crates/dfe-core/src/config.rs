//! Cache construction settings, loadable from camelCase JSON.

use crate::cache::{GammaGrid, GridError, ParallelBuilder, WorkerPool, positive_gammas};
use crate::domain::{DemographySetup, DfeError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_GAMMA_BOUNDS: (f64, f64) = (1.0e-4, 2000.0);
pub const DEFAULT_GAMMA_POINTS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("config requires at least one cpu or accelerator worker")]
    NoWorkers,
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl From<ConfigError> for DfeError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Read { .. } => DfeError::io_system("IO.CONFIG_READ", error.to_string()),
            ConfigError::Parse { .. } => {
                DfeError::input_validation("INPUT.CONFIG_PARSE", error.to_string())
            }
            ConfigError::NoWorkers | ConfigError::Grid(_) => {
                DfeError::input_validation("INPUT.CONFIG", error.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositiveGammaConfig {
    pub bounds: (f64, f64),
    pub points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CacheConfig {
    /// `(low, high)` magnitudes of the negative block.
    pub gamma_bounds: (f64, f64),
    pub gamma_points: usize,
    pub positive_gammas: Option<PositiveGammaConfig>,
    pub additional_gammas: Vec<f64>,
    pub grid_resolutions: Vec<usize>,
    pub cpu_workers: usize,
    pub accelerator_workers: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let pool = WorkerPool::default();
        Self {
            gamma_bounds: DEFAULT_GAMMA_BOUNDS,
            gamma_points: DEFAULT_GAMMA_POINTS,
            positive_gammas: None,
            additional_gammas: Vec::new(),
            grid_resolutions: Vec::new(),
            cpu_workers: pool.cpu_workers,
            accelerator_workers: pool.accelerator_workers,
        }
    }
}

impl CacheConfig {
    /// Dense two-sided grid used for reference spectra: 901 deleterious and
    /// 701 beneficial gammas.
    pub fn reference_workflow() -> Self {
        Self {
            gamma_bounds: (1.0e-5, 1.0e4),
            gamma_points: 901,
            positive_gammas: Some(PositiveGammaConfig {
                bounds: (1.0e-5, 100.0),
                points: 701,
            }),
            grid_resolutions: vec![1000, 1200, 1400],
            ..Self::default()
        }
    }

    /// Positive block (if configured) followed by `additional_gammas`.
    pub fn gamma_grid(&self) -> Result<GammaGrid, GridError> {
        let mut additional = match self.positive_gammas {
            Some(positive) => positive_gammas(positive.bounds, positive.points)?,
            None => Vec::new(),
        };
        additional.extend_from_slice(&self.additional_gammas);
        GammaGrid::new(self.gamma_bounds, self.gamma_points, &additional)
    }

    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool {
            cpu_workers: self.cpu_workers,
            accelerator_workers: self.accelerator_workers,
        }
    }

    pub fn builder(&self) -> ParallelBuilder {
        ParallelBuilder::new(self.worker_pool())
    }

    pub fn setup(
        &self,
        params: impl Into<Vec<f64>>,
        sample_sizes: impl Into<Vec<usize>>,
    ) -> DemographySetup {
        DemographySetup::new(params, sample_sizes, self.grid_resolutions.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_pool().total() == 0 {
            return Err(ConfigError::NoWorkers);
        }
        self.gamma_grid()?;
        Ok(())
    }
}

pub fn parse_cache_config(path: &Path, source: &str) -> Result<CacheConfig, ConfigError> {
    let config: CacheConfig = serde_json::from_str(source).map_err(|error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

pub fn load_cache_config(path: &Path) -> Result<CacheConfig, ConfigError> {
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_cache_config(path, &source)
}
