//! Opaque on-disk form of a [`SpectrumLibrary`]: an 8-byte magic, a
//! little-endian format version, then a bincode payload.

use super::grid::{GammaGrid, GridError};
use super::library::{LibraryError, SpectrumLibrary};
use crate::domain::{DemographySetup, DfeError, Spectrum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAGIC: &[u8; 8] = b"DFECACHE";
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = MAGIC.len() + 4;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("cache file '{}' could not be accessed: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache blob is too short ({len} bytes)")]
    Truncated { len: usize },
    #[error("cache blob does not start with the expected magic header")]
    BadMagic,
    #[error("cache format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("failed to encode cache: {0}")]
    Encode(String),
    #[error("failed to decode cache: {0}")]
    Decode(String),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Library(#[from] LibraryError),
}

impl From<PersistError> for DfeError {
    fn from(error: PersistError) -> Self {
        match error {
            PersistError::Io { .. } => DfeError::io_system("IO.CACHE_FILE", error.to_string()),
            PersistError::Encode(_) => DfeError::internal("RUN.CACHE_ENCODE", error.to_string()),
            _ => DfeError::input_validation("INPUT.CACHE_FORMAT", error.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct LibraryRecord {
    setup: DemographySetup,
    gammas: Vec<f64>,
    negative_len: usize,
    spectra: Vec<Spectrum>,
    neutral: Spectrum,
}

pub fn to_bytes(library: &SpectrumLibrary) -> Result<Vec<u8>, PersistError> {
    let record = LibraryRecord {
        setup: library.setup().clone(),
        gammas: library.grid().values().to_vec(),
        negative_len: library.grid().negative_len(),
        spectra: library.spectra().to_vec(),
        neutral: library.neutral().clone(),
    };
    let payload =
        bincode::serialize(&record).map_err(|error| PersistError::Encode(error.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn from_bytes(bytes: &[u8]) -> Result<SpectrumLibrary, PersistError> {
    if bytes.len() < HEADER_LEN {
        return Err(PersistError::Truncated { len: bytes.len() });
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(PersistError::BadMagic);
    }
    let (version, payload) = rest.split_at(4);
    let found = u32::from_le_bytes([version[0], version[1], version[2], version[3]]);
    if found != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            found,
            expected: FORMAT_VERSION,
        });
    }

    let record: LibraryRecord =
        bincode::deserialize(payload).map_err(|error| PersistError::Decode(error.to_string()))?;
    let grid = GammaGrid::from_values(record.gammas, record.negative_len)?;
    Ok(SpectrumLibrary::from_parts(
        record.setup,
        grid,
        record.spectra,
        record.neutral,
    )?)
}

pub fn save_library(path: &Path, library: &SpectrumLibrary) -> Result<(), PersistError> {
    let bytes = to_bytes(library)?;
    fs::write(path, bytes).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_library(path: &Path) -> Result<SpectrumLibrary, PersistError> {
    let bytes = fs::read(path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_bytes(&bytes)
}
