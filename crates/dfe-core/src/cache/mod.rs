pub mod builder;
pub mod grid;
pub mod library;
pub mod persist;

pub use builder::{CacheBuildError, ParallelBuilder, SolveFailure, SolveSlot, WorkerPool};
pub use grid::{GammaGrid, GridError, positive_gammas};
pub use library::{LibraryError, LibrarySummary, SpectrumLibrary};
pub use persist::{PersistError, from_bytes, load_library, save_library, to_bytes};
