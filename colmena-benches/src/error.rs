//! Benchmark setup error type.

use crate::source::SyntheticError;
use colmena_core::PagedError;

/// Errors that may occur while preparing benchmark inputs.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// Synthetic edge generation failed.
    #[error("synthetic edge generation failed: {0}")]
    Synthetic(#[from] SyntheticError),
    /// A paged structure could not be built.
    #[error("paged structure setup failed: {0}")]
    Paged(#[from] PagedError),
}
