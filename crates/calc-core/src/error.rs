use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Terminal failure of a calculator transaction.
///
/// None of these are retried by the core. A caller that wants another attempt
/// issues a fresh request against a freshly acquired handle.
#[derive(Debug, Error)]
pub enum CalcError {
    /// The physical-memory backing store could not be opened.
    #[error("cannot open {}: {source}", path.display())]
    Access {
        /// Backing store path that was opened.
        path: PathBuf,
        /// Underlying OS error, usually a privilege failure.
        #[source]
        source: io::Error,
    },
    /// The backing store opened but the register window could not be mapped.
    #[error("cannot map {size:#x} bytes at {base:#010x}: {source}")]
    Mapping {
        /// Physical base address requested.
        base: u64,
        /// Window size requested in bytes.
        size: usize,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The device did not report completion within the polling budget.
    #[error("TIMEOUT: status={last_status}")]
    Timeout {
        /// Last `Status` value observed before the budget ran out.
        last_status: u32,
    },
}

/// Coarse classification of [`CalcError`] for matching and exit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`CalcError::Access`].
    Access,
    /// See [`CalcError::Mapping`].
    Mapping,
    /// See [`CalcError::Timeout`].
    Timeout,
}

impl CalcError {
    /// Returns the taxonomy class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Access { .. } => ErrorKind::Access,
            Self::Mapping { .. } => ErrorKind::Mapping,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Last observed status for timeouts, `None` otherwise.
    #[must_use]
    pub const fn last_status(&self) -> Option<u32> {
        match self {
            Self::Timeout { last_status } => Some(*last_status),
            Self::Access { .. } | Self::Mapping { .. } => None,
        }
    }
}

/// Rejected [`crate::CalcConfig`] values, caught before any device access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ConfigError {
    /// Base address is not aligned to the page size.
    #[error("base address {base:#x} is not aligned to {page_bytes:#x}-byte pages")]
    UnalignedBase {
        /// Configured base address.
        base: u64,
        /// Required alignment.
        page_bytes: usize,
    },
    /// Window is smaller than the register block.
    #[error("window of {size:#x} bytes does not cover the {required:#x}-byte register block")]
    WindowTooSmall {
        /// Configured window size.
        size: usize,
        /// Minimum size covering every register.
        required: usize,
    },
    /// Polling budget allows no status read at all.
    #[error("polling budget must be non-zero")]
    EmptyBudget,
}
