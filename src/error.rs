//! Errors raised while configuring, building, or querying a lookup table.

use std::path::PathBuf;

use thiserror::Error;

/// Possible LUT errors.
#[derive(Debug, Error)]
pub enum LutError {
    /// The grid or state vector configuration is malformed
    #[error("configuration error: {reason}")]
    Configuration {
        /// What was wrong with it
        reason: String,
    },

    /// A coefficient file for a cache entry isn't on disk
    #[error("cache entry {key} has no {coefficient} output")]
    MissingCacheEntry {
        /// Cache key of the entry
        key: String,
        /// Coefficient that was requested
        coefficient: String,
    },

    /// The store doesn't cover the whole grid
    #[error("lookup table is incomplete, {} grid point(s) missing: {}", missing.len(), missing.join(", "))]
    IncompleteLut {
        /// Cache keys of every missing grid point
        missing: Vec<String>,
    },

    /// A query landed outside the grid and the boundary policy rejects it
    #[error("query {value} on axis {axis} is outside [{lo}, {hi}]")]
    OutOfBoundsQuery {
        /// Axis name
        axis: String,
        /// Queried coordinate
        value: f64,
        /// Lowest grid value
        lo: f64,
        /// Highest grid value
        hi: f64,
    },

    /// A point has the wrong number of coordinates
    #[error("point has {actual} coordinates, expected {expected}")]
    DimensionMismatch {
        /// Number of grid axes
        expected: usize,
        /// Number of coordinates given
        actual: usize,
    },

    /// The coefficient was not loaded into the interpolator
    #[error("unknown coefficient {name}")]
    UnknownCoefficient {
        /// Requested coefficient
        name: String,
    },

    /// One entry's coefficient vector doesn't match the others
    #[error("cache entry {key} has {actual} {coefficient} values, expected {expected}")]
    InconsistentEntry {
        /// Cache key of the entry
        key: String,
        /// Coefficient name
        coefficient: String,
        /// Length shared by the rest of the table
        expected: usize,
        /// Length found in this entry
        actual: usize,
    },

    /// A coefficient file exists but couldn't be parsed
    #[error("malformed output file {}: {reason}", path.display())]
    MalformedEntry {
        /// File that failed to parse
        path: PathBuf,
        /// Parse failure
        reason: String,
    },

    /// Filesystem failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// An input deck couldn't be serialized
    #[error("couldn't write input deck {}: {source}", path.display())]
    Deck {
        /// Deck path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The worker pool couldn't be created
    #[error("couldn't build worker pool: {0}")]
    ThreadPool(String),
}

impl LutError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        LutError::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LutError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Shorthand for results with a [`LutError`].
pub type Result<T> = std::result::Result<T, LutError>;
