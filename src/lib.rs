//! Lookup-table engine for radiative-transfer retrievals.
//!
//! An imaging-spectrometer retrieval inverts a radiative-transfer simulator
//! that is far too slow to call per pixel. This crate runs the simulator once
//! per vertex of a grid over the free parameters, caches the results on disk,
//! and interpolates between them while the inversion iterates.
//!
//! NOTE: the Python interface lives in the `python` module, behind the
//! `python` feature. Nothing else uses `pyo3`.

pub mod config;
pub mod error;
pub mod lut;

#[cfg(feature = "python")]
mod python;

pub use config::{
    BoundaryPolicy, OrderedMap, SimulatorConfig, StateElementConfig, TabularRtConfig,
};
pub use error::{LutError, Result};
pub use lut::{
    BuildOutcome, BuildReport, BuildScheduler, BuildStatus, BuildTask, CacheKeyNamer,
    CacheStatus, GridAxis, GridPoint, GridSpec, Interpolator, LutStore, Points, StateElement,
    StateVectorSpec, TabularRt, TaskStatus,
};
