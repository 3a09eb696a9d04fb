//! Lookup-table radiative transfer.
//!
//! The simulator is too slow to run per pixel, so it is run once per vertex of
//! a grid over the free parameters and the results are interpolated during
//! the inversion. [`TabularRt`] ties the pieces together: it validates the
//! configuration, brings the on-disk cache up to date, and loads an
//! [`Interpolator`] from it.

mod grid;
mod interp;
mod naming;
mod scheduler;
mod statevector;
mod store;


pub use self::grid::{GridAxis, GridPoint, GridSpec, Points};
pub use self::interp::Interpolator;
pub use self::naming::CacheKeyNamer;
pub use self::scheduler::{BuildReport, BuildScheduler, BuildStatus, BuildTask, TaskStatus};
pub use self::statevector::{StateElement, StateVectorSpec};
pub use self::store::{CacheStatus, LutStore};

use std::{path::PathBuf, time::Duration};

use log::{info, warn};

use crate::config::{BoundaryPolicy, TabularRtConfig};
use crate::error::{LutError, Result};

/// What [`TabularRt::build_lut`] ended with.
#[derive(Debug)]
pub enum BuildOutcome {
    /// Configure-and-exit mode: decks were written, nothing was simulated
    Stopped {
        /// Input decks awaiting manual execution
        decks: Vec<PathBuf>,
    },
    /// The LUT is complete and loaded
    Ready(Interpolator),
}

/// A tabular model of photon transport through the atmosphere.
#[derive(Debug)]
pub struct TabularRt {
    grid: GridSpec,
    statevector: StateVectorSpec,
    statevector_indices: Vec<usize>,
    namer: CacheKeyNamer,
    store: LutStore,
    scheduler: BuildScheduler,
    boundary: BoundaryPolicy,
    num_channels: Option<usize>,
}

impl TabularRt {
    /// Validate `config` and open its LUT directory.
    ///
    /// Every state vector element must also be a LUT grid axis.
    pub fn new(config: &TabularRtConfig) -> Result<Self> {
        let grid = GridSpec::new(&config.lut_grid)?;
        let statevector = StateVectorSpec::new(&config.statevector)?;

        let statevector_indices = statevector
            .names()
            .map(|name| {
                grid.axis_index(name).ok_or_else(|| {
                    LutError::config(format!(
                        "state vector element {name} has no LUT grid axis"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let namer = CacheKeyNamer::new(&grid, config.key_precision)?;
        let store = LutStore::open(
            &config.lut_path,
            &config.coefficients,
            &config.scratch_extensions,
        )?;
        let scheduler = BuildScheduler::new(config.simulator.clone())
            .configure_and_exit(config.configure_and_exit)
            .auto_rebuild(config.auto_rebuild)
            .max_workers(config.max_workers)
            .progress_interval(Duration::from_secs(config.progress_interval_secs.max(1)));

        info!(
            "LUT grid with {} axes and {} points at {}",
            grid.ndim(),
            grid.num_points(),
            store.root().display()
        );

        Ok(Self {
            grid,
            statevector,
            statevector_indices,
            namer,
            store,
            scheduler,
            boundary: config.boundary,
            num_channels: config.num_channels,
        })
    }

    /// The LUT grid.
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// The retrieved state vector.
    pub fn statevector(&self) -> &StateVectorSpec {
        &self.statevector
    }

    /// Grid axis of each state vector element, in state vector order.
    pub fn statevector_indices(&self) -> &[usize] {
        &self.statevector_indices
    }

    /// Cache key naming.
    pub fn namer(&self) -> &CacheKeyNamer {
        &self.namer
    }

    /// The on-disk cache.
    pub fn store(&self) -> &LutStore {
        &self.store
    }

    /// The build scheduler.
    pub fn scheduler(&self) -> &BuildScheduler {
        &self.scheduler
    }

    /// Bring the cache up to date and load it.
    ///
    /// Missing entries are simulated first; with `rebuild` every entry is. A
    /// build that leaves gaps (failed simulations, or automatic rebuilding
    /// turned off) fails here with [`LutError::IncompleteLut`].
    pub fn build_lut(&self, rebuild: bool) -> Result<BuildOutcome> {
        match self
            .scheduler
            .build(&self.grid, &self.namer, &self.store, rebuild)?
        {
            BuildStatus::Stopped { tasks } => Ok(BuildOutcome::Stopped {
                decks: tasks
                    .iter()
                    .map(|task| task.deck_path().to_path_buf())
                    .collect(),
            }),
            BuildStatus::Complete(report) => {
                if !report.failed.is_empty() {
                    warn!("{} LUT simulations failed", report.failed.len());
                }
                self.load().map(BuildOutcome::Ready)
            }
        }
    }

    /// Load the cache as it is, without building anything.
    pub fn load(&self) -> Result<Interpolator> {
        let interpolator = Interpolator::new(
            &self.store,
            &self.grid,
            &self.namer,
            self.store.coefficients(),
            self.boundary,
        )?;

        if let Some(expected) = self.num_channels {
            if interpolator.num_channels() != expected {
                return Err(LutError::config(format!(
                    "LUT entries have {} channels, expected {expected}",
                    interpolator.num_channels()
                )));
            }
        }
        Ok(interpolator)
    }

    /// Full LUT point for a state vector `x`, taking the remaining axes from
    /// `fixed` (indexed by grid axis).
    pub fn lut_point(&self, x: &[f64], fixed: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.statevector_indices.len() {
            return Err(LutError::DimensionMismatch {
                expected: self.statevector_indices.len(),
                actual: x.len(),
            });
        }
        if fixed.len() != self.grid.ndim() {
            return Err(LutError::DimensionMismatch {
                expected: self.grid.ndim(),
                actual: fixed.len(),
            });
        }
        let mut point = fixed.to_vec();
        for (&axis, &value) in self.statevector_indices.iter().zip(x) {
            point[axis] = value;
        }
        Ok(point)
    }

    /// One-line description of a state vector.
    pub fn summarize(&self, x: &[f64]) -> String {
        self.statevector.summarize(x)
    }
}
