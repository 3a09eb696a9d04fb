//! Multilinear interpolation over a fully built LUT.

use log::{debug, info};
use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewD, Axis, IxDyn};
use smallvec::SmallVec;

use super::{grid::GridSpec, naming::CacheKeyNamer, store::LutStore};
use crate::config::BoundaryPolicy;
use crate::error::{LutError, Result};

/// Lower vertex index and fractional offset along one axis.
type Cell = SmallVec<[(usize, f64); 8]>;

/// In-memory LUT answering interpolation queries.
///
/// Each coefficient is held as an array with one dimension per grid axis (in
/// grid order) plus a trailing wavelength-channel dimension.
#[derive(Debug, Clone)]
pub struct Interpolator {
    grid: GridSpec,
    boundary: BoundaryPolicy,
    names: Vec<String>,
    tables: Vec<ArrayD<f64>>,
    num_channels: usize,
}

impl Interpolator {
    /// Load `coefficients` for every grid point from `store`.
    ///
    /// The store has to cover the whole grid; otherwise this fails with
    /// [`LutError::IncompleteLut`] listing every missing key.
    pub fn new<S: AsRef<str>>(
        store: &LutStore,
        grid: &GridSpec,
        namer: &CacheKeyNamer,
        coefficients: &[S],
        boundary: BoundaryPolicy,
    ) -> Result<Self> {
        let entries: Vec<_> = grid
            .points()
            .map(|point| (namer.key_for(point.coords()), point))
            .collect();

        let missing = store.missing(entries.iter().map(|(key, _)| key.as_str()));
        if !missing.is_empty() {
            return Err(LutError::IncompleteLut { missing });
        }

        let names: Vec<String> = coefficients
            .iter()
            .map(|name| name.as_ref().to_owned())
            .collect();
        if names.is_empty() {
            return Err(LutError::config("no LUT coefficients requested"));
        }

        let mut shape = grid.shape();
        let mut num_channels = None;
        let mut tables = Vec::with_capacity(names.len());

        for name in &names {
            let mut table: Option<ArrayD<f64>> = None;

            for (key, point) in &entries {
                let values = store.read(key, name)?;
                let expected = *num_channels.get_or_insert(values.len());
                if values.len() != expected {
                    return Err(LutError::InconsistentEntry {
                        key: key.clone(),
                        coefficient: name.clone(),
                        expected,
                        actual: values.len(),
                    });
                }

                let table = table.get_or_insert_with(|| {
                    shape.push(expected);
                    let table = ArrayD::zeros(IxDyn(&shape));
                    shape.pop();
                    table
                });

                let mut lane = table.view_mut();
                for &i in point.index() {
                    lane = lane.index_axis_move(Axis(0), i);
                }
                lane.assign(&ArrayView1::from(values.as_slice()));
            }

            // The grid always has at least one point, so the table exists
            if let Some(table) = table {
                tables.push(table);
            }
        }

        let num_channels = num_channels.unwrap_or(0);
        info!(
            "loaded {} LUT coefficient(s) over {} grid points, {num_channels} channels",
            names.len(),
            entries.len()
        );

        Ok(Self {
            grid: grid.clone(),
            boundary,
            names,
            tables,
            num_channels,
        })
    }

    /// Grid the tables are defined on.
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Loaded coefficient names.
    pub fn coefficients(&self) -> &[String] {
        &self.names
    }

    /// Length of each coefficient vector.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Raw table for one coefficient.
    pub fn table(&self, coefficient: &str) -> Result<ArrayViewD<'_, f64>> {
        self.table_index(coefficient).map(|i| self.tables[i].view())
    }

    /// Interpolate one coefficient vector at `point`.
    ///
    /// At a grid vertex the stored vector is returned exactly.
    pub fn interpolate(&self, point: &[f64], coefficient: &str) -> Result<Array1<f64>> {
        let table = self.table_index(coefficient)?;
        let cell = self.locate(point)?;
        Ok(self.blend(&self.tables[table], &cell))
    }

    /// Interpolate several coefficients at the same `point`, in the order of
    /// `coefficients`.
    pub fn interpolate_vector<S: AsRef<str>>(
        &self,
        point: &[f64],
        coefficients: &[S],
    ) -> Result<Vec<Array1<f64>>> {
        let tables = coefficients
            .iter()
            .map(|name| self.table_index(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let cell = self.locate(point)?;
        Ok(tables
            .into_iter()
            .map(|table| self.blend(&self.tables[table], &cell))
            .collect())
    }

    fn table_index(&self, coefficient: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|name| name == coefficient)
            .ok_or_else(|| LutError::UnknownCoefficient {
                name: coefficient.to_owned(),
            })
    }

    /// Find the enclosing cell of `point`, applying the boundary policy.
    fn locate(&self, point: &[f64]) -> Result<Cell> {
        if point.len() != self.grid.ndim() {
            return Err(LutError::DimensionMismatch {
                expected: self.grid.ndim(),
                actual: point.len(),
            });
        }

        self.grid
            .axes()
            .iter()
            .zip(point)
            .map(|(axis, &x)| {
                let values = axis.values();
                let (lo, hi) = axis.range();
                let out_of_bounds = || LutError::OutOfBoundsQuery {
                    axis: axis.name().to_owned(),
                    value: x,
                    lo,
                    hi,
                };

                if !x.is_finite() {
                    return Err(out_of_bounds());
                }
                let x = if x < lo || x > hi {
                    match self.boundary {
                        BoundaryPolicy::Reject => return Err(out_of_bounds()),
                        BoundaryPolicy::Clamp => {
                            debug!("clamping {} query {x} to [{lo}, {hi}]", axis.name());
                            x.clamp(lo, hi)
                        }
                    }
                } else {
                    x
                };

                let n = values.len();
                if n < 2 {
                    return Ok((0, 0.));
                }
                // Index of the lower vertex; the top vertex belongs to the last cell
                let upper = values.partition_point(|&v| v <= x);
                let i = upper.saturating_sub(1).min(n - 2);
                let t = (x - values[i]) / (values[i + 1] - values[i]);
                Ok((i, t))
            })
            .collect()
    }

    /// Weighted sum over the corners of `cell`.
    ///
    /// Corners with zero weight are skipped, so a query on a vertex reads
    /// exactly one stored vector and a length-1 axis never indexes past its
    /// end.
    fn blend(&self, table: &ArrayD<f64>, cell: &Cell) -> Array1<f64> {
        let mut out = Array1::zeros(self.num_channels);

        for corner in 0..(1_usize << cell.len()) {
            let mut weight = 1.;
            let mut lane = table.view();
            for (axis, &(i, t)) in cell.iter().enumerate() {
                let (index, w) = if (corner >> axis) & 1 == 1 {
                    (i + 1, t)
                } else {
                    (i, 1. - t)
                };
                weight *= w;
                if weight == 0. {
                    break;
                }
                lane = lane.index_axis_move(Axis(0), index);
            }
            if weight != 0. {
                out.scaled_add(weight, &lane);
            }
        }

        out
    }
}
