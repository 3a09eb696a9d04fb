//! LUT grid definition and enumeration.

use smallvec::SmallVec;

use crate::config::OrderedMap;
use crate::error::{LutError, Result};

/// Per-point storage. Most LUTs have well under 8 axes.
pub(crate) type Coords = SmallVec<[f64; 8]>;
pub(crate) type Indices = SmallVec<[usize; 8]>;

/// One discretized LUT dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAxis {
    name: String,
    values: Vec<f64>,
}

impl GridAxis {
    /// Parameter name, e.g. `H2OSTR`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Discretization values, strictly ascending.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Smallest and largest grid value.
    pub fn range(&self) -> (f64, f64) {
        (self.values[0], self.values[self.values.len() - 1])
    }
}

/// The N-dimensional grid the simulator is run on.
///
/// Every axis has at least two finite values in strictly ascending order.
/// Unsorted input is rejected rather than sorted, since the caller's ordering
/// is what the rest of the pipeline (and any existing cache) was built around.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    axes: Vec<GridAxis>,
}

/// A single vertex of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    index: Indices,
    coords: Coords,
}

impl GridPoint {
    /// Position along each axis.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Value on each axis, in axis order.
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }
}

impl GridSpec {
    /// Validate the configured axes, keeping their declared order.
    pub fn new(lut_grid: &OrderedMap<Vec<f64>>) -> Result<Self> {
        Self::from_axes(lut_grid.iter().map(|(name, values)| (name, values.clone())))
    }

    /// Build a grid from `(name, values)` pairs.
    pub fn from_axes<I, S>(axes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let axes = axes
            .into_iter()
            .map(|(name, values)| {
                let name = name.into();
                validate_axis(&name, &values)?;
                Ok(GridAxis { name, values })
            })
            .collect::<Result<Vec<_>>>()?;

        if axes.is_empty() {
            return Err(LutError::config("LUT grid has no axes"));
        }
        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].iter().any(|other| other.name == axis.name) {
                return Err(LutError::config(format!(
                    "LUT grid axis {} is declared twice",
                    axis.name
                )));
            }
        }

        Ok(Self { axes })
    }

    /// All axes in declaration order.
    pub fn axes(&self) -> &[GridAxis] {
        &self.axes
    }

    /// Axis names in declaration order.
    pub fn axis_names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(GridAxis::name)
    }

    /// Discretization values for the named axis.
    pub fn axis_values(&self, name: &str) -> Option<&[f64]> {
        self.axes
            .iter()
            .find(|axis| axis.name == name)
            .map(GridAxis::values)
    }

    /// Position of the named axis.
    pub fn axis_index(&self, name: &str) -> Option<usize> {
        self.axes.iter().position(|axis| axis.name == name)
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Length of each axis.
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(|axis| axis.values.len()).collect()
    }

    /// Total number of grid points.
    pub fn num_points(&self) -> usize {
        self.axes.iter().map(|axis| axis.values.len()).product()
    }

    /// The grid point at `index`, or `None` if any position is out of range.
    pub fn point_at(&self, index: &[usize]) -> Option<GridPoint> {
        if index.len() != self.axes.len() {
            return None;
        }
        let coords = self
            .axes
            .iter()
            .zip(index)
            .map(|(axis, &i)| axis.values.get(i).copied())
            .collect::<Option<Coords>>()?;
        Some(GridPoint {
            index: SmallVec::from_slice(index),
            coords,
        })
    }

    /// Enumerate every grid point.
    ///
    /// This is the cartesian product of the axes with the last axis varying
    /// fastest. The order is fixed: it decides which simulation runs are
    /// dispatched first and must agree between runs.
    pub fn points(&self) -> Points<'_> {
        Points {
            grid: self,
            next: Some(SmallVec::from_elem(0, self.axes.len())),
            remaining: self.num_points(),
        }
    }
}

fn validate_axis(name: &str, values: &[f64]) -> Result<()> {
    // Names end up in cache file names
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return Err(LutError::config(format!(
            "invalid LUT grid axis name {name:?}"
        )));
    }
    if values.len() < 2 {
        return Err(LutError::config(format!(
            "only {} value(s) in LUT grid {name}, at least 2 are needed to interpolate",
            values.len()
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(LutError::config(format!(
            "LUT grid {name} contains a non-finite value"
        )));
    }
    if values.windows(2).any(|w| w[0] >= w[1]) {
        return Err(LutError::config(format!(
            "LUT grid {name} needs strictly ascending order"
        )));
    }
    Ok(())
}

/// Iterator over the points of a [`GridSpec`], see [`GridSpec::points`].
#[derive(Debug, Clone)]
pub struct Points<'a> {
    grid: &'a GridSpec,
    next: Option<Indices>,
    remaining: usize,
}

impl Iterator for Points<'_> {
    type Item = GridPoint;

    fn next(&mut self) -> Option<GridPoint> {
        let index = self.next.take()?;
        let coords = self
            .grid
            .axes
            .iter()
            .zip(&index)
            .map(|(axis, &i)| axis.values[i])
            .collect();

        // Odometer step, carrying from the last axis towards the first
        let mut following = index.clone();
        let mut carried_out = true;
        for (axis, position) in self.grid.axes.iter().zip(following.iter_mut()).rev() {
            *position += 1;
            if *position < axis.values.len() {
                carried_out = false;
                break;
            }
            *position = 0;
        }
        if !carried_out {
            self.next = Some(following);
        }
        self.remaining -= 1;

        Some(GridPoint { index, coords })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Points<'_> {}
