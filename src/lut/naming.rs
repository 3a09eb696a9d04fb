//! Cache entry names.

use std::collections::HashSet;

use super::grid::GridSpec;
use crate::error::{LutError, Result};

/// Maps a grid point to the file name prefix of its cache entry.
///
/// A key reads like `H2OSTR-1.5000_AOT550-0.1000`: each axis name followed by
/// the coordinate at a fixed number of decimal places, joined with `_`.
#[derive(Debug, Clone)]
pub struct CacheKeyNamer {
    names: Vec<String>,
    precision: usize,
}

impl CacheKeyNamer {
    /// Create a namer for `grid`.
    ///
    /// Fails if two values on the same axis would print identically at
    /// `precision` decimal places, since their entries would then collide.
    pub fn new(grid: &GridSpec, precision: usize) -> Result<Self> {
        for axis in grid.axes() {
            let mut seen = HashSet::with_capacity(axis.values().len());
            for &value in axis.values() {
                let text = format_coord(value, precision);
                if !seen.insert(text) {
                    return Err(LutError::config(format!(
                        "LUT grid {} has values that are indistinguishable at {precision} decimal places",
                        axis.name()
                    )));
                }
            }
        }

        Ok(Self {
            names: grid.axis_names().map(str::to_owned).collect(),
            precision,
        })
    }

    /// Decimal places used for coordinates.
    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Cache key for the point with coordinates `coords`, given in axis order.
    ///
    /// The point doesn't have to be a grid vertex. Any coordinates that print
    /// the same as a vertex resolve to that vertex's entry.
    ///
    /// # Panics
    ///
    /// If `coords` doesn't have one coordinate per grid axis.
    pub fn key_for(&self, coords: &[f64]) -> String {
        assert_eq!(
            coords.len(),
            self.names.len(),
            "cache key needs one coordinate per LUT grid axis"
        );
        self.names
            .iter()
            .zip(coords)
            .map(|(name, &x)| format!("{name}-{}", format_coord(x, self.precision)))
            .collect::<Vec<_>>()
            .join("_")
    }
}

fn format_coord(x: f64, precision: usize) -> String {
    format!("{x:.precision$}")
}
