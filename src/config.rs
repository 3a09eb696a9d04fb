//! Declarative configuration for a tabular RT model.
//!
//! The structures here are deserialized from data that an external loader has
//! already parsed (typically with `serde_json::from_value`). Any keys this
//! crate doesn't know about are ignored, so the same block can carry settings
//! meant for the simulator's own template.

use std::{fmt, marker::PhantomData, path::PathBuf};

use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer,
};

/// Coefficients written by the simulator for each grid point, unless
/// configured otherwise.
pub const DEFAULT_COEFFICIENTS: [&str; 4] = ["rhoatm", "transm", "sphalb", "transup"];

/// Simulator by-products that are deleted once an entry is built.
pub const DEFAULT_SCRATCH_EXTENSIONS: [&str; 8] =
    ["r_k", "t_k", "tp7", "wrn", "psc", "plt", "7sc", "acd"];

/// A string-keyed map that keeps declaration order.
///
/// Axis order matters for grid enumeration and cache naming, so the order the
/// keys were written in is preserved. Duplicate keys are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    /// Iterate over the entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map with string keys")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries: Vec<(String, V)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(serde::de::Error::custom(format!("duplicate key {key}")));
            }
            entries.push((key, value));
        }
        Ok(OrderedMap(entries))
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Prior and search settings for one free parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateElementConfig {
    /// Lower and upper bound, `[lo, hi]`
    pub bounds: [f64; 2],
    /// Scaling applied by the optimizer
    pub scale: f64,
    /// Initial guess
    pub init: f64,
    /// Prior mean
    pub prior_mean: f64,
    /// Prior standard deviation
    pub prior_sigma: f64,
}

/// External simulator invocation.
///
/// Each run is `program args... <deck>`, executed in the LUT directory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatorConfig {
    /// Executable to launch
    pub program: PathBuf,
    /// Arguments placed before the input deck path
    #[serde(default)]
    pub args: Vec<String>,
}

/// What to do with a query outside the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Pull the coordinate back onto the nearest grid edge
    #[default]
    Clamp,
    /// Fail with [`crate::LutError::OutOfBoundsQuery`]
    Reject,
}

/// Full configuration of a tabular RT model.
#[derive(Debug, Clone, Deserialize)]
pub struct TabularRtConfig {
    /// Directory holding the cache entries
    pub lut_path: PathBuf,
    /// Discretization values per LUT axis, in axis order
    pub lut_grid: OrderedMap<Vec<f64>>,
    /// Free parameters retrieved by the inversion
    pub statevector: OrderedMap<StateElementConfig>,
    /// Simulator used to fill missing entries
    #[serde(default)]
    pub simulator: Option<SimulatorConfig>,
    /// Coefficient files each entry must provide
    #[serde(default = "default_coefficients")]
    pub coefficients: Vec<String>,
    /// Write the input decks and stop without simulating
    #[serde(default)]
    pub configure_and_exit: bool,
    /// Run the simulator for missing entries
    #[serde(default = "default_auto_rebuild")]
    pub auto_rebuild: bool,
    /// Decimal places used for coordinates in cache keys
    #[serde(default = "default_key_precision")]
    pub key_precision: usize,
    /// Cap on concurrent simulator processes, or every core if unset
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Handling of queries outside the grid
    #[serde(default)]
    pub boundary: BoundaryPolicy,
    /// Extensions of simulator by-products to delete after a build
    #[serde(default = "default_scratch_extensions")]
    pub scratch_extensions: Vec<String>,
    /// Expected length of each coefficient vector (wavelength channels)
    #[serde(default)]
    pub num_channels: Option<usize>,
    /// Seconds between progress messages during a build
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
}

fn default_coefficients() -> Vec<String> {
    DEFAULT_COEFFICIENTS.iter().map(|s| s.to_string()).collect()
}

fn default_scratch_extensions() -> Vec<String> {
    DEFAULT_SCRATCH_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_auto_rebuild() -> bool {
    true
}

fn default_key_precision() -> usize {
    4
}

fn default_progress_interval() -> u64 {
    5
}
