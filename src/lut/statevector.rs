//! Free parameters retrieved by the inversion.

use crate::config::{OrderedMap, StateElementConfig};
use crate::error::{LutError, Result};

/// Bounds, scaling and prior for one free parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct StateElement {
    name: String,
    bounds: (f64, f64),
    scale: f64,
    init: f64,
    prior_mean: f64,
    prior_sigma: f64,
}

impl StateElement {
    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `(lo, hi)` bounds.
    pub fn bounds(&self) -> (f64, f64) {
        self.bounds
    }

    /// Scaling applied by the optimizer.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Initial guess.
    pub fn init(&self) -> f64 {
        self.init
    }

    /// Prior mean.
    pub fn prior_mean(&self) -> f64 {
        self.prior_mean
    }

    /// Prior standard deviation.
    pub fn prior_sigma(&self) -> f64 {
        self.prior_sigma
    }
}

/// The validated state vector, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct StateVectorSpec {
    elements: Vec<StateElement>,
}

impl StateVectorSpec {
    /// Validate the configured elements.
    pub fn new(statevector: &OrderedMap<StateElementConfig>) -> Result<Self> {
        let elements = statevector
            .iter()
            .map(|(name, element)| {
                let [lo, hi] = element.bounds;
                let values = [
                    lo,
                    hi,
                    element.scale,
                    element.init,
                    element.prior_mean,
                    element.prior_sigma,
                ];
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(LutError::config(format!(
                        "state vector element {name} has a non-finite setting"
                    )));
                }
                if lo > hi {
                    return Err(LutError::config(format!(
                        "state vector element {name} has bounds [{lo}, {hi}] in the wrong order"
                    )));
                }
                if !(lo..=hi).contains(&element.init) {
                    return Err(LutError::config(format!(
                        "state vector element {name} starts at {} outside its bounds [{lo}, {hi}]",
                        element.init
                    )));
                }

                Ok(StateElement {
                    name: name.to_owned(),
                    bounds: (lo, hi),
                    scale: element.scale,
                    init: element.init,
                    prior_mean: element.prior_mean,
                    prior_sigma: element.prior_sigma,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { elements })
    }

    /// All elements.
    pub fn elements(&self) -> &[StateElement] {
        &self.elements
    }

    /// Element names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(StateElement::name)
    }

    /// Look up an element by name.
    pub fn get(&self, name: &str) -> Option<&StateElement> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the state vector is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Initial guess for every element.
    pub fn init(&self) -> Vec<f64> {
        self.elements.iter().map(|e| e.init).collect()
    }

    /// Prior mean for every element.
    pub fn prior_mean(&self) -> Vec<f64> {
        self.elements.iter().map(|e| e.prior_mean).collect()
    }

    /// Prior sigma for every element.
    pub fn prior_sigma(&self) -> Vec<f64> {
        self.elements.iter().map(|e| e.prior_sigma).collect()
    }

    /// Scale for every element.
    pub fn scale(&self) -> Vec<f64> {
        self.elements.iter().map(|e| e.scale).collect()
    }

    /// Bounds for every element.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.elements.iter().map(|e| e.bounds).collect()
    }

    /// Check that `x` lies inside every element's bounds.
    pub fn check_admissible(&self, x: &[f64]) -> Result<()> {
        if x.len() != self.elements.len() {
            return Err(LutError::DimensionMismatch {
                expected: self.elements.len(),
                actual: x.len(),
            });
        }
        for (element, &value) in self.elements.iter().zip(x) {
            let (lo, hi) = element.bounds;
            if !(lo..=hi).contains(&value) {
                return Err(LutError::OutOfBoundsQuery {
                    axis: element.name.clone(),
                    value,
                    lo,
                    hi,
                });
            }
        }
        Ok(())
    }

    /// Clamp each value of `x` into its element's bounds.
    pub fn clamp(&self, x: &[f64]) -> Vec<f64> {
        self.elements
            .iter()
            .zip(x)
            .map(|(element, &value)| value.clamp(element.bounds.0, element.bounds.1))
            .collect()
    }

    /// One-line description of a state, e.g. `Atmosphere: H2OSTR: 1.500`.
    ///
    /// Empty if `x` is empty.
    pub fn summarize(&self, x: &[f64]) -> String {
        if x.is_empty() {
            return String::new();
        }
        let fields: Vec<_> = self
            .elements
            .iter()
            .zip(x)
            .map(|(element, value)| format!("{}: {value:5.3}", element.name))
            .collect();
        format!("Atmosphere: {}", fields.join(" "))
    }
}
