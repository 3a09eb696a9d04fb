//! Python interface.
//!
//! The inversion that consumes the LUT runs in Python, so it gets a thin
//! wrapper here: build (or load) the LUT from a JSON configuration, then query
//! it with numpy arrays.

use numpy::{PyArray1, PyReadonlyArray1, ToPyArray};
use pyo3::exceptions::{PyOSError, PyValueError};
use pyo3::prelude::*;

use crate::config::TabularRtConfig;
use crate::error::LutError;
use crate::lut::{BuildOutcome, Interpolator, TabularRt};

impl From<LutError> for PyErr {
    fn from(e: LutError) -> Self {
        match e {
            LutError::Io { .. } => PyOSError::new_err(e.to_string()),
            LutError::Configuration { .. }
            | LutError::MissingCacheEntry { .. }
            | LutError::IncompleteLut { .. }
            | LutError::OutOfBoundsQuery { .. }
            | LutError::DimensionMismatch { .. }
            | LutError::UnknownCoefficient { .. }
            | LutError::InconsistentEntry { .. }
            | LutError::MalformedEntry { .. }
            | LutError::Deck { .. }
            | LutError::ThreadPool(_) => PyValueError::new_err(e.to_string()),
        }
    }
}

/// A loaded lookup table.
#[pyclass]
struct Lut {
    inner: Interpolator,
}

#[pymethods]
impl Lut {
    #[getter]
    fn coefficients(&self) -> Vec<String> {
        self.inner.coefficients().to_vec()
    }

    #[getter]
    fn axis_names(&self) -> Vec<String> {
        self.inner.grid().axis_names().map(str::to_owned).collect()
    }

    #[getter]
    fn num_channels(&self) -> usize {
        self.inner.num_channels()
    }

    /// Interpolated coefficient vector at `point`.
    fn interpolate<'py>(
        &self,
        py: Python<'py>,
        point: PyReadonlyArray1<'py, f64>,
        coefficient: &str,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let values = self.inner.interpolate(point.as_slice()?, coefficient)?;
        Ok(values.to_pyarray(py))
    }

    /// Interpolated vectors for several coefficients at the same `point`.
    fn interpolate_vector<'py>(
        &self,
        py: Python<'py>,
        point: PyReadonlyArray1<'py, f64>,
        coefficients: Vec<String>,
    ) -> PyResult<Vec<Bound<'py, PyArray1<f64>>>> {
        let values = self
            .inner
            .interpolate_vector(point.as_slice()?, &coefficients)?;
        Ok(values.iter().map(|v| v.to_pyarray(py)).collect())
    }
}

/// Build the LUT described by the JSON `config`, simulating whatever is
/// missing, and load it.
///
/// Returns `None` when the configuration asks to stop after writing the input
/// decks.
#[pyfunction]
#[pyo3(signature = (config, rebuild=false))]
fn build_lut(py: Python<'_>, config: &str, rebuild: bool) -> PyResult<Option<Lut>> {
    let config: TabularRtConfig =
        serde_json::from_str(config).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let rt = TabularRt::new(&config)?;

    // Simulations can take hours; don't hold the GIL for them
    match py.allow_threads(|| rt.build_lut(rebuild))? {
        BuildOutcome::Stopped { .. } => Ok(None),
        BuildOutcome::Ready(inner) => Ok(Some(Lut { inner })),
    }
}

/// A Python module implemented in Rust.
#[pymodule]
fn tabular_rt(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();

    m.add_function(wrap_pyfunction!(build_lut, m)?)?;
    m.add_class::<Lut>()?;
    Ok(())
}
