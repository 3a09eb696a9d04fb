//! On-disk cache of completed simulator runs.
//!
//! Every grid point owns one output bundle: a text file per coefficient named
//! `<key>.<coefficient>`, holding one value per wavelength channel separated
//! by whitespace. The simulator may leave other `<key>.*` by-products next to
//! them, which [`LutStore::cleanup`] removes.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use log::debug;

use crate::error::{LutError, Result};

/// Sub-directory holding one input deck per build task.
const DECK_DIR: &str = "decks";

/// State of a cache entry on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Every coefficient file exists and is non-empty
    Present,
    /// No coefficient file exists
    Absent,
    /// Some coefficient files are missing or empty, e.g. from an interrupted
    /// run
    Stale,
}

/// The persisted set of simulator outputs.
#[derive(Debug, Clone)]
pub struct LutStore {
    root: PathBuf,
    coefficients: Vec<String>,
    scratch_extensions: Vec<String>,
}

impl LutStore {
    /// Open (creating if needed) the store rooted at `root`.
    ///
    /// The root is made absolute here, so every path derived from the store
    /// stays valid whatever directory the simulator runs in.
    pub fn open(
        root: impl Into<PathBuf>,
        coefficients: &[String],
        scratch_extensions: &[String],
    ) -> Result<Self> {
        let root = root.into();

        if coefficients.is_empty() {
            return Err(LutError::config("no LUT coefficients configured"));
        }
        if let Some(name) = coefficients
            .iter()
            .find(|c| c.is_empty() || scratch_extensions.contains(c))
        {
            return Err(LutError::config(format!(
                "invalid LUT coefficient name {name:?}"
            )));
        }

        fs::create_dir_all(&root).map_err(|e| LutError::io(&root, e))?;
        let root = root.canonicalize().map_err(|e| LutError::io(&root, e))?;

        Ok(Self {
            root,
            coefficients: coefficients.to_vec(),
            scratch_extensions: scratch_extensions.to_vec(),
        })
    }

    /// Directory holding the entries.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Coefficients every entry must provide.
    pub fn coefficients(&self) -> &[String] {
        &self.coefficients
    }

    /// Output prefix a build task should target for `key`.
    pub fn write_path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Path of one coefficient file.
    pub fn coefficient_path(&self, key: &str, coefficient: &str) -> PathBuf {
        self.root.join(format!("{key}.{coefficient}"))
    }

    /// Path of the input deck for `key`.
    pub fn deck_path(&self, key: &str) -> PathBuf {
        self.root.join(DECK_DIR).join(format!("{key}.json"))
    }

    /// Check the state of an entry.
    pub fn lookup(&self, key: &str) -> CacheStatus {
        let mut found = 0;
        let mut complete = 0;
        for coefficient in &self.coefficients {
            if let Ok(meta) = fs::metadata(self.coefficient_path(key, coefficient)) {
                found += 1;
                if meta.is_file() && meta.len() > 0 {
                    complete += 1;
                }
            }
        }

        if complete == self.coefficients.len() {
            CacheStatus::Present
        } else if found == 0 {
            CacheStatus::Absent
        } else {
            CacheStatus::Stale
        }
    }

    /// Whether a complete output bundle for `key` is on disk.
    pub fn exists(&self, key: &str) -> bool {
        self.lookup(key) == CacheStatus::Present
    }

    /// Keys (from `keys`) whose entries aren't present.
    pub fn missing<'a, I>(&self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter()
            .filter(|key| !self.exists(key))
            .map(str::to_owned)
            .collect()
    }

    /// Load one coefficient vector for `key`.
    pub fn read(&self, key: &str, coefficient: &str) -> Result<Vec<f64>> {
        let path = self.coefficient_path(key, coefficient);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LutError::MissingCacheEntry {
                    key: key.to_owned(),
                    coefficient: coefficient.to_owned(),
                })
            }
            Err(e) => return Err(LutError::io(path, e)),
        };

        let values = text
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|e| LutError::MalformedEntry {
                    path: path.clone(),
                    reason: format!("{token:?}: {e}"),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if values.is_empty() {
            return Err(LutError::MalformedEntry {
                path,
                reason: "no values".to_owned(),
            });
        }
        Ok(values)
    }

    /// Write one coefficient vector for `key`.
    pub fn write(&self, key: &str, coefficient: &str, values: &[f64]) -> Result<()> {
        let path = self.coefficient_path(key, coefficient);
        let text: String = values.iter().map(|v| format!("{v}\n")).collect();
        fs::write(&path, text).map_err(|e| LutError::io(path, e))
    }

    /// Remove simulator by-products for `key`, keeping the coefficient files.
    ///
    /// Returns how many files were deleted. Running it again deletes nothing.
    pub fn cleanup(&self, key: &str) -> Result<usize> {
        let mut removed = 0;
        for extension in &self.scratch_extensions {
            let path = self.root.join(format!("{key}.{extension}"));
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("removed {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(LutError::io(path, e)),
            }
        }
        Ok(removed)
    }
}
