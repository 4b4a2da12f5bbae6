//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into sessions and
//! collaborators. Nothing in the core reads process-wide environment variables; binaries read
//! them and hand the raw values to the `*_from_env_value` helpers below.

use crate::classifier::ClassificationThresholds;
use crate::constants::{CATALOG_FILENAME, DEFAULT_RECORDS_DIR};
use crate::sources::{JsonDirRecordSink, ReferenceSource, StaticReferenceSource, YamlDirReferenceSource};
use crate::{CdssError, CdssResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    reference_dir: Option<PathBuf>,
    records_dir: PathBuf,
    thresholds: ClassificationThresholds,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `reference_dir: None` selects the built-in reference tables.
    pub fn new(
        reference_dir: Option<PathBuf>,
        records_dir: PathBuf,
        thresholds: ClassificationThresholds,
    ) -> CdssResult<Self> {
        thresholds.validate()?;

        if records_dir.as_os_str().is_empty() {
            return Err(CdssError::InvalidInput("records_dir cannot be empty".into()));
        }

        Ok(Self {
            reference_dir,
            records_dir,
            thresholds,
        })
    }

    pub fn reference_dir(&self) -> Option<&Path> {
        self.reference_dir.as_deref()
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    pub fn thresholds(&self) -> &ClassificationThresholds {
        &self.thresholds
    }

    /// The reference source this configuration selects.
    pub fn reference_source(&self) -> CdssResult<Arc<dyn ReferenceSource>> {
        match &self.reference_dir {
            Some(dir) => Ok(Arc::new(YamlDirReferenceSource::new(dir.clone()))),
            None => Ok(Arc::new(StaticReferenceSource::builtin()?)),
        }
    }

    pub fn record_sink(&self) -> JsonDirRecordSink {
        JsonDirRecordSink::new(self.records_dir.clone())
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            reference_dir: None,
            records_dir: PathBuf::from(DEFAULT_RECORDS_DIR),
            thresholds: ClassificationThresholds::default(),
        }
    }
}

/// Parse the records directory from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_RECORDS_DIR`].
pub fn records_dir_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RECORDS_DIR))
}

/// Parse the reference-data directory from an optional string value.
///
/// `None` or empty/whitespace selects the built-in tables. A given directory must exist and
/// contain a catalog file; it is checked here, at startup, rather than on the first session.
pub fn reference_dir_from_env_value(value: Option<String>) -> CdssResult<Option<PathBuf>> {
    let Some(dir) = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
    else {
        return Ok(None);
    };

    if !dir.is_dir() {
        return Err(CdssError::InvalidInput(format!(
            "CDSS_REFERENCE_DIR {} is not a directory",
            dir.display()
        )));
    }
    if !dir.join(CATALOG_FILENAME).is_file() {
        return Err(CdssError::InvalidInput(format!(
            "CDSS_REFERENCE_DIR {} has no {CATALOG_FILENAME}",
            dir.display()
        )));
    }
    Ok(Some(dir))
}
