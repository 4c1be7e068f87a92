//! Run configuration: environment defaults, optionally overlaid by a JSON file.
//!
//! ```json
//! {
//!   "log_dir": "data/logs",
//!   "parallel_threshold": 50000
//! }
//! ```
//!
//! Every key is optional. CLI flags are applied on top by the binary.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::cleaning::DEFAULT_PARALLEL_THRESHOLD;
use crate::error::Result;

pub const LOG_DIR_ENV: &str = "TRIP_REFINERY_LOG_DIR";
pub const PARALLEL_THRESHOLD_ENV: &str = "TRIP_REFINERY_PARALLEL_THRESHOLD";
pub const DEFAULT_LOG_DIR: &str = "data/logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Directory for `rejection_log.csv` and the per-run exclusion reports.
    pub log_dir: PathBuf,
    pub parallel_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

/// On-disk shape; absent keys leave the current value alone.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    log_dir: Option<PathBuf>,
    parallel_threshold: Option<usize>,
}

impl PipelineConfig {
    /// Defaults overridden by `TRIP_REFINERY_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = var(LOG_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(raw) = var(PARALLEL_THRESHOLD_ENV) {
            match raw.trim().parse() {
                Ok(threshold) => config.parallel_threshold = threshold,
                Err(e) => warn!(
                    var = PARALLEL_THRESHOLD_ENV,
                    value = %raw,
                    error = %e,
                    "Ignoring unparsable parallel threshold"
                ),
            }
        }

        config
    }

    /// Overlays the JSON file at `path` onto `self`.
    pub fn merge_file(self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        self.merge_json(&content)
    }

    fn merge_json(mut self, content: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content)?;
        if let Some(dir) = file.log_dir {
            self.log_dir = dir;
        }
        if let Some(threshold) = file.parallel_threshold {
            self.parallel_threshold = threshold;
        }
        Ok(self)
    }

    /// Environment defaults, then the optional file on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::from_env();
        match path {
            Some(path) => config.merge_file(path),
            None => Ok(config),
        }
    }
}
