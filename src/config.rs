//! Optional YAML configuration.
//!
//! Looked up in the scan root as `projscan.yaml` or `.projscan.yaml` unless a
//! path is given explicitly. Every field is optional; command-line flags win
//! over file values.
//!
//! ```yaml
//! ignore:
//!   - scratch
//! exclude_globs:
//!   - "**/*_pb2.py"
//! extensions: [py, rs]
//! workers: 8
//! deletion_policy: prune
//! categorize: true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use crate::report::DeletionPolicy;

/// Config file names searched for in the scan root, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["projscan.yaml", ".projscan.yaml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Extra paths to skip, relative to the scan root unless absolute.
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Glob patterns matched against root-relative paths.
    #[serde(default)]
    pub exclude_globs: Vec<String>,

    /// File extensions to analyze. Empty means every supported language.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Worker threads; 0 or absent means one per core.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Where the change cache lives.
    #[serde(default)]
    pub cache_file: Option<PathBuf>,

    /// Directory for the report and context export.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default)]
    pub deletion_policy: Option<DeletionPolicy>,

    #[serde(default)]
    pub categorize: Option<bool>,

    #[serde(default)]
    pub export_context: Option<bool>,

    #[serde(default)]
    pub generate_init: Option<bool>,
}

impl ScanConfig {
    /// Parse and validate a config file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ScanError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: ScanConfig = serde_yaml::from_str(&content).map_err(|e| ScanError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    /// First default-named config file present in `root`.
    pub fn discover(root: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.is_file())
    }

    /// Load an explicit config, or the discovered one, or defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover(root),
        };
        match path {
            Some(p) => Ok((Self::parse_file(&p)?, Some(p))),
            None => Ok((Self::default(), None)),
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        for pattern in &self.exclude_globs {
            globset::Glob::new(pattern).map_err(|e| ScanError::Config {
                path: path.to_path_buf(),
                message: format!("invalid exclude_globs pattern {:?}: {}", pattern, e),
            })?;
        }
        if let Some(ext) = self.extensions.iter().find(|e| e.contains(['/', '\\'])) {
            return Err(ScanError::Config {
                path: path.to_path_buf(),
                message: format!("invalid extension {:?}", ext),
            });
        }
        Ok(())
    }
}
