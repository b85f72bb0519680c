//! Resource location configuration.
//!
//! A [`Config`] names the SPDX and custom pattern sets to load. Each set is
//! either a named subtree of the embedded resources (`spdx`/`custom` set
//! names) or an external directory (`spdx_path`/`custom_path`), with the
//! external path winning when both are present. Values come from a JSON
//! config file and/or command-line flags; flags override file settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ScanError;

pub const DEFAULT_RESOURCE: &str = "default";

/// Where to find the SPDX and custom resource sets.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Named SPDX set inside the embedded resources, e.g. "default".
    #[serde(default = "default_set")]
    pub spdx: String,

    /// External directory holding an SPDX set; overrides `spdx`.
    #[serde(default)]
    pub spdx_path: Option<PathBuf>,

    /// Named custom set inside the embedded resources, e.g. "default".
    #[serde(default = "default_set")]
    pub custom: String,

    /// External directory holding a custom set; overrides `custom`.
    #[serde(default)]
    pub custom_path: Option<PathBuf>,
}

fn default_set() -> String {
    DEFAULT_RESOURCE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            spdx: default_set(),
            spdx_path: None,
            custom: default_set(),
            custom_path: None,
        }
    }
}

impl Config {
    /// Read a config from a JSON file. Relative resource paths in the file
    /// are resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Config, ScanError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ScanError::from_io(&path.display().to_string(), &e))?;
        let mut config: Config =
            serde_json::from_str(&contents).map_err(|e| ScanError::ResourceMalformed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.spdx_path = config.spdx_path.map(|p| resolve_relative(base, p));
        config.custom_path = config.custom_path.map(|p| resolve_relative(base, p));
        Ok(config)
    }
}

fn resolve_relative(base: &Path, p: PathBuf) -> PathBuf {
    if p.is_absolute() { p } else { base.join(p) }
}
