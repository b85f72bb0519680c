//! Resource readers for the SPDX and custom pattern sets.
//!
//! Each set is served either from the resources embedded in the binary or
//! from an external directory named in the [`Config`]. Both go through the
//! same reader so the loaders in this module's parent do not care where a
//! set lives. File paths double as stable keys (notably the template path
//! that binds prechecks to patterns), so they are plain strings.

use std::fs;
use std::path::PathBuf;

use include_dir::{Dir, include_dir};

use crate::config::Config;
use crate::error::ScanError;

static EMBEDDED_RESOURCES: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/resources");

const SPDX_DIR: &str = "spdx";
const CUSTOM_DIR: &str = "custom";
const TEMPLATE_DIR: &str = "template";
const PRECHECK_DIR: &str = "precheck";
const JSON_DIR: &str = "json";
const TESTDATA_DIR: &str = "testdata";
pub const LICENSE_PATTERNS_DIR: &str = "license_patterns";
pub const ACCEPTABLE_PATTERNS_DIR: &str = "acceptable_patterns";

/// One resource set, embedded or on disk.
#[derive(Debug, Clone)]
enum ResourceSource {
    /// Path of the set inside the embedded resources, e.g. `spdx/default`.
    Embedded(String),
    /// External directory holding the set.
    External(PathBuf),
}

impl ResourceSource {
    fn join(&self, parts: &[&str]) -> String {
        match self {
            ResourceSource::Embedded(base) => {
                let mut path = base.clone();
                for part in parts {
                    path.push('/');
                    path.push_str(part);
                }
                path
            }
            ResourceSource::External(base) => {
                let mut path = base.clone();
                for part in parts {
                    path.push(part);
                }
                path.display().to_string()
            }
        }
    }

    fn read_file(&self, parts: &[&str]) -> Result<String, ScanError> {
        let path = self.join(parts);
        match self {
            ResourceSource::Embedded(_) => {
                let file =
                    EMBEDDED_RESOURCES
                        .get_file(&path)
                        .ok_or_else(|| ScanError::ResourceNotFound {
                            path: path.clone(),
                        })?;
                file.contents_utf8()
                    .map(|s| s.to_string())
                    .ok_or_else(|| ScanError::ResourceMalformed {
                        path,
                        reason: "not valid UTF-8".to_string(),
                    })
            }
            ResourceSource::External(_) => {
                fs::read_to_string(&path).map_err(|e| ScanError::from_io(&path, &e))
            }
        }
    }

    /// Names of subdirectories directly under `parts`, sorted.
    fn dir_names(&self, parts: &[&str]) -> Result<Vec<String>, ScanError> {
        self.entry_names(parts, true)
    }

    /// Names of files directly under `parts`, sorted.
    fn file_names(&self, parts: &[&str]) -> Result<Vec<String>, ScanError> {
        self.entry_names(parts, false)
    }

    fn entry_names(&self, parts: &[&str], dirs: bool) -> Result<Vec<String>, ScanError> {
        let path = self.join(parts);
        let mut names = match self {
            ResourceSource::Embedded(_) => {
                let dir =
                    EMBEDDED_RESOURCES
                        .get_dir(&path)
                        .ok_or_else(|| ScanError::ResourceNotFound {
                            path: path.clone(),
                        })?;
                if dirs {
                    dir.dirs()
                        .filter_map(|d| {
                            d.path().file_name().map(|n| n.to_string_lossy().to_string())
                        })
                        .collect::<Vec<_>>()
                } else {
                    dir.files()
                        .filter_map(|f| {
                            f.path().file_name().map(|n| n.to_string_lossy().to_string())
                        })
                        .collect::<Vec<_>>()
                }
            }
            ResourceSource::External(_) => {
                let entries = fs::read_dir(&path).map_err(|e| ScanError::from_io(&path, &e))?;
                let mut names = Vec::new();
                for entry in entries {
                    let entry = entry.map_err(|e| ScanError::from_io(&path, &e))?;
                    let is_dir = entry.path().is_dir();
                    if is_dir == dirs {
                        names.push(entry.file_name().to_string_lossy().to_string());
                    }
                }
                names
            }
        };
        names.sort();
        Ok(names)
    }
}

/// Readers for the configured SPDX and custom resource sets.
#[derive(Debug, Clone)]
pub struct Resources {
    spdx: ResourceSource,
    custom: ResourceSource,
}

fn template_file_name(id: &str, is_deprecated: bool) -> String {
    if is_deprecated {
        format!("deprecated_{id}.template.txt")
    } else {
        format!("{id}.template.txt")
    }
}

fn text_file_name(id: &str, is_deprecated: bool) -> String {
    if is_deprecated {
        format!("deprecated_{id}.txt")
    } else {
        format!("{id}.txt")
    }
}

impl Resources {
    pub fn from_config(config: &Config) -> Resources {
        let spdx = match &config.spdx_path {
            Some(path) => ResourceSource::External(path.clone()),
            None => ResourceSource::Embedded(format!("{SPDX_DIR}/{}", config.spdx)),
        };
        let custom = match &config.custom_path {
            Some(path) => ResourceSource::External(path.clone()),
            None => ResourceSource::Embedded(format!("{CUSTOM_DIR}/{}", config.custom)),
        };
        Resources { spdx, custom }
    }

    /// Contents of `json/licenses.json` and `json/exceptions.json`.
    pub fn read_spdx_json_files(&self) -> Result<(String, String), ScanError> {
        let licenses = self.spdx.read_file(&[JSON_DIR, "licenses.json"])?;
        let exceptions = self.spdx.read_file(&[JSON_DIR, "exceptions.json"])?;
        Ok((licenses, exceptions))
    }

    pub fn spdx_template_path(&self, id: &str, is_deprecated: bool) -> String {
        self.spdx
            .join(&[TEMPLATE_DIR, &template_file_name(id, is_deprecated)])
    }

    /// Template contents plus the path used as the pattern key.
    pub fn read_spdx_template_file(
        &self,
        id: &str,
        is_deprecated: bool,
    ) -> Result<(String, String), ScanError> {
        let name = template_file_name(id, is_deprecated);
        let contents = self.spdx.read_file(&[TEMPLATE_DIR, &name])?;
        Ok((contents, self.spdx_template_path(id, is_deprecated)))
    }

    /// Canonical license text from `testdata/<id>.txt`. Some SPDX releases
    /// forget the `deprecated_` prefix here, so retry once without it.
    pub fn read_spdx_text_file(&self, id: &str, is_deprecated: bool) -> Result<String, ScanError> {
        let name = text_file_name(id, is_deprecated);
        match self.spdx.read_file(&[TESTDATA_DIR, &name]) {
            Ok(contents) => Ok(contents),
            Err(_) if is_deprecated => self
                .spdx
                .read_file(&[TESTDATA_DIR, &text_file_name(id, false)]),
            Err(e) => Err(e),
        }
    }

    /// `(id, contents)` of every precheck JSON in the SPDX set.
    pub fn spdx_precheck_entries(&self) -> Result<Vec<(String, String)>, ScanError> {
        let names = match self.spdx.file_names(&[PRECHECK_DIR]) {
            Ok(names) => names,
            // Prechecks are optional for an SPDX set.
            Err(ScanError::ResourceNotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut entries = Vec::new();
        for name in names {
            if let Some(id) = name.strip_suffix(".json") {
                let contents = self.spdx.read_file(&[PRECHECK_DIR, &name])?;
                entries.push((id.to_string(), contents));
            }
        }
        Ok(entries)
    }

    /// License ids (directory names) in the custom set.
    pub fn custom_license_pattern_ids(&self) -> Result<Vec<String>, ScanError> {
        self.custom.dir_names(&[LICENSE_PATTERNS_DIR])
    }

    /// `(file name, path, contents)` of every file in one custom license
    /// directory.
    pub fn custom_license_files(
        &self,
        id: &str,
    ) -> Result<Vec<(String, String, String)>, ScanError> {
        let names = self.custom.file_names(&[LICENSE_PATTERNS_DIR, id])?;
        let mut files = Vec::new();
        for name in names {
            let path = self.custom.join(&[LICENSE_PATTERNS_DIR, id, &name]);
            let contents = self.custom.read_file(&[LICENSE_PATTERNS_DIR, id, &name])?;
            files.push((name, path, contents));
        }
        Ok(files)
    }

    /// Path inside a custom license directory; used to bind prechecks.
    pub fn custom_license_file_path(&self, id: &str, name: &str) -> String {
        self.custom.join(&[LICENSE_PATTERNS_DIR, id, name])
    }

    /// `(pattern id, contents)` of every acceptable pattern. The directory
    /// is optional.
    pub fn custom_acceptable_patterns(&self) -> Result<Vec<(String, String)>, ScanError> {
        let names = match self.custom.file_names(&[ACCEPTABLE_PATTERNS_DIR]) {
            Ok(names) => names,
            Err(ScanError::ResourceNotFound { .. }) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut entries = Vec::new();
        for name in names {
            let id = match name.rsplit_once('.') {
                Some((stem, _ext)) => stem.to_string(),
                None => name.clone(),
            };
            let contents = self.custom.read_file(&[ACCEPTABLE_PATTERNS_DIR, &name])?;
            entries.push((id, contents));
        }
        Ok(entries)
    }
}
