//! The license library: every known license with its patterns, aliases,
//! URLs, prechecks, and metadata.
//!
//! The library is populated once from two sources and is immutable
//! afterwards, so it can be shared freely across scans and threads. The
//! SPDX source contributes the official templates and catalog metadata; the
//! custom source contributes additional patterns, aliases, URLs, and the
//! info records that drive mutator composition.

mod resources;
mod template;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::config::Config;
use crate::error::ScanError;

pub use resources::Resources;
pub use template::{CompiledPattern, LicensePattern, generate_regex_source};

const LICENSE_INFO_JSON: &str = "license_info.json";
const PRIMARY_PATTERN_PREFIX: &str = "license_";
const PRECHECKS_PREFIX: &str = "prechecks_";
const ASSOCIATED_PATTERN_PREFIX: &str = "associated_";
const OPTIONAL_PATTERN_PREFIX: &str = "optional_";

/// Accept a JSON string or array of strings as `Vec<String>`.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrSeq {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<StringOrSeq>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(StringOrSeq::One(s)) => vec![s],
        Some(StringOrSeq::Many(v)) => v,
    })
}

/// Descriptive metadata for one license, as stored in `license_info.json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LicenseInfo {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub family: String,

    #[serde(default)]
    pub spdx_standard: bool,

    #[serde(default)]
    pub spdx_exception: bool,

    #[serde(default)]
    pub osi_approved: bool,

    /// Do not derive an alias from the license id.
    #[serde(default)]
    pub ignore_id_match: bool,

    /// Do not derive an alias from the license name.
    #[serde(default)]
    pub ignore_name_match: bool,

    #[serde(default, deserialize_with = "string_or_seq")]
    pub aliases: Vec<String>,

    #[serde(default, deserialize_with = "string_or_seq")]
    pub urls: Vec<String>,

    /// Base licenses this mutator may combine with.
    #[serde(default, deserialize_with = "string_or_seq")]
    pub eligible_licenses: Vec<String>,

    /// True for exceptions and replacements that bind to a base license.
    #[serde(default)]
    pub is_mutator: bool,

    #[serde(default)]
    pub is_deprecated: bool,

    #[serde(default)]
    pub is_fsf_libre: bool,
}

/// Canonical license text attached to scan results when available.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct LicenseText {
    pub content: String,
    pub content_type: String,
    pub encoding: String,
}

/// One license with everything needed to match it.
#[derive(Debug, Clone, Default)]
pub struct License {
    /// SPDX license id if applicable, e.g. "Apache-2.0".
    pub spdx_id: String,
    pub info: LicenseInfo,
    /// A hit on any primary pattern counts as a license match.
    pub primary_patterns: Vec<Arc<LicensePattern>>,
    /// Run only after a primary/alias/URL hit; refine, never introduce.
    pub associated_patterns: Vec<Arc<LicensePattern>>,
    /// Lowercase literals matched with word boundaries.
    pub aliases: Vec<String>,
    /// Lowercase literals (scheme stripped) matched with URL boundaries.
    pub urls: Vec<String>,
    pub text: LicenseText,
}

impl License {
    pub fn id(&self) -> &str {
        if self.spdx_id.is_empty() {
            &self.info.name
        } else {
            &self.spdx_id
        }
    }
}

/// Substrings that must all be present before a pattern's regex runs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LicensePreChecks {
    #[serde(rename = "staticBlocks", default)]
    pub static_blocks: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpdxLicenseList {
    #[serde(default)]
    license_list_version: String,
    #[serde(default)]
    licenses: Vec<SpdxLicenseEntry>,
    #[serde(default)]
    exceptions: Vec<SpdxExceptionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpdxLicenseEntry {
    #[serde(default)]
    name: String,
    license_id: String,
    #[serde(default)]
    is_osi_approved: bool,
    #[serde(default)]
    is_fsf_libre: bool,
    #[serde(default)]
    is_deprecated_license_id: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpdxExceptionEntry {
    #[serde(default)]
    name: String,
    license_exception_id: String,
    #[serde(default)]
    is_deprecated_license_id: bool,
}

/// Immutable collection of all loadable licenses, shared by all scans.
#[derive(Debug, Default)]
pub struct LicenseLibrary {
    pub spdx_version: String,
    /// Licenses keyed by id; ordered so scans are deterministic.
    pub licenses: BTreeMap<String, License>,
    /// Prechecks keyed by the pattern file path they guard.
    pub prechecks: HashMap<String, LicensePreChecks>,
    /// Acceptable-text patterns for the enhancer, keyed by pattern id.
    pub acceptable_patterns: BTreeMap<String, Regex>,
}

/// One row of [`LicenseLibrary::listing`].
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseSummary {
    pub id: String,
    pub name: String,
    pub family: String,
    pub num_templates: usize,
    pub is_osi_approved: bool,
    pub is_fsf_libre: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionSummary {
    pub id: String,
    pub name: String,
    pub family: String,
    pub num_templates: usize,
}

/// The library split into licenses and exceptions, sorted by id.
#[derive(Debug, Default)]
pub struct LibraryListing {
    pub spdx_version: String,
    pub licenses: Vec<LicenseSummary>,
    pub deprecated_licenses: Vec<LicenseSummary>,
    pub exceptions: Vec<ExceptionSummary>,
    pub deprecated_exceptions: Vec<ExceptionSummary>,
}

impl LicenseLibrary {
    /// Build the full library for `config`. This is the only constructor;
    /// the returned library never changes.
    pub fn load(config: &Config) -> Result<LicenseLibrary, ScanError> {
        let resources = Resources::from_config(config);
        let mut library = LicenseLibrary::default();
        library.add_all(&resources)?;
        Ok(library)
    }

    pub fn get(&self, id: &str) -> Option<&License> {
        self.licenses.get(id)
    }

    /// Prechecks bound to a pattern file, if any.
    pub fn prechecks_for(&self, pattern_path: &str) -> Option<&LicensePreChecks> {
        self.prechecks.get(pattern_path)
    }

    fn add_all(&mut self, resources: &Resources) -> Result<(), ScanError> {
        match self.add_all_spdx(resources) {
            // A missing SPDX set is fine; the custom set may stand alone.
            Err(ScanError::ResourceNotFound { path }) => {
                debug!("no SPDX resource set ({path})");
            }
            Err(e) => return Err(e),
            Ok(()) => {}
        }
        self.add_all_custom(resources)
    }

    fn add_all_spdx(&mut self, resources: &Resources) -> Result<(), ScanError> {
        let (licenses_json, exceptions_json) = resources.read_spdx_json_files()?;
        let license_list = parse_spdx_list(&licenses_json, "licenses.json")?;
        let exceptions_list = parse_spdx_list(&exceptions_json, "exceptions.json")?;

        self.spdx_version = license_list.license_list_version;

        for entry in license_list.licenses {
            let id = entry.license_id;
            let deprecated = entry.is_deprecated_license_id;
            let (contents, path) = match resources.read_spdx_template_file(&id, deprecated) {
                Ok(read) => read,
                Err(ScanError::ResourceNotFound { path }) => {
                    debug!("skipping missing template file '{path}'");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut l = self.licenses.remove(&id).unwrap_or_default();
            l.primary_patterns
                .push(Arc::new(LicensePattern::new(contents, path)));
            l.spdx_id = id.clone();
            l.info.name = entry.name;
            l.info.spdx_standard = true;
            l.info.spdx_exception = false;
            l.info.is_deprecated = deprecated;
            l.info.osi_approved = entry.is_osi_approved;
            l.info.is_fsf_libre = entry.is_fsf_libre;
            self.attach_license_text(&mut l, resources, &id, deprecated);
            self.licenses.insert(id, l);
        }

        for entry in exceptions_list.exceptions {
            let id = entry.license_exception_id;
            let deprecated = entry.is_deprecated_license_id;
            let (contents, path) = match resources.read_spdx_template_file(&id, deprecated) {
                Ok(read) => read,
                Err(ScanError::ResourceNotFound { path }) => {
                    debug!("skipping missing template file '{path}'");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut l = self.licenses.remove(&id).unwrap_or_default();
            l.primary_patterns
                .push(Arc::new(LicensePattern::new(contents, path)));
            l.spdx_id = id.clone();
            l.info.name = entry.name;
            l.info.spdx_standard = true;
            l.info.spdx_exception = true;
            l.info.is_deprecated = deprecated;
            self.attach_license_text(&mut l, resources, &id, deprecated);
            self.licenses.insert(id, l);
        }

        for (id, contents) in resources.spdx_precheck_entries()? {
            let deprecated = self
                .licenses
                .get(&id)
                .map_or(false, |l| l.info.is_deprecated);
            let template_path = resources.spdx_template_path(&id, deprecated);
            self.add_prechecks(&contents, template_path)?;
        }

        Ok(())
    }

    fn attach_license_text(
        &self,
        license: &mut License,
        resources: &Resources,
        id: &str,
        is_deprecated: bool,
    ) {
        match resources.read_spdx_text_file(id, is_deprecated) {
            Ok(content) => {
                license.text = LicenseText {
                    content,
                    content_type: "text/plain".to_string(),
                    encoding: String::new(),
                };
            }
            Err(_) => debug!("no canonical text for '{id}'"),
        }
    }

    fn add_all_custom(&mut self, resources: &Resources) -> Result<(), ScanError> {
        for (id, source) in resources.custom_acceptable_patterns()? {
            self.add_acceptable_pattern(&id, &source)?;
        }
        debug!("loaded {} acceptable patterns", self.acceptable_patterns.len());

        let ids = match resources.custom_license_pattern_ids() {
            Ok(ids) => ids,
            // The custom set is optional.
            Err(ScanError::ResourceNotFound { path }) => {
                debug!("no custom resource set ({path})");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        for id in ids {
            self.add_custom_license(&id, resources)?;
        }
        debug!("loaded {} licenses", self.licenses.len());

        Ok(())
    }

    fn add_acceptable_pattern(&mut self, id: &str, source: &str) -> Result<(), ScanError> {
        if self.acceptable_patterns.contains_key(id) {
            return Err(ScanError::LibraryConflict(format!(
                "an acceptable pattern already exists with the id {id}"
            )));
        }
        let source = source.trim();
        let re = Regex::new(&format!("(?i){source}")).map_err(|e| ScanError::ResourceMalformed {
            path: id.to_string(),
            reason: e.to_string(),
        })?;
        self.acceptable_patterns.insert(id.to_string(), re);
        Ok(())
    }

    fn add_custom_license(&mut self, id: &str, resources: &Resources) -> Result<(), ScanError> {
        let existed = self.licenses.contains_key(id);
        let mut l = self.licenses.remove(id).unwrap_or_default();

        for (name, path, contents) in resources.custom_license_files(id)? {
            let lower_name = name.to_lowercase();

            if lower_name == LICENSE_INFO_JSON {
                self.apply_license_info(&mut l, id, existed, &path, &contents)?;
            } else if lower_name.starts_with(PRIMARY_PATTERN_PREFIX) {
                l.primary_patterns
                    .push(Arc::new(LicensePattern::new(contents, path)));
            } else if lower_name.starts_with(PRECHECKS_PREFIX) {
                // prechecks_<pattern>.json guards <pattern>.txt in this
                // directory.
                let source_file = name
                    .strip_prefix(PRECHECKS_PREFIX)
                    .unwrap_or(&name)
                    .to_string();
                let source_file = match source_file.rsplit_once('.') {
                    Some((stem, _ext)) => format!("{stem}.txt"),
                    None => format!("{source_file}.txt"),
                };
                let pattern_path = resources.custom_license_file_path(id, &source_file);
                self.add_prechecks(&contents, pattern_path)?;
            } else if lower_name.starts_with(ASSOCIATED_PATTERN_PREFIX)
                || lower_name.starts_with(OPTIONAL_PATTERN_PREFIX)
            {
                l.associated_patterns
                    .push(Arc::new(LicensePattern::new(contents, path)));
            } else {
                info!("found an invalid file name {path}");
            }
        }

        self.licenses.insert(id.to_string(), l);
        Ok(())
    }

    fn apply_license_info(
        &self,
        l: &mut License,
        id: &str,
        existed: bool,
        path: &str,
        contents: &str,
    ) -> Result<(), ScanError> {
        let mut payload: LicenseInfo =
            serde_json::from_str(contents).map_err(|e| ScanError::ResourceMalformed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        if l.spdx_id.is_empty() {
            if payload.spdx_standard {
                l.spdx_id = id.to_string();
            }
        } else if !payload.spdx_standard {
            return Err(ScanError::LibraryConflict(format!(
                "cannot add non-SPDX custom policies from {id} to existing SPDX license {}",
                l.spdx_id
            )));
        }

        // Aliases match against normalized text, so lower them here. The id
        // and name serve as aliases too unless the info record opts out.
        let mut aliases: Vec<String> = payload.aliases.iter().map(|a| a.to_lowercase()).collect();
        if !payload.ignore_id_match {
            aliases.push(id.to_lowercase());
        }
        if !payload.ignore_name_match && !payload.name.is_empty() {
            aliases.push(payload.name.to_lowercase());
        }
        l.aliases = aliases;

        // URLs are matched after the normalizer rewrote the input to http,
        // so the scheme is dropped entirely.
        l.urls = payload
            .urls
            .iter()
            .map(|u| {
                let stripped = u.split_once("://").map_or(u.as_str(), |(_, after)| after);
                stripped.to_lowercase()
            })
            .collect();

        if existed {
            // Merge with the existing SPDX attributes: the SPDX name wins,
            // boolean flags are OR-unions.
            if !l.info.name.is_empty() {
                payload.name = l.info.name.clone();
            }
            payload.spdx_standard |= l.info.spdx_standard;
            payload.spdx_exception |= l.info.spdx_exception;
            payload.is_deprecated |= l.info.is_deprecated;
            payload.osi_approved |= l.info.osi_approved;
            payload.is_fsf_libre |= l.info.is_fsf_libre;
        }
        l.info = payload;
        Ok(())
    }

    fn add_prechecks(&mut self, contents: &str, pattern_path: String) -> Result<(), ScanError> {
        let prechecks: LicensePreChecks =
            serde_json::from_str(contents).map_err(|e| ScanError::ResourceMalformed {
                path: pattern_path.clone(),
                reason: e.to_string(),
            })?;
        self.prechecks.insert(pattern_path, prechecks);
        Ok(())
    }

    /// Enumerate the library sorted by id, split into licenses and
    /// exceptions with their deprecated variants.
    pub fn listing(&self) -> LibraryListing {
        let mut listing = LibraryListing {
            spdx_version: self.spdx_version.clone(),
            ..LibraryListing::default()
        };

        for (id, l) in &self.licenses {
            if l.info.spdx_exception {
                let e = ExceptionSummary {
                    id: id.clone(),
                    name: l.info.name.clone(),
                    family: l.info.family.clone(),
                    num_templates: l.primary_patterns.len(),
                };
                if l.info.is_deprecated {
                    listing.deprecated_exceptions.push(e);
                } else {
                    listing.exceptions.push(e);
                }
            } else {
                let s = LicenseSummary {
                    id: id.clone(),
                    name: l.info.name.clone(),
                    family: l.info.family.clone(),
                    num_templates: l.primary_patterns.len(),
                    is_osi_approved: l.info.osi_approved,
                    is_fsf_libre: l.info.is_fsf_libre,
                };
                if l.info.is_deprecated {
                    listing.deprecated_licenses.push(s);
                } else {
                    listing.licenses.push(s);
                }
            }
        }

        listing
    }
}

fn parse_spdx_list(contents: &str, path: &str) -> Result<SpdxLicenseList, ScanError> {
    serde_json::from_str(contents).map_err(|e| ScanError::ResourceMalformed {
        path: path.to_string(),
        reason: e.to_string(),
    })
}
