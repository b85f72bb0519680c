//! Scan-spec front end: batched license-text scans with a result cache and
//! CycloneDX-shaped license choices.

use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::error::ScanError;
use crate::identifier::{Options, identify};
use crate::licenses::LicenseLibrary;
use crate::normalizer::{Digest, NormalizedText};

/// Placeholder license name for a scan that passed without errors but
/// matched nothing.
pub const NOASSERTION: &str = "NOASSERTION";

/// A batch of scan specifications for one package manager / language.
#[derive(Debug, Clone, Default)]
pub struct ScanSpecs {
    /// Standard package manager name, e.g. "pypi" or "npm".
    pub package_manager: String,
    /// Programming language to search for.
    pub language: String,
    pub specs: Vec<ScanSpec>,
}

/// What to scan: a license text plus whatever identifying details the
/// caller has about the package or file it came from.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSpec {
    /// File or package name the text belongs to.
    pub name: String,
    /// Package version, when known.
    pub version: String,
    /// Where the file or package came from.
    pub location: String,
    /// Package URL, when known.
    pub purl: String,
    /// Pre-computed digest, when the caller already has one.
    pub hash: Option<Digest>,
    /// The license text to identify.
    pub license_text: String,
}

/// CycloneDX-style license reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycloneDxLicense {
    pub id: String,
    pub name: String,
    pub url: String,
    pub text: Option<AttachedText>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttachedText {
    pub content: String,
    pub content_type: String,
    pub encoding: String,
}

/// Either a single license or an SPDX expression, never both.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LicenseChoice {
    pub license: Option<CycloneDxLicense>,
    pub expression: String,
}

/// The outcome of scanning one spec.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    pub spec: ScanSpec,
    pub original_text: String,
    pub normalized_text: String,
    /// Digest of the normalized text; also the cache key.
    pub hash: Option<Digest>,
    /// Set when the scan failed (empty text, control characters, ...).
    pub error: Option<ScanError>,
    /// Matched licenses in id order, or the NOASSERTION placeholder.
    pub licenses: Vec<LicenseChoice>,
}

impl ScanSpecs {
    /// Scan every spec against `library`. Results are cached by normalized
    /// digest, so repeated texts skip matching entirely.
    pub fn scan_license_text(&self, library: &LicenseLibrary) -> Vec<ScanResult> {
        let mut cache: HashMap<Digest, ScanResult> = HashMap::new();
        self.specs
            .iter()
            .map(|spec| spec.scan_license_text(library, &mut cache))
            .collect()
    }
}

impl ScanSpec {
    /// Scan this spec's license text, consulting and updating `cache`.
    pub fn scan_license_text(
        &self,
        library: &LicenseLibrary,
        cache: &mut HashMap<Digest, ScanResult>,
    ) -> ScanResult {
        let mut result = ScanResult {
            spec: self.clone(),
            original_text: self.license_text.clone(),
            ..ScanResult::default()
        };

        let normalized = match NormalizedText::new(&self.license_text, false) {
            Ok(normalized) => normalized,
            Err(e) => {
                result.error = Some(e);
                return result;
            }
        };
        result.normalized_text = normalized.normalized.clone();
        result.hash = Some(normalized.digest.clone());

        if let Some(cached) = cache.get(&normalized.digest) {
            debug!("cache hit for {}", normalized.digest.md5);
            return cached.clone();
        }

        let identified = match identify(&Options::default(), library, &normalized) {
            Ok(identified) => identified,
            Err(e) => {
                result.error = Some(e);
                return result;
            }
        };

        if identified.matches.is_empty() {
            result.licenses.push(LicenseChoice {
                license: Some(CycloneDxLicense {
                    name: NOASSERTION.to_string(),
                    ..CycloneDxLicense::default()
                }),
                expression: String::new(),
            });
        } else {
            for id in identified.matches.keys() {
                // Composite ids from mutator composition are not library
                // entries; they carry no metadata beyond the id.
                let (name, url, text) = match library.get(id) {
                    Some(license) => {
                        let name = if license.info.family.is_empty() {
                            license.info.name.clone()
                        } else {
                            format!("{} ({})", license.info.name, license.info.family)
                        };
                        let text = if license.text.content.is_empty() {
                            None
                        } else {
                            Some(AttachedText {
                                content: license.text.content.clone(),
                                content_type: license.text.content_type.clone(),
                                encoding: license.text.encoding.clone(),
                            })
                        };
                        (name, license.urls.join(","), text)
                    }
                    None => (String::new(), String::new(), None),
                };
                result.licenses.push(LicenseChoice {
                    license: Some(CycloneDxLicense {
                        id: id.clone(),
                        name,
                        url,
                        text,
                    }),
                    expression: String::new(),
                });
            }
        }

        cache.insert(normalized.digest.clone(), result.clone());
        result
    }
}
