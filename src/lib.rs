//! # lichen
//!
//! A fast, template-driven scanner that identifies SPDX licenses in text,
//! files, and directory trees.
//!
//! Matching follows the SPDX matching guidelines: input and license
//! templates are both reduced to a canonical form, the templates are
//! compiled into matching expressions, and every hit is mapped back to its
//! position in the original text. Aliases (license names and ids) and
//! known URLs act as lightweight fallbacks when no template matches, and
//! per-template prechecks skip the expensive regexes for texts that cannot
//! possibly match.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lichen::config::Config;
//! use lichen::identifier::{Options, identify_licenses_in_string};
//! use lichen::licenses::LicenseLibrary;
//!
//! # fn main() -> Result<(), lichen::error::ScanError> {
//! let library = LicenseLibrary::load(&Config::default())?;
//! let results = identify_licenses_in_string(
//!     "Licensed under the Apache License, Version 2.0.",
//!     &Options::default(),
//!     &library,
//! )?;
//! for (id, spans) in &results.matches {
//!     println!("{id}: {} match(es)", spans.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`normalizer`]: canonical text form, index map back to the original,
//!   and content hashes
//! - [`licenses`]: the license library loaded from SPDX and custom
//!   resource sets, with template-to-regex compilation
//! - [`identifier`]: the matching engine, block segmentation, enhancers,
//!   and mutator composition
//! - [`scanner`]: batched scan specs with cached results and
//!   CycloneDX-shaped license choices
//! - [`cli`]: command-line interface implementation
//!
//! The library is built once and immutable afterwards, so a single
//! instance serves any number of concurrent scans; several libraries (for
//! example, different SPDX list versions) can coexist in one process.

pub mod cli;
pub mod config;
pub mod error;
pub mod identifier;
pub mod licenses;
pub mod normalizer;
pub mod scanner;

pub use config::Config;
pub use error::ScanError;
pub use identifier::{
    Enhancements, IdentifierResults, Options, identify, identify_licenses_in_directory,
    identify_licenses_in_file, identify_licenses_in_string,
};
pub use licenses::{License, LicenseLibrary};
pub use normalizer::{Digest, NormalizedText};
pub use scanner::{NOASSERTION, ScanResult, ScanSpec, ScanSpecs};
