//! License identification over normalized text.
//!
//! Every license in the library is tested against the input: prechecks
//! short-circuit the expensive template regexes, aliases and URLs act as
//! fallbacks with word-boundary rules, and associated patterns refine a hit
//! without ever introducing one. Match positions are translated back to the
//! original text through the normalizer's index map.

mod blocks;
mod debug;
mod enhancer;
mod mutators;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::ScanError;
use crate::licenses::{License, LicenseLibrary, LicensePattern};
use crate::normalizer::{Digest, NormalizedText};

pub use blocks::generate_text_blocks;
pub use debug::debug_license_match_failure;
pub use enhancer::{ACCEPTABLE_LABEL, COPYRIGHT_LABEL, Enhancements, KEYWORD_LABEL};

/// Parallelism degree for license and file fan-out.
const WORKER_LIMIT: usize = 10;

/// Files larger than this are rejected rather than scanned.
const MAX_FILE_SIZE: u64 = 1_000_000;

static POOL: Lazy<rayon::ThreadPool> = Lazy::new(|| {
    rayon::ThreadPoolBuilder::new()
        .num_threads(WORKER_LIMIT)
        .build()
        .expect("scanner worker pool")
});

/// Scan options; enhancements apply in their declared order.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub force_result: bool,
    pub omit_blocks: bool,
    pub enhancements: Enhancements,
}

/// Inclusive byte offsets into the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchSpan {
    pub begins: usize,
    pub ends: usize,
}

/// A pattern hit recorded by an enhancer, with its text and span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternMatch {
    pub text: String,
    pub begins: usize,
    pub ends: usize,
}

/// A contiguous slice of the original text and the labels covering it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Block {
    pub text: String,
    pub matches: Vec<String>,
}

/// Everything produced by one identification run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentifierResults {
    /// License id to the sorted, de-duplicated spans it matched.
    pub matches: BTreeMap<String, Vec<MatchSpan>>,
    pub blocks: Vec<Block>,
    /// Path of the scanned file, when the scan came from one.
    pub file: String,
    pub original_text: String,
    pub normalized_text: String,
    pub hash: Digest,
    pub notes: String,
    pub acceptable_pattern_matches: Vec<PatternMatch>,
    pub keyword_matches: Vec<PatternMatch>,
    pub copyright_statements: Vec<PatternMatch>,
}

/// Results of a directory scan: everything that scanned cleanly, plus the
/// first error encountered (if any).
#[derive(Debug, Default)]
pub struct DirectoryResults {
    pub results: Vec<IdentifierResults>,
    pub error: Option<ScanError>,
}

/// Identify licenses in already-normalized input.
pub fn identify(
    options: &Options,
    library: &LicenseLibrary,
    normalized: &NormalizedText,
) -> Result<IdentifierResults, ScanError> {
    let mut results = find_all_licenses(library, normalized)?;

    enhancer::from_options(&mut results, &options.enhancements, library);
    mutators::apply_mutator_licenses(&library.licenses, &mut results)?;

    if options.omit_blocks {
        results.blocks.clear();
    }

    Ok(results)
}

/// Normalize `input` and identify licenses in it.
pub fn identify_licenses_in_string(
    input: &str,
    options: &Options,
    library: &LicenseLibrary,
) -> Result<IdentifierResults, ScanError> {
    let normalized = NormalizedText::new(input, false)?;
    identify(options, library, &normalized)
}

/// Read one file (up to [`MAX_FILE_SIZE`] bytes) and identify licenses.
pub fn identify_licenses_in_file(
    path: &Path,
    options: &Options,
    library: &LicenseLibrary,
) -> Result<IdentifierResults, ScanError> {
    let display = path.display().to_string();
    let metadata = fs::metadata(path).map_err(|e| ScanError::from_io(&display, &e))?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(ScanError::InvalidInput(format!(
            "file too large ({} > {MAX_FILE_SIZE})",
            metadata.len()
        )));
    }

    let bytes = fs::read(path).map_err(|e| ScanError::from_io(&display, &e))?;
    let input = String::from_utf8_lossy(&bytes);

    let mut results = identify_licenses_in_string(&input, options, library)?;
    results.file = display;
    Ok(results)
}

/// Walk `dir_path` and identify licenses in every non-empty file, in
/// parallel. Files that scan cleanly land in `results`; the first error is
/// kept alongside them.
pub fn identify_licenses_in_directory(
    dir_path: &Path,
    options: &Options,
    library: &LicenseLibrary,
) -> DirectoryResults {
    let mut files = Vec::new();
    if let Err(e) = collect_files(dir_path, &mut files) {
        return DirectoryResults {
            results: Vec::new(),
            error: Some(e),
        };
    }
    files.sort();

    let outcomes: Vec<Result<IdentifierResults, ScanError>> = POOL.install(|| {
        files
            .par_iter()
            .map(|file| identify_licenses_in_file(file, options, library))
            .collect()
    });

    let mut scan = DirectoryResults::default();
    for outcome in outcomes {
        match outcome {
            Ok(results) => scan.results.push(results),
            Err(e) => {
                if scan.error.is_none() {
                    scan.error = Some(e);
                }
            }
        }
    }
    scan
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ScanError> {
    let display = dir.display().to_string();
    let entries = fs::read_dir(dir).map_err(|e| ScanError::from_io(&display, &e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ScanError::from_io(&display, &e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            let size = entry
                .metadata()
                .map_err(|e| ScanError::from_io(&display, &e))?
                .len();
            if size > 0 {
                files.push(path);
            }
        }
    }
    Ok(())
}

fn find_all_licenses(
    library: &LicenseLibrary,
    normalized: &NormalizedText,
) -> Result<IdentifierResults, ScanError> {
    let mut results = IdentifierResults {
        original_text: normalized.original.clone(),
        normalized_text: normalized.normalized.clone(),
        hash: normalized.digest.clone(),
        ..IdentifierResults::default()
    };

    let entries: Vec<(&String, &License)> = library.licenses.iter().collect();
    let per_license: Vec<(String, Vec<MatchSpan>)> = POOL.install(|| {
        entries
            .par_iter()
            .map(|&(id, license)| {
                find_license_in_normalized_data(license, normalized, library)
                    .map(|spans| (id.clone(), spans))
            })
            .collect::<Result<Vec<_>, ScanError>>()
    })?;

    // Flatten to the block-generation list. Licenses were walked in id
    // order and each span list is sorted, so a stable positional sort keeps
    // the whole thing deterministic.
    let mut flat: Vec<(String, MatchSpan)> = Vec::new();
    for (id, mut spans) in per_license {
        spans.sort_by(|a, b| a.begins.cmp(&b.begins).then(a.ends.cmp(&b.ends)));
        spans.dedup();
        if spans.is_empty() {
            continue;
        }
        results.matches.insert(id.clone(), spans.clone());
        for span in spans {
            flat.push((id.clone(), span));
        }
    }
    flat.sort_by(|a, b| {
        a.1.begins
            .cmp(&b.1.begins)
            .then(a.1.ends.cmp(&b.1.ends))
    });

    results.blocks = generate_text_blocks(&normalized.original, &flat);
    Ok(results)
}

fn find_license_in_normalized_data(
    license: &License,
    normalized: &NormalizedText,
    library: &LicenseLibrary,
) -> Result<Vec<MatchSpan>, ScanError> {
    let mut matches = find_patterns(&license.primary_patterns, normalized, Vec::new(), library)?;

    // Aliases and URLs are fallbacks; a pattern hit wins.
    if matches.is_empty() {
        matches = find_any_alias(&license.aliases, normalized, matches);
    }
    if matches.is_empty() {
        matches = find_any_url(&license.urls, normalized, matches);
    }
    if matches.is_empty() {
        return Ok(matches);
    }

    // Associated patterns refine an existing hit.
    find_patterns(&license.associated_patterns, normalized, matches, library)
}

fn find_patterns(
    patterns: &[Arc<LicensePattern>],
    normalized: &NormalizedText,
    mut matches: Vec<MatchSpan>,
    library: &LicenseLibrary,
) -> Result<Vec<MatchSpan>, ScanError> {
    for pattern in patterns {
        if let Some(prechecks) = library.prechecks_for(&pattern.file) {
            if !passed_static_blocks_checks(&prechecks.static_blocks, normalized) {
                continue;
            }
        }

        let compiled = pattern.compiled()?;
        for m in compiled.re.find_iter(&normalized.normalized) {
            // A fully-optional template can match empty; that is not a hit.
            if m.start() == m.end() {
                continue;
            }
            matches.push(pattern_span(m.start(), m.end(), normalized));
        }
    }
    Ok(matches)
}

/// All static blocks must be present before a pattern's regex is worth
/// running.
pub fn passed_static_blocks_checks(static_blocks: &[String], normalized: &NormalizedText) -> bool {
    static_blocks
        .iter()
        .all(|block| normalized.normalized.contains(block.as_str()))
}

/// Map a normalized `[start, end)` pattern match to original offsets.
fn pattern_span(start: usize, end: usize, normalized: &NormalizedText) -> MatchSpan {
    let map = &normalized.index_map;
    let ends = if end < map.len() {
        map[end - 1]
    } else {
        map[map.len() - 1]
    };
    MatchSpan {
        begins: map[start].max(0) as usize,
        ends: ends.max(0) as usize,
    }
}

/// Find the first alias or URL hit that satisfies the boundary rules.
fn find_any(
    candidates: &[String],
    normalized: &NormalizedText,
    is_url: bool,
    mut matches: Vec<MatchSpan>,
) -> Vec<MatchSpan> {
    for candidate in candidates {
        if candidate.is_empty() {
            continue;
        }
        let text = normalized.normalized.as_str();
        let mut next = 0usize;
        while let Some(pos) = text[next..].find(candidate.as_str()) {
            let i = next + pos;
            next = i + 1;
            while next < text.len() && !text.is_char_boundary(next) {
                next += 1;
            }

            if let Some((begin, end)) = find_boundaries(i, candidate, normalized, is_url) {
                let map = &normalized.index_map;
                let ends = if end < map.len() {
                    map[end]
                } else {
                    map[map.len() - 1]
                };
                matches.push(MatchSpan {
                    begins: map[begin].max(0) as usize,
                    ends: ends.max(0) as usize,
                });
                return matches;
            }
        }
    }
    matches
}

fn find_any_alias(
    aliases: &[String],
    normalized: &NormalizedText,
    matches: Vec<MatchSpan>,
) -> Vec<MatchSpan> {
    find_any(aliases, normalized, false, matches)
}

fn find_any_url(
    urls: &[String],
    normalized: &NormalizedText,
    matches: Vec<MatchSpan>,
) -> Vec<MatchSpan> {
    find_any(urls, normalized, true, matches)
}

fn find_boundaries(
    start: usize,
    candidate: &str,
    normalized: &NormalizedText,
    is_url: bool,
) -> Option<(usize, usize)> {
    let begin = find_begin_boundary(start, normalized, is_url)?;
    let end = find_end_boundary(start, candidate, normalized, is_url)?;
    Some((begin, end))
}

fn find_begin_boundary(start: usize, normalized: &NormalizedText, is_url: bool) -> Option<usize> {
    // Position zero is always an ok boundary.
    if start == 0 {
        return Some(0);
    }
    let text = normalized.normalized.as_bytes();
    let mut begin = start;

    // URLs absorb their https?://(www.)? prefix into the match.
    if is_url {
        begin = include_url_prefix(begin, text);
        if begin == 0 {
            return Some(0);
        }
    }

    begin -= 1;
    if begin == 0 {
        return Some(0);
    }

    let mut c = text[begin];
    if c == b'(' {
        begin -= 1;
        if begin == 0 {
            return Some(0);
        }
        c = text[begin];
    }

    // Anything except a-z0-9 is a word boundary.
    if c.is_ascii_lowercase() || c.is_ascii_digit() {
        return None;
    }
    Some(begin)
}

fn find_end_boundary(
    start: usize,
    candidate: &str,
    normalized: &NormalizedText,
    is_url: bool,
) -> Option<usize> {
    let text = normalized.normalized.as_bytes();
    let max = text.len();
    let mut end = start + candidate.len();

    if end >= max {
        return Some(end);
    }

    // URLs extend over trailing path fragments.
    if is_url {
        while end < max {
            let c = text[end];
            if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, b'.' | b'-' | b'_' | b'/')
            {
                end += 1;
            } else {
                break;
            }
        }
    }

    if end < max && text[end] == b')' {
        end += 1;
    }

    if end < max {
        let c = text[end];
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            return None;
        }
    }
    Some(end)
}

/// Extend a URL match leftwards over `www.` and `http://` prefixes. The
/// normalizer already rewrote https to http, and URL list entries are cut
/// at `://`.
fn include_url_prefix(begin: usize, text: &[u8]) -> usize {
    let mut begin = begin;

    let www = b"www.";
    if begin >= www.len() && &text[begin - www.len()..begin] == www {
        begin -= www.len();
    }

    let http = b"http://";
    if begin >= http.len() && &text[begin - http.len()..begin] == http {
        begin -= http.len();
    }
    begin
}
