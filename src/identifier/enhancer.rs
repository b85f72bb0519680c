//! Optional annotations layered over segmented results: copyright
//! statements, acceptable text, flagged keywords, and empty blocks.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::identifier::{Block, IdentifierResults, PatternMatch};
use crate::licenses::LicenseLibrary;

/// Which enhancements a caller wants applied, and in this order:
/// copyrights, acceptable, keywords, notes, then empty blocks.
#[derive(Debug, Clone, Default)]
pub struct Enhancements {
    pub add_notes: String,
    pub add_text_blocks: bool,
    pub flag_acceptable: bool,
    pub flag_copyrights: bool,
    pub flag_keywords: bool,
}

pub const COPYRIGHT_LABEL: &str = "COPYRIGHT";
pub const ACCEPTABLE_LABEL: &str = "ACCEPTABLE";
pub const KEYWORD_LABEL: &str = "KEYWORD";

// The legacy pattern required one-or-more non-carriage-return chars after
// the copyright keyword; one whitespace (or more) is enough here.
static COPYRIGHT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[^a-z0-9\n]*(?:All rights reserved\.?\s*)?(?:[ \t]*(?:Copyright|Copr\.?|\(c\)|\u{A9}))+\s+[^\n\r]*(?:[^a-z0-9]*All rights reserved\.?)?",
    )
    .expect("static enhancer pattern")
});

static ALPHANUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9]+").expect("static enhancer pattern"));

static DEFAULT_KEYWORDS: &[&str] = &[
    r"public domain",
    r"Affero",
    r"[a-z]*gpl",
    r"[a-z-]*commercial[a-z]*",
    r"[a-z-]*licen[cs][a-z]*",
];

static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b{}", DEFAULT_KEYWORDS.join(r"|\b")))
        .expect("static enhancer pattern")
});

/// Apply the enabled enhancements to `results`, in order.
pub fn from_options(
    results: &mut IdentifierResults,
    enhancements: &Enhancements,
    library: &LicenseLibrary,
) {
    if enhancements.flag_copyrights {
        flag_copyrights(results);
    }
    if enhancements.flag_acceptable {
        flag_acceptable(results, library);
    }
    if enhancements.flag_keywords {
        flag_keywords(results);
    }
    if !enhancements.add_notes.is_empty() {
        results.notes = enhancements.add_notes.clone();
    }
    if enhancements.flag_acceptable {
        flag_empty_blocks(results);
    }
}

fn flag_copyrights(results: &mut IdentifierResults) {
    let found = identify_pattern_in_blocks(results, &COPYRIGHT_RE, COPYRIGHT_LABEL);
    results.copyright_statements = found;
}

fn flag_acceptable(results: &mut IdentifierResults, library: &LicenseLibrary) {
    // Acceptable text only means anything once some license matched.
    if results.matches.is_empty() {
        return;
    }
    for pattern in library.acceptable_patterns.values() {
        identify_pattern_in_blocks(results, pattern, ACCEPTABLE_LABEL);
    }
}

fn flag_keywords(results: &mut IdentifierResults) {
    let found = identify_pattern_in_blocks(results, &KEYWORD_RE, KEYWORD_LABEL);
    results.keyword_matches = found;
}

/// Label every unlabeled block without a single alphanumeric character as
/// acceptable; only runs when acceptable flagging was requested.
fn flag_empty_blocks(results: &mut IdentifierResults) {
    let mut offset = 0usize;
    for block in &mut results.blocks {
        let len = block.text.len();
        if block.matches.is_empty() && !ALPHANUMERIC_RE.is_match(&block.text) {
            block.matches = vec![ACCEPTABLE_LABEL.to_string()];
            results.acceptable_pattern_matches.push(PatternMatch {
                text: block.text.clone(),
                begins: offset,
                ends: offset + len.saturating_sub(1),
            });
        }
        offset += len;
    }
}

/// Run `pattern` over every unlabeled block, splitting each hit out into
/// its own block labeled `label`. Returns one [`PatternMatch`] per hit with
/// offsets relative to the whole original text.
fn identify_pattern_in_blocks(
    results: &mut IdentifierResults,
    pattern: &Regex,
    label: &str,
) -> Vec<PatternMatch> {
    let mut pattern_matches = Vec::new();
    let mut new_blocks: Vec<Block> = Vec::new();
    let mut offset = 0usize;

    for block in results.blocks.drain(..) {
        let text_len = block.text.len();

        // Blocks that already match anything are not searched again.
        if !block.matches.is_empty() {
            offset += text_len;
            new_blocks.push(block);
            continue;
        }

        let found: Vec<(usize, usize)> = pattern
            .find_iter(&block.text)
            .map(|m| (m.start(), m.end()))
            .collect();
        if found.is_empty() {
            offset += text_len;
            new_blocks.push(block);
            continue;
        }

        let mut prev = 0usize;
        for (start, end) in found {
            if start > prev {
                new_blocks.push(Block {
                    text: block.text[prev..start].to_string(),
                    matches: Vec::new(),
                });
            }
            let matched = &block.text[start..end];
            new_blocks.push(Block {
                text: matched.to_string(),
                matches: vec![label.to_string()],
            });
            pattern_matches.push(PatternMatch {
                text: matched.to_string(),
                begins: offset + start,
                ends: offset + end - 1,
            });
            prev = end;
        }
        if prev < text_len {
            new_blocks.push(Block {
                text: block.text[prev..].to_string(),
                matches: Vec::new(),
            });
        }
        offset += text_len;
    }

    results.blocks = new_blocks;
    pattern_matches
}
