//! Template-to-regex compilation.
//!
//! A license template arrives here already normalized (with
//! `is_template=true`), so markup has been reduced to `<<omitable>>`,
//! `<</omitable>>`, `<<copyright>>`, and `<<REGEX>>` variable slots. This
//! module turns that into a single matching expression: literal runs are
//! escaped, each `<<S>>` slot becomes a capture group that tolerates
//! surrounding spaces, and omitable regions become optional groups.
//! Compilation happens at most once per pattern and is shared thereafter.

use std::sync::OnceLock;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ScanError;
use crate::normalizer::{CaptureGroup, NormalizedText};

static POINTY_SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" *<<(.*?)>> *").expect("static template pattern"));
static REGEX_UNSAFE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\\.*+?^${}()|\[\]])").expect("static template pattern"));

/// A license pattern: template source text plus its lazily compiled regex.
#[derive(Debug)]
pub struct LicensePattern {
    /// Raw template text as read from the resource set.
    pub source: String,
    /// Resource path of the template; also the key binding prechecks.
    pub file: String,
    compiled: OnceLock<Result<CompiledPattern, String>>,
}

/// The compiled form of a [`LicensePattern`].
#[derive(Debug)]
pub struct CompiledPattern {
    pub re: Regex,
    pub capture_groups: Vec<CaptureGroup>,
}

impl LicensePattern {
    pub fn new(source: impl Into<String>, file: impl Into<String>) -> Self {
        LicensePattern {
            source: source.into(),
            file: file.into(),
            compiled: OnceLock::new(),
        }
    }

    /// Normalize and compile the template, once. Concurrent first use is
    /// serialized; later calls are lock-free reads.
    pub fn compiled(&self) -> Result<&CompiledPattern, ScanError> {
        let slot = self.compiled.get_or_init(|| {
            let normalized =
                NormalizedText::new(&self.source, true).map_err(|e| e.to_string())?;
            let regex_source = generate_regex_source(&normalized.normalized);
            let re = Regex::new(&regex_source).map_err(|e| e.to_string())?;
            Ok(CompiledPattern {
                re,
                capture_groups: normalized.capture_groups,
            })
        });
        slot.as_ref().map_err(|reason| ScanError::ResourceMalformed {
            path: self.file.clone(),
            reason: reason.clone(),
        })
    }
}

/// Translate a normalized template into a regex source string.
pub fn generate_regex_source(normalized_template: &str) -> String {
    // Eat a single optional space before `<<` and after `>>` to tolerate
    // whitespace drift in hand-edited templates.
    let text = normalized_template.replace(" <<", "<<").replace(">> ", ">>");

    // Swap the simple markers for sentinels so the segment scan below only
    // has to deal with `<<S>>` slots (which may be nested inside regions).
    let text = text
        .replace("<<omitable>>", "BEGIN_OMITABLE")
        .replace("<</omitable>>", "END_OMITABLE")
        .replace("<<copyright>>", "COPYRIGHT");

    // Replace each `<<S>>` with ` *(?:(S) *)` and escape regex-unsafe
    // characters in the literal runs between them.
    let mut segments: Vec<String> = Vec::new();
    let mut prev = 0usize;
    for caps in POINTY_SEGMENT_RE.captures_iter(&text) {
        let whole = caps.get(0).expect("match has a group 0");
        if whole.start() > prev {
            segments.push(escape_unsafe(&text[prev..whole.start()]));
        }
        let slot = caps.get(1).map_or("", |m| m.as_str());
        segments.push(format!(" *(?:({slot}) *)"));
        prev = whole.end();
    }
    if prev < text.len() {
        segments.push(escape_unsafe(&text[prev..]));
    }

    segments
        .concat()
        .replace("BEGIN_OMITABLE", " *(?:")
        .replace("END_OMITABLE", " *)?")
        .replace("COPYRIGHT", ".*")
}

fn escape_unsafe(segment: &str) -> String {
    REGEX_UNSAFE_RE.replace_all(segment, r"\${1}").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(template: &str) -> Regex {
        let normalized = NormalizedText::new(template, true).unwrap();
        Regex::new(&generate_regex_source(&normalized.normalized)).unwrap()
    }

    #[test]
    fn test_quoted_match_with_optional_quotes() {
        let re = compile(r#"THIS IS <<match=""?AS IS,?"?">> LIMITATION"#);
        assert!(re.is_match("this is 'as is' limitation"));
        assert!(re.is_match("this is as is limitation"));
    }

    #[test]
    fn test_quoted_match_with_single_quotes_and_optional_comma() {
        let re = compile(r#"THIS IS <<match="'AS IS,?'">> LIMITATION"#);
        assert!(re.is_match("this is 'as is,' limitation"));
    }

    #[test]
    fn test_unquoted_match_with_optional_quotes() {
        let re = compile(r#"THIS IS <<match="?AS IS,?"?>> LIMITATION"#);
        assert!(re.is_match("this is 'as is' limitation"));
        assert!(re.is_match("this is as is limitation"));
    }

    #[test]
    fn test_variable_slot_tolerates_spacing() {
        let re = compile("including without <<match=limitation,?>>");
        assert!(re.is_match("the software without restriction, including without limitation the rights to\n"));
        assert!(re.is_match("the software without restriction, including withoutlimitation the rights to\n"));
        assert!(re.is_match("the software without restriction, including without  limitation the rights to\n"));
    }

    #[test]
    fn test_large_variable_bound_is_tightened() {
        let template = "<<beginOptional>><<var;name=\"title\";original=\"BSD Zero Clause License\";match=\"(BSD Zero[ -]Clause|Zero[ -]Clause BSD)( License)?( \\(0BSD\\))?\">>\n\n<<endOptional>> <<var;name=\"copyright\";original=\"Copyright (C) YEAR by AUTHOR EMAIL  \";match=\".{0,5000}\">>\n\nPermission to use, copy, modify, and/or distribute this software for any purpose with or without fee is hereby granted.";
        let re = compile(template);
        assert!(re.is_match(
            " bsd zero-clause license(0bsd) ...allows anything here... permission to use,copy,modify,and/or distribute this software for any purpose with or without fee is hereby granted."
        ));
    }

    #[test]
    fn test_pointy_brackets_inside_double_pointy_brackets() {
        let re = compile("<<beginOptional>><<<endOptional>> abc<<beginOptional>> ><<endOptional>>");
        assert!(re.is_match("< abc> "));
    }

    #[test]
    fn test_literal_text_is_escaped() {
        let source = generate_regex_source("paragraph (a) costs $1. period");
        assert_eq!(source, r"paragraph \(a\) costs \$1\. period");
    }

    #[test]
    fn test_copyright_marker_becomes_line_wildcard() {
        let source = generate_regex_source("<<copyright>> rest");
        assert_eq!(source, ".*rest");
    }

    #[test]
    fn test_compilation_is_memoized() {
        let pattern = LicensePattern::new("some fixed text", "test/pattern.txt");
        let first = pattern.compiled().unwrap() as *const CompiledPattern;
        let second = pattern.compiled().unwrap() as *const CompiledPattern;
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_template_regex_reports_resource() {
        let pattern = LicensePattern::new("broken <<match=(unclosed>> slot", "test/broken.txt");
        match pattern.compiled() {
            Err(ScanError::ResourceMalformed { path, .. }) => {
                assert_eq!(path, "test/broken.txt");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
