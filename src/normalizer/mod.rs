//! Text normalization for license matching.
//!
//! Both license documents and license templates are reduced to a canonical
//! form before matching, following the SPDX matching guidelines: lowercase,
//! equivalent punctuation folded, code-comment framing removed, whitespace
//! collapsed. Alongside the normalized text we maintain an index map from
//! every normalized byte back to the byte it originated from, so match
//! positions can be reported against the original input.

mod replacements;

use md5::Md5;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512};

use crate::error::ScanError;
use replacements::WORD_REPLACEMENTS;

/// Wildcard template slots are capped to this many characters.
const WILDCARD_LIMIT: &str = "<<.{1,144}>>";
const OPTIONAL_WILDCARD_LIMIT: &str = "<<.{0,144}>>";

/// Variable slots declared as `.{0,5000}` are tightened to this bound.
const VARIABLE_UPPER_BOUND: &str = "{0,1000}?";

const OMITABLE: &str = "<<omitable>>";
const OMITABLE_LINE: &str = "<<omitable>>\n";
const OMITABLE_END: &str = "<</omitable>>";

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static normalizer pattern")
}

static CONTROL_CHARACTERS_RE: Lazy<Regex> =
    Lazy::new(|| re(r"[\u{0000}-\u{0007}\u{000E}-\u{001B}]"));
static NOTE_TAG_RE: Lazy<Regex> = Lazy::new(|| re(r"<<note[:=].+?>>"));
static WILDCARD_RE: Lazy<Regex> = Lazy::new(|| re(r"<<match=\.\+>>"));
static OPTIONAL_WILDCARD_RE: Lazy<Regex> = Lazy::new(|| re(r"<<match=\.\*>>"));
static VARIABLE_RE: Lazy<Regex> =
    Lazy::new(|| re(r"<<(?:var;(?:name=(.+?);)?(?:original=(.*?);)?)?match=(.+?)>>"));
static BEGIN_OPTIONAL_LINE_RE: Lazy<Regex> =
    Lazy::new(|| re(r"(?m)^<<beginoptional(?:;name=.*?)?>>"));
static BEGIN_OPTIONAL_RE: Lazy<Regex> = Lazy::new(|| re(r"<<beginoptional(?:;name=.*?)?>>"));
static END_OPTIONAL_RE: Lazy<Regex> = Lazy::new(|| re(r"<<endoptional>>"));
static COMMENT_BLOCK_OUTSIDE_RE: Lazy<Regex> =
    Lazy::new(|| re(r"(?m)^\s*(?:/\*|-{2,3}\[=*\[)|(?:\*/|\]=*\])\s*$"));
static COMMENT_BLOCK_INSIDE_RE: Lazy<Regex> = Lazy::new(|| re(r"(?m)^\s*[*#]{1,6}|\*{1,6}$"));
static HTML_COMMENT_RE: Lazy<Regex> = Lazy::new(|| re(r"(?m)^\s*<!--|-->\s*$"));
static COMMENT_LINE_RE: Lazy<Regex> = Lazy::new(|| re(r"(?m)^\s*(?://|>|--|;{1,4})"));
static DASH_LIKE_RE: Lazy<Regex> = Lazy::new(|| {
    re(r"[\u{002D}\u{2010}\u{2011}\u{2013}\u{2014}\u{2015}\u{2212}\u{FE58}\u{FE63}\u{FE0D}]")
});
static QUOTE_LIKE_RE: Lazy<Regex> =
    Lazy::new(|| re(r"[\u{0022}\u{0027}\u{0060}\u{00B4}\u{2018}\u{2019}\u{201C}\u{201D}]+"));
static HTTP_RE: Lazy<Regex> = Lazy::new(|| re(r"https?"));
static SPLIT_WORDS_RE: Lazy<Regex> = Lazy::new(|| re(r"(?m)\b-$\s+\b"));
static HORIZONTAL_RULE_RE: Lazy<Regex> = Lazy::new(|| re(r"(?m)^\s*[*=-]{3,}"));
static COPYRIGHT_SYMBOL_RE: Lazy<Regex> = Lazy::new(|| re(r"©|\([cC]\)"));
static ODD_CHARACTERS_RE: Lazy<Regex> = Lazy::new(|| {
    re(
        r"(?im)^\^l$|\u{0080}|\u{0099}|\u{009C}|\u{009D}|\u{00AC}|\u{00E2}|\u{00A7}|\u{00C2}|\u{00A4}|\u{0153}|\u{20AC}|\u{FFFD}",
    )
});
static BULLETS_RE: Lazy<Regex> = Lazy::new(|| re(r"(?m)^\s*[*+\u{2022}-]\s+"));
static NUMBERING_RE: Lazy<Regex> = Lazy::new(|| re(r"(?m)(?:\s|^)\(?(?:\w|[\divx#]+)[.)][\s$]"));
static MIDDLE_WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| re(r"(?:\s|\u{00A0}|\u{2028}|\u{00B7})+"));
static LEADING_WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| re(r"^\s"));
static TRAILING_WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| re(r"\s$"));

/// md5, sha256, and sha512 of a normalized text, as lowercase hex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    pub md5: String,
    pub sha256: String,
    pub sha512: String,
}

impl Digest {
    pub fn of(content: &str) -> Self {
        Digest {
            md5: format!("{:x}", Md5::digest(content.as_bytes())),
            sha256: format!("{:x}", Sha256::digest(content.as_bytes())),
            sha512: format!("{:x}", Sha512::digest(content.as_bytes())),
        }
    }
}

/// One `<<var;...>>` slot captured while normalizing a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureGroup {
    pub group_number: usize,
    pub name: String,
    pub original: String,
    pub matches: String,
}

/// A text together with its canonical form and supporting data.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    /// The input text, unchanged.
    pub original: String,
    /// The canonical form of the input.
    pub normalized: String,
    /// For each normalized byte, the original byte offset it came from.
    /// Interior bytes of inserted replacements carry the sentinel `-1`.
    pub index_map: Vec<i32>,
    /// Template variable slots, in order of appearance.
    pub capture_groups: Vec<CaptureGroup>,
    /// Hashes of the normalized form.
    pub digest: Digest,
    /// Templates keep wildcard markers where documents get placeholders.
    pub is_template: bool,
}

impl NormalizedText {
    /// Normalize `original`. Fails on empty input and on input containing
    /// control characters indicative of binary content.
    pub fn new(original: &str, is_template: bool) -> Result<Self, ScanError> {
        if original.is_empty() {
            return Err(ScanError::InvalidInput(
                "text with length 0".to_string(),
            ));
        }
        if CONTROL_CHARACTERS_RE.is_match(original) {
            return Err(ScanError::InvalidInput(
                "text with control characters".to_string(),
            ));
        }

        let mut n = Self::prepared(original, is_template);

        n.remove_note_tags();
        n.limit_wildcard_matching();
        n.limit_optional_wildcard_matching();
        // Capture replaceable text sections. (Guideline 2.1.3)
        n.capture_replaceable_text_sections();
        n.standardize_omitable_tags();
        // Remove odd characters before the passes that insert multi-byte
        // placeholders; stray symbols would otherwise shift the index map.
        n.remove_odd_characters();
        // Remove code comment framing. (Guideline 6.1.1)
        n.remove_code_comment_indicators();
        // All dash variants are equivalent. (Guideline 5.1.2)
        n.replace_dash_like_characters();
        // All quote variants are equivalent. (Guideline 5.1.3)
        n.replace_quote_like_characters();
        // http and https are equivalent. (Guideline 13.1.1)
        n.standardize_to_http();
        n.reconnect_split_words();
        n.remove_horizontal_rules();
        // ©, (c), and "copyright" are equivalent. (Guideline 9.1.1)
        // Must run before bullets to handle the overlapping (c) case.
        n.replace_copyright_symbols();
        // Bullets and outline numbering. (Guideline 7.1.1)
        n.replace_bullets_and_numbering();
        n.remove_html_tags();
        // Collapse all whitespace to single spaces. (Guideline 3.1.1)
        n.replace_whitespace();
        // Fold varietal word spellings. (Guideline 8.1.1)
        n.replace_varietal_word_spellings();

        n.digest = Digest::of(&n.normalized);
        Ok(n)
    }

    /// Lowercase the input and build the identity index map. The map must be
    /// built after lowercasing because a few characters change byte length.
    fn prepared(original: &str, is_template: bool) -> Self {
        let normalized = original.to_lowercase();
        let index_map = (0..normalized.len() as i32).collect();
        NormalizedText {
            original: original.to_string(),
            normalized,
            index_map,
            capture_groups: Vec::new(),
            digest: Digest::default(),
            is_template,
        }
    }

    fn remove_note_tags(&mut self) {
        self.replace_pattern(&NOTE_TAG_RE, " ");
    }

    fn limit_wildcard_matching(&mut self) {
        self.replace_pattern(&WILDCARD_RE, WILDCARD_LIMIT);
    }

    fn limit_optional_wildcard_matching(&mut self) {
        self.replace_pattern(&OPTIONAL_WILDCARD_RE, OPTIONAL_WILDCARD_LIMIT);
    }

    /// Rewrite `<<var;name=..;original=..;match=REGEX>>` slots to `<<REGEX>>`
    /// and record a capture group per slot.
    fn capture_replaceable_text_sections(&mut self) {
        let mut ranges = Vec::new();
        let mut replacements = Vec::new();
        let mut groups = Vec::new();
        for caps in VARIABLE_RE.captures_iter(&self.normalized) {
            let whole = caps.get(0).expect("match has a group 0");
            let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let original = caps.get(2).map_or("", |m| m.as_str()).to_string();
            let mut regex_src = caps.get(3).map_or("", |m| m.as_str()).to_string();

            // SPDX templates quote the match expression; legacy ones did not
            // and may merely start with an optional quote, so trim only when
            // the quotes are balanced.
            if regex_src.len() >= 2 && regex_src.starts_with('"') && regex_src.ends_with('"') {
                regex_src = regex_src[1..regex_src.len() - 1].to_string();
            }

            // An unprotected greedy quantifier at the end is made lazy.
            if regex_src.ends_with('+') || regex_src.ends_with('*') || regex_src.ends_with('}') {
                regex_src.push('?');
            }

            // `.{0,5000}` appears throughout the SPDX templates; treat it
            // like the wildcard case and tighten the bound.
            if let Some(stripped) = regex_src.strip_suffix("{0,5000}?") {
                regex_src = format!("{stripped}{VARIABLE_UPPER_BOUND}");
            }

            ranges.push((whole.start(), whole.end()));
            replacements.push(format!("<<{regex_src}>>"));
            groups.push((name, original, regex_src));
        }

        for (name, original, matches) in groups {
            self.capture_groups.push(CaptureGroup {
                group_number: self.capture_groups.len() + 1,
                name,
                original,
                matches,
            });
        }
        self.splice_all(&ranges, &replacements);
    }

    /// Rewrite optional-region markers to the `<<omitable>>` form. (Guideline
    /// 2.1.4) A marker at the beginning of a line keeps a following newline
    /// so later line-anchored passes still see the line break.
    fn standardize_omitable_tags(&mut self) {
        self.replace_pattern(&BEGIN_OPTIONAL_LINE_RE, OMITABLE_LINE);
        self.replace_pattern(&BEGIN_OPTIONAL_RE, OMITABLE);
        self.replace_pattern(&END_OPTIONAL_RE, OMITABLE_END);
    }

    fn remove_odd_characters(&mut self) {
        self.replace_pattern(&ODD_CHARACTERS_RE, " ");
    }

    fn remove_code_comment_indicators(&mut self) {
        self.replace_pattern(&COMMENT_BLOCK_OUTSIDE_RE, " ");
        self.replace_pattern(&COMMENT_BLOCK_INSIDE_RE, " ");
        // HTML comments go before line comments so `--` and `>` inside the
        // HTML markers cannot be taken for line-comment prefixes.
        self.replace_pattern(&HTML_COMMENT_RE, " ");
        self.replace_pattern(&COMMENT_LINE_RE, " ");
    }

    fn replace_dash_like_characters(&mut self) {
        self.replace_pattern(&DASH_LIKE_RE, "-");
    }

    fn replace_quote_like_characters(&mut self) {
        self.replace_pattern(&QUOTE_LIKE_RE, "'");
    }

    fn standardize_to_http(&mut self) {
        self.replace_pattern(&HTTP_RE, "http");
    }

    fn reconnect_split_words(&mut self) {
        self.remove_pattern(&SPLIT_WORDS_RE);
    }

    fn remove_horizontal_rules(&mut self) {
        self.replace_pattern(&HORIZONTAL_RULE_RE, " ");
    }

    fn replace_copyright_symbols(&mut self) {
        self.replace_pattern(&COPYRIGHT_SYMBOL_RE, "copyright");
    }

    /// Bullets and outline numbering cause spurious mismatches. Documents
    /// drop bullets; templates turn bullets and numbering into a small lazy
    /// wildcard so both the marked and unmarked forms match.
    fn replace_bullets_and_numbering(&mut self) {
        if self.is_template {
            self.replace_pattern(&BULLETS_RE, "<<.{0,20}?>>");
            self.replace_pattern(&NUMBERING_RE, "<<.{0,20}?>>");
        } else {
            self.remove_pattern(&BULLETS_RE);
        }
    }

    /// Remove HTML tags with a hand-rolled scanner. The regex alternative
    /// needs negative lookahead (`<(?!http)[^<>]+>(?!>)`), which our regex
    /// engine does not support: `<http...>` links must be kept and `<<`
    /// template markers must not be touched.
    fn remove_html_tags(&mut self) {
        let text = self.normalized.as_bytes();
        let len = text.len();
        let mut ranges = Vec::new();
        let mut next = 0usize;

        while let Some(pos) = find_byte(text, b'<', next) {
            let i = pos;
            next = i + 1;

            // Negative lookahead: ignore <http... links.
            let http = b"http";
            if len > next + http.len() && &text[next..next + http.len()] == http {
                next += http.len();
                continue;
            }

            // Walk past the tag contents until a forbidden or closing char.
            let mut j = i;
            if len > j + 1 {
                j += 1;
                while len > j && text[j] != b'<' && text[j] != b'>' {
                    j += 1;
                }
            }

            if j > i && len > j && text[j] == b'<' {
                // Forbidden char. This is not the tag you are looking for.
                if text[j - 1] == b'<' {
                    j += 1;
                }
                next = j + 1;
                continue;
            }

            // Take `< tag >` but leave `<<marker>>` alone.
            if len > j && text[j] == b'>' && (len <= j + 1 || text[j + 1] != b'>') {
                next = j + 1;
                ranges.push((i, next));
            }
        }

        let replacement = if self.is_template {
            "<<.{0,144}?>>"
        } else {
            "\u{2662}"
        };
        let replacements = vec![replacement; ranges.len()];
        self.splice_all(&ranges, &replacements);
    }

    fn replace_whitespace(&mut self) {
        self.replace_pattern(&MIDDLE_WHITESPACE_RE, " ");
        self.remove_pattern(&LEADING_WHITESPACE_RE);
        self.remove_pattern(&TRAILING_WHITESPACE_RE);
    }

    fn replace_varietal_word_spellings(&mut self) {
        for (replacement, pattern) in WORD_REPLACEMENTS.iter() {
            self.replace_pattern(pattern, replacement);
        }
    }

    fn replace_pattern(&mut self, pattern: &Regex, replacement: &str) {
        let ranges: Vec<(usize, usize)> = pattern
            .find_iter(&self.normalized)
            .map(|m| (m.start(), m.end()))
            .collect();
        let replacements = vec![replacement; ranges.len()];
        self.splice_all(&ranges, &replacements);
    }

    fn remove_pattern(&mut self, pattern: &Regex) {
        self.replace_pattern(pattern, "");
    }

    /// Replace each `[start, end)` range with its replacement, keeping the
    /// index map in step: the first replacement byte keeps the first replaced
    /// index, the last keeps the last, and interior bytes get the `-1`
    /// sentinel. A zero-length replacement splices the range out.
    fn splice_all<S: AsRef<str>>(&mut self, ranges: &[(usize, usize)], replacements: &[S]) {
        if ranges.is_empty() {
            return;
        }

        let mut text = String::with_capacity(self.normalized.len());
        let mut map: Vec<i32> = Vec::with_capacity(self.index_map.len());
        let mut prev = 0usize;

        for (i, &(start, end)) in ranges.iter().enumerate() {
            let replacement = replacements[i].as_ref();

            if start > prev {
                text.push_str(&self.normalized[prev..start]);
                map.extend_from_slice(&self.index_map[prev..start]);
            }

            if !replacement.is_empty() {
                let len = replacement.len();
                let mut replacement_map = vec![-1i32; len];
                replacement_map[0] = self.index_map[start];
                if len > 1 {
                    replacement_map[len - 1] = self.index_map[end - 1];
                }
                text.push_str(replacement);
                map.extend_from_slice(&replacement_map);
            }

            prev = end;
        }

        if prev < self.normalized.len() {
            text.push_str(&self.normalized[prev..]);
            map.extend_from_slice(&self.index_map[prev..]);
        }

        self.normalized = text;
        self.index_map = map;
    }
}

fn find_byte(text: &[u8], needle: u8, from: usize) -> Option<usize> {
    text.get(from..)?
        .iter()
        .position(|&b| b == needle)
        .map(|p| from + p)
}
