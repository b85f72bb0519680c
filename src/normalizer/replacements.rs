//! Varietal word spellings folded to a single canonical form.
//!
//! SPDX matching guideline 8.1.1: words with equivalent alternate spellings
//! (typically British vs. American English) must be treated as the same
//! word. Each entry maps a replacement to the pattern it replaces; entries
//! apply unconditionally, in order, as the last text pass before hashing.
//! The two punctuation entries fold the single space left after `,` and `:`
//! by the whitespace pass, so differently punctuated texts hash alike.

use once_cell::sync::Lazy;
use regex::Regex;

/// `(replacement, compiled pattern)` pairs, applied in order.
pub(super) static WORD_REPLACEMENTS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("license", "licence"),
        ("organization", "organisation"),
        ("redistribution", "redistributions"),
        ("authorized", "authorised"),
        ("favor", "favour"),
        ("honor", "honour"),
        ("judgment", "judgement"),
        (",", ",\\s"),
        (":", ":\\s"),
    ]
    .into_iter()
    .map(|(replacement, pattern)| {
        let re = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("invalid replacement pattern '{pattern}': {e}"));
        (replacement, re)
    })
    .collect()
});
