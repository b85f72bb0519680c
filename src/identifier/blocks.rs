//! Partition the original text into contiguous blocks labeled by the
//! licenses that matched each slice.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::identifier::{Block, MatchSpan};

static NON_ALPHANUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^A-Za-z0-9]*$").expect("static block pattern"));

/// Split `original` into blocks along the sorted match list. Gaps between
/// matches become unlabeled blocks; the concatenation of all block texts
/// reconstitutes `original` exactly.
pub fn generate_text_blocks(original: &str, matches: &[(String, MatchSpan)]) -> Vec<Block> {
    if matches.is_empty() {
        return vec![Block {
            text: original.to_string(),
            matches: Vec::new(),
        }];
    }

    let mut blocks: Vec<Block> = Vec::new();
    let mut last_end = 0usize;
    for (id, m) in matches {
        if last_end < m.begins {
            append_new_block(&mut blocks, slice(original, last_end, m.begins), "");
            last_end = m.begins;
        }

        let begin = m.begins.max(last_end);
        let next_end = m.ends + 1;
        if next_end > last_end {
            append_new_block(&mut blocks, slice(original, begin, next_end), id);
            last_end = next_end;
        }
    }
    if last_end < original.len() {
        append_new_block(&mut blocks, slice(original, last_end, original.len()), "");
    }

    blocks
}

/// Append a block, coalescing into the previous one when both carry the
/// same single label, or when the new block is unlabeled and holds no
/// alphanumeric text (stray punctuation between two pieces of one license).
fn append_new_block(blocks: &mut Vec<Block>, text: &str, license_id: &str) {
    if let Some(prev) = blocks.last_mut() {
        if prev.matches.len() == 1 && prev.matches[0] == license_id {
            prev.text.push_str(text);
            return;
        }
        if license_id.is_empty() && NON_ALPHANUMERIC_RE.is_match(text) {
            prev.text.push_str(text);
            return;
        }
    }

    blocks.push(Block {
        text: text.to_string(),
        matches: if license_id.is_empty() {
            Vec::new()
        } else {
            vec![license_id.to_string()]
        },
    });
}

/// Slice `text` clamping both ends to char boundaries. Match offsets come
/// from the lowercased text; the handful of characters whose lowercase form
/// changes byte length can leave an offset inside a multi-byte character.
fn slice(text: &str, start: usize, end: usize) -> &str {
    let end = char_boundary(text, end);
    let start = char_boundary(text, start.min(end));
    &text[start..end]
}

fn char_boundary(text: &str, mut i: usize) -> usize {
    i = i.min(text.len());
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}
