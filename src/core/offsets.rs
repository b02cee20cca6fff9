//! Character offset utilities.
//!
//! Every offset exposed by the engine counts Unicode scalar values, not
//! UTF-8 bytes. Regex matches and `str` slicing work on bytes, so this module
//! does the conversion at the boundary.
//!
//! # Design Decisions
//!
//! - **Char offsets everywhere**: spans, segments and persisted offsets all use char indices
//! - **Aligned lowercasing**: lowercasing keeps one char per input char so offsets survive it
//! - **Clamping**: conversions past the end clamp to the text length instead of panicking

use std::sync::OnceLock;

use regex::Regex;

static WORD_CHAR_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Number of chars in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the char at `char_idx` (or `text.len()` when past the end).
pub fn char_to_byte(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(text.len())
}

/// Slice `text` by a char range, clamping both ends to the text length.
pub fn slice_chars(text: &str, begin: usize, end: usize) -> &str {
    let byte_begin = char_to_byte(text, begin);
    let byte_end = char_to_byte(text, end.max(begin));
    &text[byte_begin..byte_end]
}

/// Build a table where `map[byte_idx]` gives the char index.
///
/// Bytes inside a multi-byte char map to that char. `map[text.len()]` is
/// the total char count.
pub fn byte_to_char_map(text: &str) -> Vec<usize> {
    let mut map = vec![0usize; text.len() + 1];
    let mut char_count = 0;

    for (char_idx, (byte_idx, ch)) in text.char_indices().enumerate() {
        for slot in map.iter_mut().skip(byte_idx).take(ch.len_utf8()) {
            *slot = char_idx;
        }
        char_count = char_idx + 1;
    }
    map[text.len()] = char_count;

    map
}

/// Letter-or-digit test used for word windows and tokens.
///
/// Letters are `\p{L}` and digits are decimal digits (`\p{Nd}`) only;
/// letter numbers such as `Ⅻ` and superscripts such as `²` are not word chars.
pub fn is_word_char(ch: char) -> bool {
    if ch.is_ascii() {
        return ch.is_ascii_alphanumeric();
    }
    let pattern = WORD_CHAR_PATTERN
        .get_or_init(|| Regex::new(r"^[\p{L}\p{Nd}]$").expect("word char pattern is valid"));
    let mut buf = [0u8; 4];
    pattern.is_match(ch.encode_utf8(&mut buf))
}

/// Lowercase a single char without changing the char count.
pub fn lower_char(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

/// Lowercase `text` into a char vector aligned with the input.
pub fn lower_chars(text: &str) -> Vec<char> {
    text.chars().map(lower_char).collect()
}

/// Find `needle` in `haystack` at or after `from`, comparing chars.
///
/// An empty needle matches at `from`.
pub fn find_chars(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from);
    }
    if from >= haystack.len() || needle.len() > haystack.len() - from {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}
