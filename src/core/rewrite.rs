//! Offset-preserving text rewriting.
//!
//! A [`TextRewrite`] starts from an immutable original string and records a
//! sequence of local substitutions. The original and rewritten strings are
//! partitioned in lockstep into segments that are either unchanged (copied
//! verbatim) or replaced. This allows translating offsets of the rewritten
//! text (e.g. spans produced by a tagger run on normalized text) back to
//! the original text.
//!
//! # Design Decisions
//!
//! - **Replace once**: a region of the original text can be replaced at most once
//! - **Char offsets**: every offset counts chars of the respective string
//! - **Best-effort mapping**: offsets inside replaced segments are mapped by a
//!   token heuristic, and approximate results are reported via `tracing`

use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::offsets::{char_len, char_to_byte, find_chars, is_word_char, lower_char, slice_chars};

/// Errors raised by rewrite operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("Range [{start}, {end}) already replaced")]
    AlreadyReplaced { start: usize, end: usize },

    #[error("Invalid range [{start}, {end}) for original text of length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("Malformed rewriting: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Unchanged,
    Replaced,
}

/// A pair of aligned ranges of the original and rewritten text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub original: Range<usize>,
    pub rewritten: Range<usize>,
    pub kind: SegmentKind,
}

impl Segment {
    fn unchanged(original: Range<usize>, rewritten: Range<usize>) -> Self {
        Self {
            original,
            rewritten,
            kind: SegmentKind::Unchanged,
        }
    }

    fn replaced(original: Range<usize>, rewritten: Range<usize>) -> Self {
        Self {
            original,
            rewritten,
            kind: SegmentKind::Replaced,
        }
    }

    pub fn is_replaced(&self) -> bool {
        self.kind == SegmentKind::Replaced
    }
}

/// How an offset of the rewritten text was mapped back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingStatus {
    /// Offset fell in an unchanged segment (or past the end)
    Unchanged,
    /// Offset fell in a replaced segment and was located by the token heuristic
    Matched,
    /// Offset fell in a replaced segment and only a fallback position was found
    Approximate,
}

/// Result of mapping a rewritten offset to the original text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedOffset {
    pub offset: usize,
    pub status: MappingStatus,
}

impl MappedOffset {
    fn new(offset: usize, status: MappingStatus) -> Self {
        Self { offset, status }
    }
}

/// Persisted form of a single replaced segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacementRecord {
    pub from: String,
    pub from_offset: usize,
    pub to: String,
    pub to_offset: usize,
}

/// Persisted form of a [`TextRewrite`].
///
/// `from` is omitted when the original text is stored elsewhere (e.g. as
/// the text of the owning post).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replacements: Vec<ReplacementRecord>,
}

/// Rewriting of an original string into a rewritten string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RewriteRecord", try_from = "RewriteRecord")]
pub struct TextRewrite {
    original: String,
    rewritten: String,
    original_len: usize,
    rewritten_len: usize,
    segments: Vec<Segment>,
}

impl TextRewrite {
    /// Start an identity rewrite of `original`
    pub fn new(original: impl Into<String>) -> Self {
        let original = original.into();
        let len = char_len(&original);
        Self {
            rewritten: original.clone(),
            original,
            original_len: len,
            rewritten_len: len,
            segments: vec![Segment::unchanged(0..len, 0..len)],
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn rewritten(&self) -> &str {
        &self.rewritten
    }

    /// Length of the original text in chars
    pub fn original_len(&self) -> usize {
        self.original_len
    }

    /// Length of the rewritten text in chars
    pub fn rewritten_len(&self) -> usize {
        self.rewritten_len
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Replaced segments in original order
    pub fn replacements(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.is_replaced())
    }

    /// Replace `[start, end)` of the original text with `replacement`.
    ///
    /// Fails if any part of the range was already replaced. A zero-length
    /// range inserts `replacement`.
    pub fn replace(
        &mut self,
        start: usize,
        end: usize,
        replacement: &str,
    ) -> Result<(), RewriteError> {
        if start > end || end > self.original_len {
            return Err(RewriteError::InvalidRange {
                start,
                end,
                len: self.original_len,
            });
        }

        let index = self
            .segments
            .iter()
            .position(|s| {
                s.kind == SegmentKind::Unchanged && s.original.start <= start && s.original.end >= end
            })
            .ok_or(RewriteError::AlreadyReplaced { start, end })?;

        let segment = self.segments[index].clone();
        let removed = end - start;
        let inserted = char_len(replacement);
        let rew_start = segment.rewritten.start + (start - segment.original.start);
        let rew_end = rew_start + removed;

        let mut pieces = Vec::with_capacity(3);
        if start > segment.original.start {
            pieces.push(Segment::unchanged(
                segment.original.start..start,
                segment.rewritten.start..rew_start,
            ));
        }
        pieces.push(Segment::replaced(start..end, rew_start..rew_start + inserted));
        if end < segment.original.end {
            let tail = segment.original.end - end;
            pieces.push(Segment::unchanged(
                end..segment.original.end,
                rew_start + inserted..rew_start + inserted + tail,
            ));
        }

        for later in &mut self.segments[index + 1..] {
            later.rewritten =
                later.rewritten.start - removed + inserted..later.rewritten.end - removed + inserted;
        }
        self.segments.splice(index..=index, pieces);

        let byte_start = char_to_byte(&self.rewritten, rew_start);
        let byte_end = char_to_byte(&self.rewritten, rew_end);
        self.rewritten.replace_range(byte_start..byte_end, replacement);
        self.rewritten_len = self.rewritten_len - removed + inserted;

        Ok(())
    }

    /// Like [`replace`](Self::replace), returning `false` instead of failing
    pub fn try_replace(&mut self, start: usize, end: usize, replacement: &str) -> bool {
        self.replace(start, end, replacement).is_ok()
    }

    /// Replace every occurrence of `literal` in the original text.
    ///
    /// Occurrences are searched in the original text, each search resuming
    /// after the previous match. Stops at the first occurrence that cannot
    /// be replaced; replacements made before it are kept.
    pub fn replace_all(
        &mut self,
        literal: &str,
        replacement: &str,
        ignore_case: bool,
    ) -> Result<usize, RewriteError> {
        let len = char_len(literal);
        let mut count = 0;
        for start in self.occurrences(literal, ignore_case) {
            self.replace(start, start + len, replacement)?;
            count += 1;
        }
        Ok(count)
    }

    /// Like [`replace_all`](Self::replace_all), skipping occurrences that cannot be replaced
    pub fn try_replace_all(&mut self, literal: &str, replacement: &str, ignore_case: bool) -> usize {
        let len = char_len(literal);
        self.occurrences(literal, ignore_case)
            .into_iter()
            .filter(|&start| self.try_replace(start, start + len, replacement))
            .count()
    }

    fn occurrences(&self, literal: &str, ignore_case: bool) -> Vec<usize> {
        let normalize = |text: &str| -> Vec<char> {
            if ignore_case {
                text.chars().map(lower_char).collect()
            } else {
                text.chars().collect()
            }
        };
        let haystack = normalize(&self.original);
        let needle = normalize(literal);
        if needle.is_empty() {
            return Vec::new();
        }

        let mut found = Vec::new();
        let mut from = 0;
        while let Some(pos) = find_chars(&haystack, &needle, from) {
            found.push(pos);
            from = pos + needle.len();
        }
        found
    }

    /// Map an offset of the rewritten text to the original text
    pub fn to_original_offset(&self, offset: usize) -> usize {
        self.resolve_original_offset(offset).offset
    }

    /// Map an offset of the rewritten text to the original text, reporting how
    /// the mapping was obtained.
    ///
    /// Offsets at or past the end of the rewritten text extrapolate linearly
    /// from the end of the original text.
    pub fn resolve_original_offset(&self, offset: usize) -> MappedOffset {
        if offset >= self.rewritten_len {
            return MappedOffset::new(
                self.original_len + (offset - self.rewritten_len),
                MappingStatus::Unchanged,
            );
        }

        // Boundary offsets resolve to the segment that starts there
        let Some(segment) = self.segments.iter().rev().find(|s| s.rewritten.start <= offset)
        else {
            return MappedOffset::new(offset, MappingStatus::Unchanged);
        };

        match segment.kind {
            SegmentKind::Unchanged => MappedOffset::new(
                segment.original.start + (offset - segment.rewritten.start),
                MappingStatus::Unchanged,
            ),
            SegmentKind::Replaced => self.map_replaced(segment, offset),
        }
    }

    fn map_replaced(&self, segment: &Segment, offset: usize) -> MappedOffset {
        let rewritten: Vec<char> = self.rewritten.chars().collect();
        let original: Vec<char> = self.original.chars().collect();

        let mut start = offset;
        while start > segment.rewritten.start && is_word_char(rewritten[start - 1]) {
            start -= 1;
        }
        let mut end = offset;
        while end < segment.rewritten.end && is_word_char(rewritten[end]) {
            end += 1;
        }

        let window: Vec<char> = rewritten[start..end].iter().map(|&c| lower_char(c)).collect();
        let source = &original[segment.original.clone()];
        let lowered: Vec<char> = source.iter().map(|&c| lower_char(c)).collect();

        // Tokens are located by their offset inside this segment, not by the
        // first occurrence of the same token anywhere in the original text
        for (token_start, token) in tokens(&lowered) {
            if let Some(index) = find_chars(token, &window, 0) {
                return MappedOffset::new(
                    segment.original.start + token_start + index + (offset - start),
                    MappingStatus::Matched,
                );
            }
        }

        // Skip a leading sigil such as '#' or '@'
        let skip = match source.first() {
            Some(&c) if !is_word_char(c) => 1,
            _ => 0,
        };
        let fallback = (segment.original.start + skip).min(segment.original.end);

        if offset == start {
            return MappedOffset::new(fallback, MappingStatus::Matched);
        }
        if offset == end {
            return MappedOffset::new(segment.original.end, MappingStatus::Matched);
        }

        let target = rewritten[offset];
        let mapped = source
            .iter()
            .position(|&c| c == target)
            .map(|i| segment.original.start + i)
            .unwrap_or(fallback);
        warn!(
            offset,
            mapped,
            original = %self.original,
            rewritten = %self.rewritten,
            "Mapping ambiguous rewritten offset"
        );
        MappedOffset::new(mapped, MappingStatus::Approximate)
    }

    /// Map an offset of the original text to the rewritten text.
    ///
    /// Offsets inside a replaced segment map to the end of its replacement,
    /// except for the segment start which maps to the replacement start.
    pub fn to_rewritten_offset(&self, offset: usize) -> usize {
        if offset >= self.original_len {
            return self.rewritten_len + (offset - self.original_len);
        }

        let Some(segment) = self.segments.iter().rev().find(|s| s.original.start <= offset) else {
            return offset;
        };

        match segment.kind {
            SegmentKind::Unchanged => segment.rewritten.start + (offset - segment.original.start),
            SegmentKind::Replaced if offset == segment.original.start => segment.rewritten.start,
            SegmentKind::Replaced => segment.rewritten.end,
        }
    }

    /// Persisted form, optionally including the original text
    pub fn to_record(&self, with_original: bool) -> RewriteRecord {
        RewriteRecord {
            from: with_original.then(|| self.original.clone()),
            to: self.rewritten.clone(),
            replacements: self
                .replacements()
                .map(|s| ReplacementRecord {
                    from: slice_chars(&self.original, s.original.start, s.original.end)
                        .to_string(),
                    from_offset: s.original.start,
                    to: slice_chars(&self.rewritten, s.rewritten.start, s.rewritten.end)
                        .to_string(),
                    to_offset: s.rewritten.start,
                })
                .collect(),
        }
    }

    /// Rebuild a rewrite from its persisted form.
    ///
    /// `original` is used when the record does not carry its own `from`.
    /// Unchanged segments are reconstructed from the gaps between
    /// replacements, and the result is checked for consistency.
    pub fn from_record(record: RewriteRecord, original: Option<&str>) -> Result<Self, RewriteError> {
        let original = match (record.from, original) {
            (Some(from), _) => from,
            (None, Some(text)) => text.to_string(),
            (None, None) => {
                return Err(RewriteError::Malformed("missing original text".to_string()))
            }
        };
        let rewritten = record.to;
        let original_len = char_len(&original);
        let rewritten_len = char_len(&rewritten);

        let mut replacements = record.replacements;
        replacements.sort_by_key(|r| (r.from_offset, char_len(&r.from)));

        let mut segments = Vec::with_capacity(replacements.len() * 2 + 1);
        let (mut o, mut r) = (0, 0);
        for rep in &replacements {
            if rep.from_offset < o {
                return Err(RewriteError::Malformed(format!(
                    "replacement at {} overlaps previous replacement",
                    rep.from_offset
                )));
            }
            let gap = rep.from_offset - o;
            if gap > 0 {
                push_unchanged(&mut segments, &original, &rewritten, o, r, gap)?;
                o += gap;
                r += gap;
            }
            if rep.to_offset != r {
                return Err(RewriteError::Malformed(format!(
                    "replacement at {} expected at rewritten offset {}, found {}",
                    rep.from_offset, r, rep.to_offset
                )));
            }

            let from_len = char_len(&rep.from);
            let to_len = char_len(&rep.to);
            if o + from_len > original_len
                || r + to_len > rewritten_len
                || slice_chars(&original, o, o + from_len) != rep.from
                || slice_chars(&rewritten, r, r + to_len) != rep.to
            {
                return Err(RewriteError::Malformed(format!(
                    "replacement {:?} -> {:?} does not match text at {}",
                    rep.from, rep.to, rep.from_offset
                )));
            }
            segments.push(Segment::replaced(o..o + from_len, r..r + to_len));
            o += from_len;
            r += to_len;
        }

        if original_len - o != rewritten_len - r {
            return Err(RewriteError::Malformed(
                "unchanged tail differs in length".to_string(),
            ));
        }
        if o < original_len || segments.is_empty() {
            push_unchanged(&mut segments, &original, &rewritten, o, r, original_len - o)?;
        }

        Ok(Self {
            original,
            rewritten,
            original_len,
            rewritten_len,
            segments,
        })
    }
}

fn push_unchanged(
    segments: &mut Vec<Segment>,
    original: &str,
    rewritten: &str,
    o: usize,
    r: usize,
    len: usize,
) -> Result<(), RewriteError> {
    if slice_chars(original, o, o + len) != slice_chars(rewritten, r, r + len)
        || r + len > char_len(rewritten)
    {
        return Err(RewriteError::Malformed(format!(
            "unchanged text at original offset {} differs from rewritten offset {}",
            o, r
        )));
    }
    segments.push(Segment::unchanged(o..o + len, r..r + len));
    Ok(())
}

/// Whitespace-delimited tokens with their char offsets
fn tokens(chars: &[char]) -> Vec<(usize, &[char])> {
    let mut tokens = Vec::new();
    let mut begin = None;
    for (i, c) in chars.iter().enumerate() {
        match (c.is_whitespace(), begin) {
            (true, Some(b)) => {
                tokens.push((b, &chars[b..i]));
                begin = None;
            }
            (false, None) => begin = Some(i),
            _ => {}
        }
    }
    if let Some(b) = begin {
        tokens.push((b, &chars[b..]));
    }
    tokens
}

impl From<TextRewrite> for RewriteRecord {
    fn from(rewrite: TextRewrite) -> Self {
        rewrite.to_record(true)
    }
}

impl TryFrom<RewriteRecord> for TextRewrite {
    type Error = RewriteError;

    fn try_from(record: RewriteRecord) -> Result<Self, Self::Error> {
        TextRewrite::from_record(record, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWEET: &str = "@john ke #bellacosa #forzainter";

    fn normalized_tweet() -> TextRewrite {
        let mut rewrite = TextRewrite::new(TWEET);
        assert_eq!(rewrite.replace_all("ke", "che", false).unwrap(), 1);
        rewrite.replace(0, 5, "John Smith").unwrap();
        rewrite.replace_all("#bellacosa", "bella cosa", false).unwrap();
        rewrite.replace_all("#forzainter", "forza Inter", false).unwrap();
        rewrite
    }

    fn assert_partition(rewrite: &TextRewrite) {
        let (mut o, mut r) = (0, 0);
        for segment in rewrite.segments() {
            assert_eq!(segment.original.start, o);
            assert_eq!(segment.rewritten.start, r);
            o = segment.original.end;
            r = segment.rewritten.end;
        }
        assert_eq!(o, rewrite.original_len());
        assert_eq!(r, rewrite.rewritten_len());
    }

    #[test]
    fn test_identity() {
        let rewrite = TextRewrite::new("hello");
        assert_eq!(rewrite.rewritten(), "hello");
        assert_eq!(rewrite.segments().len(), 1);
        assert_eq!(rewrite.to_original_offset(3), 3);
        assert_eq!(rewrite.to_rewritten_offset(3), 3);
    }

    #[test]
    fn test_scenario_rewritten_text() {
        let rewrite = normalized_tweet();
        assert_eq!(rewrite.rewritten(), "John Smith che bella cosa forza Inter");
        assert_partition(&rewrite);
    }

    #[test]
    fn test_scenario_offsets() {
        let rewrite = normalized_tweet();
        let text = rewrite.rewritten();

        // "che" falls back to the start of the replaced "ke"
        assert_eq!(rewrite.to_original_offset(text.find("che").unwrap()), 6);
        // "John" is found inside "@john"
        assert_eq!(rewrite.to_original_offset(text.find("John").unwrap()), 1);
        // "Inter" is found inside "#forzainter"
        let inter = rewrite.resolve_original_offset(text.find("Inter").unwrap());
        assert_eq!(inter.offset, 26);
        assert_eq!(inter.status, MappingStatus::Matched);
        // "bella" maps past the '#'
        assert_eq!(rewrite.to_original_offset(text.find("bella").unwrap()), 10);
        // end of text extrapolates
        assert_eq!(rewrite.to_original_offset(rewrite.rewritten_len()), TWEET.len());
    }

    #[test]
    fn test_unchanged_segments_map_linearly() {
        let rewrite = normalized_tweet();
        // the space after "John Smith" is the original space after "@john"
        let mapped = rewrite.resolve_original_offset(10);
        assert_eq!(mapped, MappedOffset::new(5, MappingStatus::Unchanged));
    }

    #[test]
    fn test_repeated_token_maps_inside_its_segment() {
        let mut rewrite = TextRewrite::new("xke ok xke");
        rewrite.replace(7, 10, "XKE").unwrap();
        let mapped = rewrite.resolve_original_offset(8);
        assert_eq!(mapped, MappedOffset::new(8, MappingStatus::Matched));
    }

    #[test]
    fn test_window_end_maps_to_segment_end() {
        let mut rewrite = TextRewrite::new("ab xyz cd");
        rewrite.replace(3, 6, "qq!").unwrap();
        let mapped = rewrite.resolve_original_offset(5);
        assert_eq!(mapped, MappedOffset::new(6, MappingStatus::Matched));
    }

    #[test]
    fn test_ambiguous_offset_uses_literal_char() {
        let mut rewrite = TextRewrite::new("ab xyz cd");
        rewrite.replace(3, 6, "qzq").unwrap();
        let mapped = rewrite.resolve_original_offset(4);
        assert_eq!(mapped, MappedOffset::new(5, MappingStatus::Approximate));
    }

    #[test]
    fn test_ambiguous_offset_without_literal_char() {
        let mut rewrite = TextRewrite::new("ab #xyz cd");
        rewrite.replace(3, 7, "qwq").unwrap();
        // falls back to the segment start, past the '#'
        let mapped = rewrite.resolve_original_offset(4);
        assert_eq!(mapped, MappedOffset::new(4, MappingStatus::Approximate));
    }

    #[test]
    fn test_replace_twice_fails() {
        let mut rewrite = TextRewrite::new("abcdef");
        rewrite.replace(1, 3, "X").unwrap();
        assert_eq!(
            rewrite.replace(2, 4, "Y"),
            Err(RewriteError::AlreadyReplaced { start: 2, end: 4 })
        );
        assert!(!rewrite.try_replace(1, 3, "Z"));
        assert!(rewrite.try_replace(3, 4, "Z"));
        assert_eq!(rewrite.rewritten(), "aXZef");
        assert_partition(&rewrite);
    }

    #[test]
    fn test_replace_rejects_invalid_range() {
        let mut rewrite = TextRewrite::new("abc");
        assert!(matches!(
            rewrite.replace(2, 1, "x"),
            Err(RewriteError::InvalidRange { .. })
        ));
        assert!(matches!(
            rewrite.replace(1, 9, "x"),
            Err(RewriteError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_insertion_and_deletion() {
        let mut rewrite = TextRewrite::new("ab");
        rewrite.replace(1, 1, "--").unwrap();
        rewrite.replace(1, 2, "").unwrap();
        assert_eq!(rewrite.rewritten(), "a--");
        assert_partition(&rewrite);
        // the deleted 'b' maps to the end of the insertion
        assert_eq!(rewrite.to_rewritten_offset(1), 3);
    }

    #[test]
    fn test_multibyte_text() {
        let mut rewrite = TextRewrite::new("perché e' così");
        rewrite.replace(7, 9, "è").unwrap();
        assert_eq!(rewrite.rewritten(), "perché è così");
        assert_eq!(rewrite.rewritten_len(), 13);
        assert_eq!(rewrite.to_original_offset(9), 10);
    }

    #[test]
    fn test_replace_all_ignore_case() {
        let mut rewrite = TextRewrite::new("Cmq ok, CMQ no");
        assert_eq!(rewrite.try_replace_all("cmq", "comunque", true), 2);
        assert_eq!(rewrite.rewritten(), "comunque ok, comunque no");
        assert_eq!(rewrite.try_replace_all("", "x", false), 0);
    }

    #[test]
    fn test_replace_all_stops_at_conflict() {
        let mut rewrite = TextRewrite::new("xx yy xx");
        rewrite.replace(6, 8, "z").unwrap();
        let result = rewrite.replace_all("xx", "w", false);
        assert!(result.is_err());
        assert_eq!(rewrite.rewritten(), "w yy z");
    }

    #[test]
    fn test_to_rewritten_offset() {
        let rewrite = normalized_tweet();
        assert_eq!(rewrite.to_rewritten_offset(0), 0);
        assert_eq!(rewrite.to_rewritten_offset(3), 10);
        assert_eq!(rewrite.to_rewritten_offset(5), 10);
        assert_eq!(rewrite.to_rewritten_offset(6), 11);
        assert_eq!(rewrite.to_rewritten_offset(31), 37);
    }

    #[test]
    fn test_json_round_trip() {
        let rewrite = normalized_tweet();
        let json = serde_json::to_string(&rewrite).unwrap();
        let parsed: TextRewrite = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rewrite);

        let identity = TextRewrite::new("");
        let json = serde_json::to_string(&identity).unwrap();
        assert_eq!(json, r#"{"from":"","to":""}"#);
        let parsed: TextRewrite = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, identity);
    }

    #[test]
    fn test_json_shape() {
        let mut rewrite = TextRewrite::new("a ke b");
        rewrite.replace(2, 4, "che").unwrap();
        let value = serde_json::to_value(&rewrite).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "from": "a ke b",
                "to": "a che b",
                "replacements": [{"from": "ke", "fromOffset": 2, "to": "che", "toOffset": 2}]
            })
        );
    }

    #[test]
    fn test_record_without_original() {
        let mut rewrite = TextRewrite::new("a ke b");
        rewrite.replace(2, 4, "che").unwrap();
        let record = rewrite.to_record(false);
        assert!(record.from.is_none());

        assert!(TextRewrite::from_record(record.clone(), None).is_err());
        let restored = TextRewrite::from_record(record, Some("a ke b")).unwrap();
        assert_eq!(restored, rewrite);
    }

    #[test]
    fn test_malformed_record() {
        let json = r#"{"from":"abc","to":"aXc","replacements":[{"from":"q","fromOffset":1,"to":"X","toOffset":1}]}"#;
        let result: Result<TextRewrite, _> = serde_json::from_str(json);
        assert!(result.is_err());

        let json = r#"{"from":"abc","to":"abcd"}"#;
        let result: Result<TextRewrite, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
