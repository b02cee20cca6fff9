//! Ordered, overlap-checked collection of annotations over a single text.
//!
//! The index owns the text it annotates, so every annotation it hands out
//! is guaranteed to satisfy `[begin, end) ⊆ [0, len(text)]` with a cached
//! slice equal to the text at those offsets.
//!
//! # Overlap policy
//!
//! When a new span overlaps an existing one:
//!
//! - same kind, same qualifier, identical range: the existing annotation is returned
//! - same kind, same qualifier, different range: conflict
//! - same kind, different qualifier: allowed (qualifiers are independent layers)
//! - entity vs. non-entity: allowed
//! - two different non-entity kinds: conflict

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::domain::{Annotation, AnnotationId, AnnotationKind, AnnotationRecord};

use super::offsets::{byte_to_char_map, char_len, slice_chars};

static MENTION_PATTERN: OnceLock<Regex> = OnceLock::new();
static HASHTAG_PATTERN: OnceLock<Regex> = OnceLock::new();
static URL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn mention_pattern() -> &'static Regex {
    MENTION_PATTERN.get_or_init(|| {
        Regex::new(r"(^|[^A-Za-z0-9_])@([A-Za-z0-9_]+)($|[^A-Za-z0-9_])")
            .expect("mention pattern is valid")
    })
}

fn hashtag_pattern() -> &'static Regex {
    HASHTAG_PATTERN.get_or_init(|| {
        Regex::new(
            r"(^|[^0-9_\p{Alphabetic}])#([0-9]*[A-Za-z][0-9_\p{Alphabetic}]+)($|[^0-9_\p{Alphabetic}])",
        )
        .expect("hashtag pattern is valid")
    })
}

fn url_pattern() -> &'static Regex {
    URL_PATTERN.get_or_init(|| {
        Regex::new(r"(^|[^A-Za-z0-9_])(https?)://t\.co/([A-Za-z0-9_]+)($|[^A-Za-z0-9_])")
            .expect("url pattern is valid")
    })
}

/// Errors raised when adding annotations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpanError {
    #[error("Post text not specified yet")]
    TextNotSet,

    #[error("Invalid span [{begin}, {end}) for text of length {len}")]
    InvalidRange { begin: usize, end: usize, len: usize },

    #[error(
        "Cannot annotate [{begin}, {end}) with a {kind} (q={qualifier:?}): interval overlaps \
         {existing_kind} [{existing_begin}, {existing_end}) (q={existing_qualifier:?})"
    )]
    OverlapConflict {
        kind: AnnotationKind,
        begin: usize,
        end: usize,
        qualifier: String,
        existing_kind: AnnotationKind,
        existing_begin: usize,
        existing_end: usize,
        existing_qualifier: String,
    },
}

/// Annotations of one text, kept sorted by [`Annotation::sort_key`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanIndex {
    text: Option<String>,
    text_len: usize,
    annotations: Vec<Annotation>,
    next_id: u64,
}

impl SpanIndex {
    /// Create an empty index with no text
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index over `text`, running auto-detection
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut index = Self::new();
        index.set_text(Some(text.into()));
        index
    }

    /// Create an index over `text` without running auto-detection.
    ///
    /// Used when annotations are restored from a persisted post.
    pub(crate) fn preloaded(text: Option<String>) -> Self {
        Self {
            text_len: text.as_deref().map_or(0, char_len),
            text,
            ..Self::default()
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Length of the text in chars (0 when unset)
    pub fn text_len(&self) -> usize {
        self.text_len
    }

    /// Replace the annotated text.
    ///
    /// Annotations whose cached slice no longer matches the new text at the
    /// same offsets are dropped; mentions, hashtags and `t.co` links found in
    /// the new text are then added under the default qualifier. Setting the
    /// same text again is a no-op; clearing the text drops every annotation.
    pub fn set_text(&mut self, text: Option<String>) {
        if self.text == text {
            return;
        }

        let Some(text) = text else {
            self.text = None;
            self.text_len = 0;
            self.annotations.clear();
            return;
        };

        let len = char_len(&text);
        let before = self.annotations.len();
        self.annotations
            .retain(|a| a.end() <= len && a.text() == slice_chars(&text, a.begin(), a.end()));
        if self.annotations.len() < before {
            debug!(
                dropped = before - self.annotations.len(),
                "Dropped annotations invalidated by new text"
            );
        }

        self.text_len = len;
        self.text = Some(text);
        self.detect_spans();
    }

    /// Add (or find) an annotation of `kind` over `[begin, end)`.
    ///
    /// Returns the existing annotation when an identical one (same kind,
    /// range and qualifier) is already indexed.
    pub fn add(
        &mut self,
        kind: AnnotationKind,
        begin: usize,
        end: usize,
        qualifier: &str,
    ) -> Result<&mut Annotation, SpanError> {
        let text = self.text.as_deref().ok_or(SpanError::TextNotSet)?;
        if begin >= end || end > self.text_len {
            return Err(SpanError::InvalidRange {
                begin,
                end,
                len: self.text_len,
            });
        }

        let mut identical = None;
        for (i, existing) in self.annotations.iter().enumerate() {
            if !existing.overlaps(begin, end) {
                continue;
            }
            let same_kind = existing.kind() == kind;
            let same_qualifier = existing.qualifier() == qualifier;
            if same_kind && same_qualifier && existing.begin() == begin && existing.end() == end {
                identical = Some(i);
                break;
            }
            let layered = same_kind && !same_qualifier;
            let entity_involved =
                kind == AnnotationKind::Entity || existing.kind() == AnnotationKind::Entity;
            if !layered && (same_kind || !entity_involved) {
                return Err(SpanError::OverlapConflict {
                    kind,
                    begin,
                    end,
                    qualifier: qualifier.to_string(),
                    existing_kind: existing.kind(),
                    existing_begin: existing.begin(),
                    existing_end: existing.end(),
                    existing_qualifier: existing.qualifier().to_string(),
                });
            }
        }

        if let Some(i) = identical {
            return Ok(&mut self.annotations[i]);
        }

        let id = AnnotationId(self.next_id);
        self.next_id += 1;
        let annotation = Annotation::new(
            id,
            begin,
            end,
            qualifier.to_string(),
            slice_chars(text, begin, end).to_string(),
            kind,
        );

        let pos = self.annotations.partition_point(|a| *a < annotation);
        self.annotations.insert(pos, annotation);
        Ok(&mut self.annotations[pos])
    }

    /// Add the annotation described by a persisted record, restoring its
    /// enrichment fields.
    pub fn restore(
        &mut self,
        kind: AnnotationKind,
        record: &AnnotationRecord,
    ) -> Result<&mut Annotation, SpanError> {
        let annotation = self.add(kind, record.begin, record.end, record.qualifier())?;
        annotation.restore_fields(record);
        Ok(annotation)
    }

    /// Remove the annotation with the given id, returning it
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let pos = self.annotations.iter().position(|a| a.id() == id)?;
        Some(self.annotations.remove(pos))
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id() == id)
    }

    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.annotations.iter_mut().find(|a| a.id() == id)
    }

    /// All annotations in sorted order
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    /// Annotations of `kind`, optionally restricted to one qualifier (`None` = any)
    pub fn of_kind<'a>(
        &'a self,
        kind: AnnotationKind,
        qualifier: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.annotations
            .iter()
            .filter(move |a| a.kind() == kind && qualifier.map_or(true, |q| a.qualifier() == q))
    }

    /// All annotations covering the char at `index`
    pub fn covering(&self, index: usize) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(move |a| a.covers(index))
    }

    /// First annotation (in sorted order) of `kind` and `qualifier` covering `index`
    pub fn find_at(
        &self,
        index: usize,
        kind: AnnotationKind,
        qualifier: &str,
    ) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|a| a.kind() == kind && a.qualifier() == qualifier && a.covers(index))
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Scan the current text for mentions, hashtags and short links
    fn detect_spans(&mut self) {
        let Some(text) = self.text.clone() else {
            return;
        };
        let chars = byte_to_char_map(&text);

        // Mentions and hashtags include their sigil; links start at the scheme
        let scans = [
            (mention_pattern(), AnnotationKind::Mention, 2, 2, 3, 1),
            (hashtag_pattern(), AnnotationKind::Hashtag, 2, 2, 3, 1),
            (url_pattern(), AnnotationKind::Url, 2, 3, 4, 0),
        ];

        for (pattern, kind, first, last, trailer, sigil) in scans {
            let mut start = 0;
            while start <= text.len() {
                let Some(caps) = pattern.captures_at(&text, start) else {
                    break;
                };
                let (Some(head), Some(tail)) = (caps.get(first), caps.get(last)) else {
                    break;
                };

                let begin = chars[head.start() - sigil];
                let end = chars[tail.end()];
                if let Err(e) = self.add(kind, begin, end, crate::domain::DEFAULT_QUALIFIER) {
                    debug!(%kind, begin, end, error = %e, "Skipping detected span");
                }

                // The trailing boundary char may open the next match
                start = match caps.get(trailer) {
                    Some(t) if !t.as_str().is_empty() => t.start(),
                    _ => tail.end() + 1,
                };
            }
        }
    }
}
