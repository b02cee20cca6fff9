//! Post: a short message with its author, annotations and rewriting.
//!
//! A post owns its text through a [`SpanIndex`], so every annotation it
//! exposes is consistent with the current text. Posts are plain values:
//! cloning yields a fully independent copy that can be annotated on another
//! worker and later folded back with [`Post::merge`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::{RewriteError, RewriteRecord, SpanError, SpanIndex, TextRewrite};

use super::annotation::{compatible, fill, Annotation, AnnotationId, AnnotationKind, AnnotationRecord, Category};

/// Prefix of ids of posts coming from Twitter
pub const TWITTER_PREFIX: &str = "twitter:";

/// Errors raised when manipulating or loading posts
#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Span(#[from] SpanError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error("Invalid post record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },
}

/// Author metadata. Every field can be filled independently by enrichers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl Author {
    /// `true` when no field conflicts with the corresponding field of `other`
    pub fn compatible_with(&self, other: &Author) -> bool {
        compatible(&self.username, &other.username)
            && compatible(&self.full_name, &other.full_name)
            && compatible(&self.description, &other.description)
            && compatible(&self.lang, &other.lang)
            && compatible(&self.category, &other.category)
            && compatible(&self.uri, &other.uri)
    }

    fn fill_from(&mut self, other: &Author) {
        fill(&mut self.username, &other.username);
        fill(&mut self.full_name, &other.full_name);
        fill(&mut self.description, &other.description);
        fill(&mut self.lang, &other.lang);
        fill(&mut self.category, &other.category);
        fill(&mut self.uri, &other.uri);
    }
}

/// Outcome of [`Post::merge`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Annotations placed (or matched) in the target post
    pub imported: usize,
    /// Annotations skipped because they conflict with the target post
    pub skipped: usize,
}

/// A micropost with text, author metadata, annotations and an optional rewriting.
#[derive(Debug, Clone)]
pub struct Post {
    id: String,

    /// Creation time (second precision)
    pub date: Option<DateTime<Utc>>,

    /// Language code of the text, lowercase
    pub lang: Option<String>,

    pub author: Author,

    spans: SpanIndex,

    rewrite: Option<TextRewrite>,
}

impl Post {
    /// Create an empty post with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date: None,
            lang: None,
            author: Author::default(),
            spans: SpanIndex::new(),
            rewrite: None,
        }
    }

    /// Builder-style text assignment
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(Some(text.into()));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Numeric Twitter id, for ids of the form `twitter:<n>`
    pub fn platform_id(&self) -> Option<u64> {
        self.id.strip_prefix(TWITTER_PREFIX)?.parse().ok()
    }

    pub fn text(&self) -> Option<&str> {
        self.spans.text()
    }

    /// Replace the post text.
    ///
    /// Annotations no longer matching the text are dropped and mentions,
    /// hashtags and short links are detected. A rewriting whose original
    /// text differs from the new text is discarded.
    pub fn set_text(&mut self, text: Option<String>) {
        self.spans.set_text(text);
        if let Some(rewrite) = &self.rewrite {
            if Some(rewrite.original()) != self.spans.text() {
                debug!(post = %self.id, "Discarding rewriting of replaced text");
                self.rewrite = None;
            }
        }
    }

    /// The annotation index of this post
    pub fn spans(&self) -> &SpanIndex {
        &self.spans
    }

    pub fn annotations(&self) -> &[Annotation] {
        self.spans.annotations()
    }

    /// Add (or find) an annotation, see [`SpanIndex::add`]
    pub fn add_annotation(
        &mut self,
        kind: AnnotationKind,
        begin: usize,
        end: usize,
        qualifier: &str,
    ) -> Result<&mut Annotation, SpanError> {
        self.spans.add(kind, begin, end, qualifier)
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) -> Option<Annotation> {
        self.spans.remove(id)
    }

    pub fn annotation_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.spans.get_mut(id)
    }

    /// Annotations of `kind`, optionally restricted to one qualifier
    pub fn annotations_of<'a>(
        &'a self,
        kind: AnnotationKind,
        qualifier: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.spans.of_kind(kind, qualifier)
    }

    pub fn rewrite(&self) -> Option<&TextRewrite> {
        self.rewrite.as_ref()
    }

    pub fn rewrite_mut(&mut self) -> Option<&mut TextRewrite> {
        self.rewrite.as_mut()
    }

    pub fn set_rewrite(&mut self, rewrite: Option<TextRewrite>) {
        self.rewrite = rewrite;
    }

    /// The rewriting of this post, started over the current text if missing
    pub fn ensure_rewrite(&mut self) -> Result<&mut TextRewrite, PostError> {
        let text = self.spans.text().ok_or(SpanError::TextNotSet)?;
        Ok(self.rewrite.get_or_insert_with(|| TextRewrite::new(text)))
    }

    /// Text and rewriting together, for stages that need to read spans while
    /// editing the rewriting.
    pub fn spans_and_rewrite(&mut self) -> Result<(&SpanIndex, &mut TextRewrite), PostError> {
        let text = self.spans.text().ok_or(SpanError::TextNotSet)?;
        let rewrite = self.rewrite.get_or_insert_with(|| TextRewrite::new(text));
        Ok((&self.spans, rewrite))
    }

    /// Fold `other` (a snapshot of the same post) into this post.
    ///
    /// - the date is imported if missing
    /// - author fields are imported as a group, only if no field conflicts
    /// - if text and language are compatible, missing text, language and
    ///   rewriting are imported and each annotation of `other` is re-added;
    ///   annotations conflicting with this post are skipped
    pub fn merge(&mut self, other: &Post) -> MergeReport {
        let mut report = MergeReport::default();

        if self.date.is_none() {
            self.date = other.date;
        }

        if self.author.compatible_with(&other.author) {
            self.author.fill_from(&other.author);
        }

        let text_compatible = match (self.text(), other.text()) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        if !text_compatible || !compatible(&self.lang, &other.lang) {
            debug!(post = %self.id, "Skipping merge of incompatible text");
            return report;
        }

        if self.text().is_none() && other.text().is_some() {
            self.spans = SpanIndex::preloaded(other.text().map(str::to_string));
        }
        fill(&mut self.lang, &other.lang);
        if self.rewrite.is_none() {
            self.rewrite.clone_from(&other.rewrite);
        }

        for annotation in other.annotations() {
            match self.spans.add(
                annotation.kind(),
                annotation.begin(),
                annotation.end(),
                annotation.qualifier(),
            ) {
                Ok(target) => {
                    target.absorb(annotation);
                    report.imported += 1;
                }
                Err(e) => {
                    debug!(post = %self.id, error = %e, "Skipping conflicting annotation");
                    report.skipped += 1;
                }
            }
        }

        report
    }

    /// Persisted form of this post
    pub fn to_record(&self) -> PostRecord {
        PostRecord {
            id: self.id.clone(),
            date: self.date,
            text: self.text().map(str::to_string),
            lang: self.lang.clone(),
            author: self.author.clone(),
            annotations: self.annotations().iter().map(Annotation::to_record).collect(),
            rewriting: self.rewrite.as_ref().map(|r| r.to_record(false)),
        }
    }

    /// Rebuild a post from its persisted form.
    ///
    /// Annotations are re-added in order without re-running detection.
    /// Annotations conflicting with earlier ones are logged and dropped.
    pub fn from_record(record: PostRecord) -> Result<Self, PostError> {
        let invalid = |reason: String| PostError::InvalidRecord {
            id: record.id.clone(),
            reason,
        };

        let mut spans = SpanIndex::preloaded(record.text.clone());
        for annotation in &record.annotations {
            let kind = annotation
                .kind()
                .ok_or_else(|| invalid(format!("unknown annotation at {}", annotation.begin)))?;
            match spans.restore(kind, annotation) {
                Ok(_) => {}
                Err(e @ SpanError::OverlapConflict { .. }) => {
                    warn!(post = %record.id, error = %e, "Dropping conflicting annotation");
                }
                Err(e) => return Err(invalid(e.to_string())),
            }
        }

        let rewrite = match record.rewriting.clone() {
            Some(r) => Some(TextRewrite::from_record(r, record.text.as_deref())?),
            None => None,
        };

        Ok(Self {
            id: record.id,
            date: record.date,
            lang: record.lang.map(|l| l.to_lowercase()),
            author: record.author,
            spans,
            rewrite,
        })
    }
}

/// JSON shape of a persisted post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub annotations: Vec<AnnotationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewriting: Option<RewriteRecord>,
}

impl Serialize for Post {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Post {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = PostRecord::deserialize(deserializer)?;
        Post::from_record(record).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_text_detection() {
        let post = Post::new("twitter:1").with_text("Hello @bob #nyc");
        let kinds: Vec<_> = post.annotations().iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![AnnotationKind::Mention, AnnotationKind::Hashtag]);
        assert_eq!(post.platform_id(), Some(1));
        assert_eq!(Post::new("other:1").platform_id(), None);
    }

    #[test]
    fn test_ensure_rewrite_requires_text() {
        let mut post = Post::new("p");
        assert!(matches!(
            post.ensure_rewrite(),
            Err(PostError::Span(SpanError::TextNotSet))
        ));

        post.set_text(Some("ciao cmq".to_string()));
        post.ensure_rewrite().unwrap().replace(5, 8, "comunque").unwrap();
        assert_eq!(post.rewrite().unwrap().rewritten(), "ciao comunque");
    }

    #[test]
    fn test_set_text_discards_stale_rewrite() {
        let mut post = Post::new("p").with_text("ciao cmq");
        post.ensure_rewrite().unwrap();
        post.set_text(Some("ciao cmq".to_string()));
        assert!(post.rewrite().is_some());
        post.set_text(Some("altro".to_string()));
        assert!(post.rewrite().is_none());
    }

    #[test]
    fn test_clone_is_independent() {
        let post = Post::new("p").with_text("Barack Obama visits Rome");
        let mut copy = post.clone();
        copy.add_annotation(AnnotationKind::Entity, 0, 12, "ml").unwrap();
        assert!(post.annotations().is_empty());
        assert_eq!(copy.annotations().len(), 1);
    }

    #[test]
    fn test_merge_imports_fields_and_annotations() {
        let mut target = Post::new("p").with_text("Barack Obama visits Rome");
        target.author.username = Some("news".to_string());

        let mut source = target.clone();
        source.date = Some(Utc.timestamp_opt(1_500_000_000, 0).unwrap());
        source.lang = Some("it".to_string());
        source.author.full_name = Some("News Agency".to_string());
        let entity = source.add_annotation(AnnotationKind::Entity, 0, 12, "ml").unwrap();
        entity.as_entity_mut().unwrap().category = Some(Category::Person);
        source.add_annotation(AnnotationKind::Entity, 20, 24, "ml").unwrap();

        let report = target.merge(&source);
        assert_eq!(report, MergeReport { imported: 2, skipped: 0 });
        assert_eq!(target.date, source.date);
        assert_eq!(target.lang.as_deref(), Some("it"));
        assert_eq!(target.author.full_name.as_deref(), Some("News Agency"));
        let merged = target.annotations_of(AnnotationKind::Entity, Some("ml")).next().unwrap();
        assert_eq!(merged.as_entity().unwrap().category, Some(Category::Person));
    }

    #[test]
    fn test_merge_skips_conflicts() {
        let mut target = Post::new("p").with_text("Barack Obama visits Rome");
        target.add_annotation(AnnotationKind::Entity, 0, 6, "ml").unwrap();

        let mut source = Post::new("p").with_text("Barack Obama visits Rome");
        source.add_annotation(AnnotationKind::Entity, 0, 12, "ml").unwrap();
        source.add_annotation(AnnotationKind::Entity, 20, 24, "ml").unwrap();

        let report = target.merge(&source);
        assert_eq!(report, MergeReport { imported: 1, skipped: 1 });
        assert_eq!(target.annotations().len(), 2);
    }

    #[test]
    fn test_merge_rejects_conflicting_author_group() {
        let mut target = Post::new("p");
        target.author.username = Some("a".to_string());
        let mut source = Post::new("p");
        source.author.username = Some("b".to_string());
        source.author.uri = Some("http://x".to_string());

        target.merge(&source);
        assert_eq!(target.author.username.as_deref(), Some("a"));
        assert!(target.author.uri.is_none());
    }

    #[test]
    fn test_merge_requires_compatible_text() {
        let mut target = Post::new("p").with_text("one");
        let source = Post::new("p").with_text("two @x");
        let report = target.merge(&source);
        assert_eq!(report, MergeReport::default());
        assert!(target.annotations().is_empty());
    }

    #[test]
    fn test_merge_into_empty_post() {
        let mut source = Post::new("p").with_text("see @bob");
        source.ensure_rewrite().unwrap().replace(4, 8, "bob").unwrap();

        let mut target = Post::new("p");
        target.merge(&source);
        assert_eq!(target.text(), Some("see @bob"));
        assert_eq!(target.annotations().len(), 1);
        assert_eq!(target.rewrite(), source.rewrite());
    }

    #[test]
    fn test_json_shape() {
        let mut post = Post::new("twitter:42").with_text("Hello @bob");
        post.date = Some(Utc.timestamp_opt(1_500_000_000, 0).unwrap());
        post.lang = Some("en".to_string());
        post.ensure_rewrite().unwrap().replace(6, 10, "Bob").unwrap();

        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "twitter:42",
                "date": 1_500_000_000,
                "text": "Hello @bob",
                "lang": "en",
                "author": {},
                "annotations": [{"begin": 6, "end": 10, "username": "bob"}],
                "rewriting": {
                    "to": "Hello Bob",
                    "replacements": [{"from": "@bob", "fromOffset": 6, "to": "Bob", "toOffset": 6}]
                }
            })
        );
    }

    #[test]
    fn test_json_round_trip() {
        let mut post = Post::new("twitter:42").with_text("Hello @bob #nyc");
        post.author.category = Some(Category::Organization);
        let mention = post.annotations()[0].id();
        post.annotation_mut(mention)
            .and_then(Annotation::as_mention_mut)
            .unwrap()
            .full_name = Some("Bob".to_string());
        post.add_annotation(AnnotationKind::Entity, 11, 15, "ml").unwrap();

        let json = serde_json::to_string(&post).unwrap();
        let parsed: Post = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&parsed).unwrap(), json);
        assert_eq!(parsed.annotations().len(), 3);
    }

    #[test]
    fn test_load_lowercases_lang_and_rejects_unknown_annotation() {
        let post: Post =
            serde_json::from_str(r#"{"id":"p","text":"ciao","lang":"IT","author":{}}"#).unwrap();
        assert_eq!(post.lang.as_deref(), Some("it"));

        let result: Result<Post, _> = serde_json::from_str(
            r#"{"id":"p","text":"ciao","author":{},"annotations":[{"begin":0,"end":2}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_does_not_detect() {
        let post: Post = serde_json::from_str(r#"{"id":"p","text":"hi @bob","author":{}}"#).unwrap();
        assert!(post.annotations().is_empty());
    }
}
