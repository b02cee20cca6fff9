//! Annotation types attached to post text spans.
//!
//! An annotation is a half-open char range `[begin, end)` of the owning post
//! text plus a kind-specific body. Annotations are only ever created by
//! [`SpanIndex::add`](crate::core::SpanIndex::add), which is where the
//! overlap rules are enforced.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Qualifier used when a caller does not specify one.
pub const DEFAULT_QUALIFIER: &str = "";

/// Stable handle of an annotation inside its owning index.
///
/// Ids are assigned in creation order and double as the last tiebreak of the
/// annotation ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnnotationId(pub(crate) u64);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Concrete annotation type.
///
/// Variant order is the alphabetical order of the kind names and is the
/// third key of the annotation ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnnotationKind {
    Entity,
    Hashtag,
    Mention,
    Url,
}

impl AnnotationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Entity => "entity",
            AnnotationKind::Hashtag => "hashtag",
            AnnotationKind::Mention => "mention",
            AnnotationKind::Url => "url",
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of an entity or of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Person,
    Organization,
    Location,
    Product,
    Event,
    Character,
    Thing,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Person => "person",
            Category::Organization => "organization",
            Category::Location => "location",
            Category::Product => "product",
            Category::Event => "event",
            Category::Character => "character",
            Category::Thing => "thing",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PERSON" => Ok(Category::Person),
            "ORGANIZATION" => Ok(Category::Organization),
            "LOCATION" => Ok(Category::Location),
            "PRODUCT" => Ok(Category::Product),
            "EVENT" => Ok(Category::Event),
            "CHARACTER" => Ok(Category::Character),
            "THING" => Ok(Category::Thing),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A mention of an account (`@username`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mention {
    /// Span text without the leading `@`
    pub username: String,
    pub full_name: Option<String>,
    pub description: Option<String>,
    pub lang: Option<String>,
    pub category: Option<Category>,
    pub uri: Option<String>,
}

/// A hashtag (`#tag`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Hashtag {
    /// Span text without the leading `#`
    pub hashtag: String,
    /// Word segmentation of the hashtag, e.g. "forza inter"
    pub tokenization: Option<String>,
    /// Free-text definitions collected by enrichers
    pub definitions: Option<BTreeSet<String>>,
}

/// A URL span. The raw URL is the span text itself.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Url {
    pub resolved_url: Option<String>,
    pub title: Option<String>,
}

/// A named entity. The surface form is the span text itself.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    pub category: Option<Category>,
    pub uri: Option<String>,
    /// Begin of the same entity in rewritten-text coordinates
    pub begin_rewritten: Option<usize>,
    /// End of the same entity in rewritten-text coordinates
    pub end_rewritten: Option<usize>,
}

/// Kind-specific payload of an annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationBody {
    Mention(Mention),
    Hashtag(Hashtag),
    Url(Url),
    Entity(Entity),
}

impl AnnotationBody {
    /// Fresh body for a span of the given kind, deriving span-based fields from `text`.
    pub(crate) fn for_span(kind: AnnotationKind, text: &str) -> Self {
        match kind {
            AnnotationKind::Mention => AnnotationBody::Mention(Mention {
                username: strip_sigil(text, '@'),
                ..Default::default()
            }),
            AnnotationKind::Hashtag => AnnotationBody::Hashtag(Hashtag {
                hashtag: strip_sigil(text, '#'),
                ..Default::default()
            }),
            AnnotationKind::Url => AnnotationBody::Url(Url::default()),
            AnnotationKind::Entity => AnnotationBody::Entity(Entity::default()),
        }
    }

    pub fn kind(&self) -> AnnotationKind {
        match self {
            AnnotationBody::Mention(_) => AnnotationKind::Mention,
            AnnotationBody::Hashtag(_) => AnnotationKind::Hashtag,
            AnnotationBody::Url(_) => AnnotationKind::Url,
            AnnotationBody::Entity(_) => AnnotationKind::Entity,
        }
    }
}

fn strip_sigil(text: &str, sigil: char) -> String {
    text.strip_prefix(sigil).unwrap_or(text).to_string()
}

/// A typed annotation over `[begin, end)` of the owning post text.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    id: AnnotationId,
    begin: usize,
    end: usize,
    qualifier: String,
    text: String,
    body: AnnotationBody,
}

impl Annotation {
    pub(crate) fn new(
        id: AnnotationId,
        begin: usize,
        end: usize,
        qualifier: String,
        text: String,
        kind: AnnotationKind,
    ) -> Self {
        let body = AnnotationBody::for_span(kind, &text);
        Self {
            id,
            begin,
            end,
            qualifier,
            text,
            body,
        }
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn begin(&self) -> usize {
        self.begin
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    /// Cached slice of the post text covered by this annotation
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> AnnotationKind {
        self.body.kind()
    }

    pub fn body(&self) -> &AnnotationBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut AnnotationBody {
        &mut self.body
    }

    /// Whether `index` falls inside `[begin, end)`
    pub fn covers(&self, index: usize) -> bool {
        self.begin <= index && index < self.end
    }

    /// Whether `[begin, end)` intersects this annotation
    pub fn overlaps(&self, begin: usize, end: usize) -> bool {
        self.begin < end && self.end > begin
    }

    /// Raw URL for url annotations, surface form for entities
    pub fn surface_form(&self) -> &str {
        &self.text
    }

    pub fn as_mention(&self) -> Option<&Mention> {
        match &self.body {
            AnnotationBody::Mention(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mention_mut(&mut self) -> Option<&mut Mention> {
        match &mut self.body {
            AnnotationBody::Mention(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_hashtag(&self) -> Option<&Hashtag> {
        match &self.body {
            AnnotationBody::Hashtag(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_hashtag_mut(&mut self) -> Option<&mut Hashtag> {
        match &mut self.body {
            AnnotationBody::Hashtag(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_url(&self) -> Option<&Url> {
        match &self.body {
            AnnotationBody::Url(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_url_mut(&mut self) -> Option<&mut Url> {
        match &mut self.body {
            AnnotationBody::Url(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match &self.body {
            AnnotationBody::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_entity_mut(&mut self) -> Option<&mut Entity> {
        match &mut self.body {
            AnnotationBody::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Total order: begin, end, kind, qualifier, then creation order.
    pub fn sort_key(&self) -> (usize, usize, AnnotationKind, &str, AnnotationId) {
        (self.begin, self.end, self.kind(), &self.qualifier, self.id)
    }

    /// Import enrichment fields from `other` into empty slots of this annotation.
    ///
    /// Fields are imported only when every field compared pairwise is either
    /// missing on one side or equal; hashtag definitions are unioned. Returns
    /// whether the two annotations were compatible.
    pub fn absorb(&mut self, other: &Annotation) -> bool {
        match (&mut self.body, &other.body) {
            (AnnotationBody::Mention(ta), AnnotationBody::Mention(pa)) => {
                let compatible = compatible(&ta.full_name, &pa.full_name)
                    && compatible(&ta.description, &pa.description)
                    && compatible(&ta.lang, &pa.lang)
                    && compatible(&ta.category, &pa.category)
                    && compatible(&ta.uri, &pa.uri);
                if compatible {
                    fill(&mut ta.full_name, &pa.full_name);
                    fill(&mut ta.description, &pa.description);
                    fill(&mut ta.lang, &pa.lang);
                    fill(&mut ta.category, &pa.category);
                    fill(&mut ta.uri, &pa.uri);
                }
                compatible
            }
            (AnnotationBody::Hashtag(ta), AnnotationBody::Hashtag(pa)) => {
                let compatible = compatible(&ta.tokenization, &pa.tokenization);
                if compatible {
                    fill(&mut ta.tokenization, &pa.tokenization);
                    if let Some(defs) = &pa.definitions {
                        ta.definitions
                            .get_or_insert_with(BTreeSet::new)
                            .extend(defs.iter().cloned());
                    }
                }
                compatible
            }
            (AnnotationBody::Url(ta), AnnotationBody::Url(pa)) => {
                let compatible = compatible(&ta.resolved_url, &pa.resolved_url)
                    && compatible(&ta.title, &pa.title);
                if compatible {
                    fill(&mut ta.resolved_url, &pa.resolved_url);
                    fill(&mut ta.title, &pa.title);
                }
                compatible
            }
            (AnnotationBody::Entity(ta), AnnotationBody::Entity(pa)) => {
                let compatible =
                    compatible(&ta.category, &pa.category) && compatible(&ta.uri, &pa.uri);
                if compatible {
                    fill(&mut ta.category, &pa.category);
                    fill(&mut ta.uri, &pa.uri);
                    fill(&mut ta.begin_rewritten, &pa.begin_rewritten);
                    fill(&mut ta.end_rewritten, &pa.end_rewritten);
                }
                compatible
            }
            _ => false,
        }
    }

    /// Flat JSON record of this annotation.
    pub fn to_record(&self) -> AnnotationRecord {
        let mut record = AnnotationRecord {
            begin: self.begin,
            end: self.end,
            q: (!self.qualifier.is_empty()).then(|| self.qualifier.clone()),
            ..Default::default()
        };

        match &self.body {
            AnnotationBody::Mention(m) => {
                record.username = Some(m.username.clone());
                record.full_name = m.full_name.clone();
                record.description = m.description.clone();
                record.lang = m.lang.clone();
                record.category = m.category;
                record.uri = m.uri.clone();
            }
            AnnotationBody::Hashtag(h) => {
                record.hashtag = Some(h.hashtag.clone());
                record.tokenization = h.tokenization.clone();
                record.definitions = h.definitions.clone();
            }
            AnnotationBody::Url(u) => {
                record.url = Some(self.text.clone());
                record.resolved_url = u.resolved_url.clone();
                record.title = u.title.clone();
            }
            AnnotationBody::Entity(e) => {
                record.surface_form = Some(self.text.clone());
                record.category = e.category;
                record.uri = e.uri.clone();
                record.begin_index_rewritten = e.begin_rewritten;
                record.end_index_rewritten = e.end_rewritten;
            }
        }

        record
    }

    /// Restore the enrichment fields stored in `record`.
    pub(crate) fn restore_fields(&mut self, record: &AnnotationRecord) {
        match &mut self.body {
            AnnotationBody::Mention(m) => {
                m.full_name = record.full_name.clone();
                m.description = record.description.clone();
                m.lang = record.lang.clone();
                m.category = record.category;
                m.uri = record.uri.clone();
            }
            AnnotationBody::Hashtag(h) => {
                h.tokenization = record.tokenization.clone();
                h.definitions = record.definitions.clone();
            }
            AnnotationBody::Url(u) => {
                u.resolved_url = record.resolved_url.clone();
                u.title = record.title.clone();
            }
            AnnotationBody::Entity(e) => {
                e.category = record.category;
                e.uri = record.uri.clone();
                e.begin_rewritten = record.begin_index_rewritten;
                e.end_rewritten = record.end_index_rewritten;
            }
        }
    }
}

impl Eq for Annotation {}

impl PartialOrd for Annotation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Annotation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// `true` when either side is missing or both are equal.
pub(crate) fn compatible<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

/// Copy `source` into `slot` if `slot` is empty.
pub(crate) fn fill<T: Clone>(slot: &mut Option<T>, source: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(source);
    }
}

/// Persisted annotation, discriminated by its signature field:
/// `username` (mention), `hashtag`, `url` or `surfaceForm` (entity).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    pub begin: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_form: Option<String>,

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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_index_rewritten: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index_rewritten: Option<usize>,
}

impl AnnotationRecord {
    /// Kind announced by the signature field, if any.
    pub fn kind(&self) -> Option<AnnotationKind> {
        if self.username.is_some() {
            Some(AnnotationKind::Mention)
        } else if self.hashtag.is_some() {
            Some(AnnotationKind::Hashtag)
        } else if self.url.is_some() {
            Some(AnnotationKind::Url)
        } else if self.surface_form.is_some() {
            Some(AnnotationKind::Entity)
        } else {
            None
        }
    }

    pub fn qualifier(&self) -> &str {
        self.q.as_deref().unwrap_or(DEFAULT_QUALIFIER)
    }
}
