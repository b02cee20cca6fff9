//! SpanIndex Integration Tests
//!
//! Tests for the overlap rules, point lookups and automatic detection of
//! mentions, hashtags and short links.

use microneel::core::{SpanError, SpanIndex};
use microneel::domain::{AnnotationKind, Post, DEFAULT_QUALIFIER};
use proptest::prelude::*;

#[test]
fn test_detection_on_text_assignment() {
    let post = Post::new("twitter:1").with_text("Hello @bob #nyc");

    let mentions: Vec<_> = post.annotations_of(AnnotationKind::Mention, None).collect();
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].as_mention().unwrap().username, "bob");
    assert_eq!((mentions[0].begin(), mentions[0].end()), (6, 10));

    let hashtags: Vec<_> = post.annotations_of(AnnotationKind::Hashtag, None).collect();
    assert_eq!(hashtags.len(), 1);
    assert_eq!(hashtags[0].as_hashtag().unwrap().hashtag, "nyc");
    assert_eq!((hashtags[0].begin(), hashtags[0].end()), (11, 15));
}

#[test]
fn test_short_link_detection() {
    let spans = SpanIndex::with_text("guarda https://t.co/Ab12 e http://example.com/x");

    let urls: Vec<_> = spans.of_kind(AnnotationKind::Url, None).collect();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].text(), "https://t.co/Ab12");
    assert_eq!(urls[0].qualifier(), DEFAULT_QUALIFIER);
}

#[test]
fn test_entity_layers_by_qualifier() {
    let mut spans = SpanIndex::with_text("Barack Obama a Roma");

    spans.add(AnnotationKind::Entity, 0, 5, "ml").unwrap();
    spans.add(AnnotationKind::Entity, 0, 5, "stanford").unwrap();
    assert_eq!(spans.len(), 2);

    let err = spans.add(AnnotationKind::Entity, 2, 8, "ml").unwrap_err();
    assert!(matches!(
        err,
        SpanError::OverlapConflict {
            existing_begin: 0,
            existing_end: 5,
            ..
        }
    ));
    assert_eq!(spans.len(), 2);
}

#[test]
fn test_conflict_message_names_both_spans() {
    let mut spans = SpanIndex::with_text("ciao mondo");
    spans.add(AnnotationKind::Url, 0, 4, DEFAULT_QUALIFIER).unwrap();

    let err = spans
        .add(AnnotationKind::Hashtag, 2, 6, DEFAULT_QUALIFIER)
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("[2, 6)"));
    assert!(message.contains("[0, 4)"));
}

#[test]
fn test_point_lookup_across_layers() {
    let mut post = Post::new("p").with_text("@juve campione");
    post.add_annotation(AnnotationKind::Entity, 1, 5, "ml").unwrap();

    let kinds: Vec<AnnotationKind> = post.spans().covering(2).map(|a| a.kind()).collect();
    assert_eq!(kinds, vec![AnnotationKind::Mention, AnnotationKind::Entity]);
    assert!(post
        .spans()
        .find_at(0, AnnotationKind::Entity, "ml")
        .is_none());
    assert!(post.spans().covering(7).next().is_none());
}

#[test]
fn test_retext_keeps_matching_annotations() {
    let mut post = Post::new("p").with_text("Roma e Milano");
    post.add_annotation(AnnotationKind::Entity, 0, 4, "ml").unwrap();
    post.add_annotation(AnnotationKind::Entity, 7, 13, "ml").unwrap();

    post.set_text(Some("Roma o Napoli".to_string()));
    let texts: Vec<&str> = post.annotations().iter().map(|a| a.text()).collect();
    assert_eq!(texts, vec!["Roma"]);

    post.set_text(None);
    assert!(post.annotations().is_empty());
    assert_eq!(
        post.add_annotation(AnnotationKind::Entity, 0, 1, "ml").unwrap_err(),
        SpanError::TextNotSet
    );
}

fn text_and_range() -> impl Strategy<Value = (String, usize, usize)> {
    "[a-z ]{1,30}".prop_flat_map(|text| {
        let len = text.chars().count();
        (Just(text), 0..len).prop_flat_map(|(text, begin)| {
            let len = text.chars().count();
            (Just(text), Just(begin), begin + 1..=len)
        })
    })
}

proptest! {
    #[test]
    fn prop_added_span_found_at_every_offset((text, begin, end) in text_and_range()) {
        let mut spans = SpanIndex::with_text(text);
        let id = spans.add(AnnotationKind::Entity, begin, end, "q").unwrap().id();

        for index in begin..end {
            let found = spans.find_at(index, AnnotationKind::Entity, "q").map(|a| a.id());
            prop_assert_eq!(found, Some(id));
        }
    }

    #[test]
    fn prop_add_is_idempotent((text, begin, end) in text_and_range()) {
        let mut spans = SpanIndex::with_text(text);
        let first = spans.add(AnnotationKind::Entity, begin, end, "q").unwrap().id();
        let second = spans.add(AnnotationKind::Entity, begin, end, "q").unwrap().id();

        prop_assert_eq!(first, second);
        prop_assert_eq!(spans.len(), 1);
    }

    #[test]
    fn prop_same_layer_partial_overlap_conflicts((text, begin, end) in text_and_range()) {
        let len = text.chars().count();
        let (b, e) = if end < len {
            (begin, end + 1)
        } else if begin > 0 {
            (begin - 1, end)
        } else {
            (begin, end - 1)
        };
        prop_assume!(b < e);

        let mut spans = SpanIndex::with_text(text);
        spans.add(AnnotationKind::Entity, begin, end, "q").unwrap();

        let overlapping = spans.add(AnnotationKind::Entity, b, e, "q");
        let is_conflict = matches!(overlapping, Err(SpanError::OverlapConflict { .. }));
        prop_assert!(is_conflict);
        prop_assert!(spans.add(AnnotationKind::Entity, begin, end, "other").is_ok());
        prop_assert!(spans.add(AnnotationKind::Entity, b, e, "other2").is_ok());
    }
}
